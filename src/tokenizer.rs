//! Lexer for content streams.

use nom::Input;

use crate::parser::{self, ParserInput};
use crate::{Dictionary, Error, Object, Result, Stream};

/// One lexical unit of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Operator, kept as written.
    Keyword(String),
    /// Operand value.
    Object(Object),
    /// `BI ... ID <data> EI` as a single unit.
    InlineImage(Stream),
}

/// Saved read position, see [`Tokenizer::checkpoint`].
#[derive(Debug, Clone, Copy)]
pub struct Checkpoint<'a>(ParserInput<'a>);

pub struct Tokenizer<'a> {
    input: ParserInput<'a>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(content: &'a [u8]) -> Self {
        Tokenizer {
            input: ParserInput::new_extra(content, "content stream"),
        }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.input.location_offset()
    }

    pub fn checkpoint(&self) -> Checkpoint<'a> {
        Checkpoint(self.input)
    }

    /// Rewind to a position saved by [`Tokenizer::checkpoint`].
    pub fn restore(&mut self, checkpoint: Checkpoint<'a>) {
        self.input = checkpoint.0;
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.input = parser::skip_space(self.input);
        let first = match self.input.fragment().first() {
            Some(&c) => c,
            None => return Ok(None),
        };

        if b"/([<".contains(&first) {
            let (rest, object) = parser::operand(self.input).map_err(|_| self.lex_error("malformed value"))?;
            self.input = rest;
            return Ok(Some(Token::Object(object)));
        }
        if !parser::is_regular(first) {
            return Err(self.lex_error("unexpected delimiter"));
        }

        let (rest, word) = parser::keyword(self.input).map_err(|_| self.lex_error("expected keyword"))?;
        let object = match *word.fragment() {
            b"true" => Some(Object::Boolean(true)),
            b"false" => Some(Object::Boolean(false)),
            b"null" => Some(Object::Null),
            b"BI" => {
                self.input = rest;
                return self.inline_image().map(Some);
            }
            _ => match parser::number(word) {
                Ok((tail, number)) if tail.is_empty() => Some(number),
                _ => None,
            },
        };
        if let Some(object) = object {
            self.input = rest;
            return Ok(Some(Token::Object(object)));
        }

        let text = std::str::from_utf8(word.fragment()).map_err(|_| self.lex_error("keyword is not valid text"))?;
        self.input = rest;
        Ok(Some(Token::Keyword(text.to_owned())))
    }

    fn inline_image(&mut self) -> Result<Token> {
        let (rest, dict) =
            parser::inline_image_dict(self.input).map_err(|_| self.lex_error("malformed inline image dictionary"))?;
        let data: &'a [u8] = *rest.fragment();

        let (length, end) = image_data_length(&dict)
            .and_then(|length| ends_with_ei(data, length).map(|end| (length, end)))
            .or_else(|| scan_for_ei(data))
            .ok_or_else(|| self.lex_error("inline image is missing EI"))?;

        self.input = rest.take_from(end);
        Ok(Token::InlineImage(Stream::inline(dict, data[..length].to_vec())))
    }

    fn lex_error(&self, reason: &'static str) -> Error {
        Error::Lex {
            offset: self.position(),
            reason,
        }
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Length of unfiltered image data as given by its dimensions.
fn image_data_length(dict: &Dictionary) -> Option<usize> {
    if dict.has(b"F") || dict.has(b"Filter") {
        return None;
    }
    let integer = |short: &[u8], long: &[u8]| {
        dict.get(short)
            .or_else(|_| dict.get(long))
            .and_then(Object::as_i64)
            .ok()
            .and_then(|v| u64::try_from(v).ok())
    };
    let image_mask = dict
        .get(b"IM")
        .or_else(|_| dict.get(b"ImageMask"))
        .and_then(Object::as_bool)
        .unwrap_or(false);

    let width = integer(b"W", b"Width")?;
    let height = integer(b"H", b"Height")?;
    let (components, bits) = if image_mask {
        (1, 1)
    } else {
        let color_space = dict.get(b"CS").or_else(|_| dict.get(b"ColorSpace")).ok()?;
        let components = match color_space {
            Object::Name(name) => match name.as_slice() {
                b"G" | b"DeviceGray" | b"CalGray" => 1,
                b"RGB" | b"DeviceRGB" | b"CalRGB" => 3,
                b"CMYK" | b"DeviceCMYK" => 4,
                _ => return None,
            },
            Object::Array(array) => match array.first().and_then(|n| n.as_name().ok()) {
                Some(b"I" | b"Indexed") => 1,
                _ => return None,
            },
            _ => return None,
        };
        (components, integer(b"BPC", b"BitsPerComponent")?)
    };

    let bits_per_row = width.checked_mul(components)?.checked_mul(bits)?;
    let length = bits_per_row.div_ceil(8).checked_mul(height)?;
    usize::try_from(length).ok()
}

/// End of `EI` if `data[length..]` is optional whitespace, `EI` and a token boundary.
fn ends_with_ei(data: &[u8], length: usize) -> Option<usize> {
    let tail = data.get(length..)?;
    let skipped = tail.iter().take_while(|&&c| parser::is_whitespace(c)).count();
    let at = length + skipped;
    is_ei_at(data, at).then_some(at + 2)
}

/// First `EI` preceded by whitespace and followed by a token boundary.
fn scan_for_ei(data: &[u8]) -> Option<(usize, usize)> {
    (0..data.len())
        .find(|&at| (at == 0 || parser::is_whitespace(data[at - 1])) && is_ei_at(data, at))
        .map(|at| (at.saturating_sub(1), at + 2))
}

fn is_ei_at(data: &[u8], at: usize) -> bool {
    data.get(at..at + 2) == Some(&b"EI"[..]) && data.get(at + 2).is_none_or(|&c| !parser::is_regular(c))
}
