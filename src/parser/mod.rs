use crate::{Dictionary, Object, ObjectId, ParseError, Stream, StringFormat};
use log::warn;
use std::str::{self, FromStr};

use nom::branch::alt;
use nom::bytes::complete::{tag, take, take_until, take_while, take_while1, take_while_m_n};
use nom::character::complete::{digit0, digit1, one_of, space0};
use nom::combinator::{map, map_opt, opt, recognize, verify};
use nom::error::{ErrorKind, ParseError as _};
use nom::multi::{fold_many0, many0};
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated};
use nom::{AsBytes, AsChar, IResult, Parser};
use nom_locate::LocatedSpan;

pub type ParserInput<'a> = LocatedSpan<&'a [u8], &'a str>;
// Change this to something else that implements ParseError to get a
// different error type out of nom.
pub(crate) type NomError<'a> = nom::error::Error<ParserInput<'a>>;

pub(crate) type NomResult<'a, O, E = NomError<'a>> = IResult<ParserInput<'a>, O, E>;

/// Maximum allowed embedding of literal strings.
pub const MAX_BRACKET: usize = 100;

/// Maximum allowed embedding of arrays and dictionaries.
pub const MAX_NESTING: usize = 64;

#[inline]
fn strip_nom<O>(r: NomResult<O>) -> Option<O> {
    r.ok().map(|(_, o)| o)
}

#[inline]
fn too_deep<O>(input: ParserInput) -> NomResult<O> {
    Err(nom::Err::Error(NomError::from_error_kind(input, ErrorKind::TooLarge)))
}

pub(crate) fn eol(input: ParserInput) -> NomResult<ParserInput> {
    alt((tag(&b"\r\n"[..]), tag(&b"\n"[..]), tag(&b"\r"[..]))).parse(input)
}

/// A `%` comment up to and including its end of line, which may be missing at end of input.
pub(crate) fn comment(input: ParserInput) -> NomResult<()> {
    map(
        (tag(&b"%"[..]), take_while(|c: u8| !b"\r\n".contains(&c)), opt(eol)),
        |_| (),
    )
    .parse(input)
}

#[inline]
pub(crate) fn is_whitespace(c: u8) -> bool {
    b" \t\n\r\0\x0C".contains(&c)
}

#[inline]
pub(crate) fn is_delimiter(c: u8) -> bool {
    b"()<>[]{}/%".contains(&c)
}

#[inline]
pub(crate) fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

#[inline]
fn is_direct_literal_string(c: u8) -> bool {
    !b"()\\\r\n".contains(&c)
}

pub(crate) fn white_space(input: ParserInput) -> NomResult<()> {
    map(take_while(is_whitespace), |_| ()).parse(input)
}

/// Whitespace and comments.
pub(crate) fn space(input: ParserInput) -> NomResult<()> {
    fold_many0(
        alt((map(take_while1(is_whitespace), |_| ()), comment)),
        || {},
        |_, _| (),
    )
    .parse(input)
}

pub(crate) fn skip_white_space(input: ParserInput) -> ParserInput {
    white_space(input).map(|(rest, _)| rest).unwrap_or(input)
}

pub(crate) fn skip_space(input: ParserInput) -> ParserInput {
    space(input).map(|(rest, _)| rest).unwrap_or(input)
}

fn signed_digits(input: ParserInput) -> NomResult<ParserInput> {
    recognize(pair(opt(one_of("+-")), digit1)).parse(input)
}

pub(crate) fn integer(input: ParserInput) -> NomResult<i64> {
    map_opt(signed_digits, |digits: ParserInput| {
        str::from_utf8(&digits).ok().and_then(|s| i64::from_str(s).ok())
    })
    .parse(input)
}

/// Integers too large for `i64` degrade to reals.
fn big_integer(input: ParserInput) -> NomResult<f64> {
    map_opt(signed_digits, |digits: ParserInput| {
        str::from_utf8(&digits).ok().and_then(|s| f64::from_str(s).ok())
    })
    .parse(input)
}

fn real(input: ParserInput) -> NomResult<f64> {
    map_opt(
        recognize(pair(
            opt(one_of("+-")),
            alt((
                map((digit1, tag(&b"."[..]), digit0), |_| ()),
                map(pair(tag(&b"."[..]), digit1), |_| ()),
            )),
        )),
        |float_input: ParserInput| str::from_utf8(&float_input).ok().and_then(|s| f64::from_str(s).ok()),
    )
    .parse(input)
}

pub(crate) fn number(input: ParserInput) -> NomResult<Object> {
    alt((
        map(real, Object::Real),
        map(integer, Object::Integer),
        map(big_integer, Object::Real),
    ))
    .parse(input)
}

pub(crate) fn hex_char(input: ParserInput) -> NomResult<u8> {
    map_opt(
        verify(take(2usize), |h: &ParserInput| {
            h.as_bytes().iter().copied().all(AsChar::is_hex_digit)
        }),
        |x: ParserInput| str::from_utf8(&x).ok().and_then(|s| u8::from_str_radix(s, 16).ok()),
    )
    .parse(input)
}

fn oct_char(input: ParserInput) -> NomResult<u8> {
    map_opt(
        take_while_m_n(1, 3, AsChar::is_oct_digit),
        // High-order overflow of three octal digits is ignored.
        |x: ParserInput| {
            str::from_utf8(&x)
                .ok()
                .and_then(|s| u16::from_str_radix(s, 8).ok())
                .map(|o| o as u8)
        },
    )
    .parse(input)
}

/// Name with `#xx` escapes decoded; a `#` not followed by two hex digits is kept as is.
pub(crate) fn name(input: ParserInput) -> NomResult<Vec<u8>> {
    preceded(
        tag(&b"/"[..]),
        many0(alt((
            preceded(tag(&b"#"[..]), hex_char),
            map_opt(take(1usize), |c: ParserInput| if is_regular(c[0]) { Some(c[0]) } else { None }),
        ))),
    )
    .parse(input)
}

fn escape_sequence(input: ParserInput) -> NomResult<Option<u8>> {
    preceded(
        tag(&b"\\"[..]),
        alt((
            map(oct_char, Some),
            map(eol, |_| None),
            map(tag(&b"n"[..]), |_| Some(b'\n')),
            map(tag(&b"r"[..]), |_| Some(b'\r')),
            map(tag(&b"t"[..]), |_| Some(b'\t')),
            map(tag(&b"b"[..]), |_| Some(b'\x08')),
            map(tag(&b"f"[..]), |_| Some(b'\x0C')),
            map(take(1usize), |c: ParserInput| Some(c[0])),
        )),
    )
    .parse(input)
}

enum LiteralPiece<'a> {
    Direct(ParserInput<'a>),
    Escape(Option<u8>),
    Eol(ParserInput<'a>),
    Nested(Vec<u8>),
}

impl LiteralPiece<'_> {
    fn push(&self, output: &mut Vec<u8>) {
        match self {
            LiteralPiece::Direct(s) | LiteralPiece::Eol(s) => output.extend_from_slice(s),
            LiteralPiece::Escape(e) => output.extend(e),
            LiteralPiece::Nested(n) => output.extend_from_slice(n),
        }
    }
}

fn inner_literal_string(input: ParserInput, depth: usize) -> NomResult<Vec<u8>> {
    fold_many0(
        alt((
            map(take_while1(is_direct_literal_string), LiteralPiece::Direct),
            map(escape_sequence, LiteralPiece::Escape),
            map(eol, LiteralPiece::Eol),
            map(|i| nested_literal_string(i, depth), LiteralPiece::Nested),
        )),
        Vec::new,
        |mut out: Vec<u8>, value| {
            value.push(&mut out);
            out
        },
    )
    .parse(input)
}

fn nested_literal_string(input: ParserInput, depth: usize) -> NomResult<Vec<u8>> {
    if depth == 0 {
        return too_deep(input);
    }
    map(
        delimited(
            tag(&b"("[..]),
            |i| inner_literal_string(i, depth - 1),
            tag(&b")"[..]),
        ),
        |mut content| {
            content.insert(0, b'(');
            content.push(b')');
            content
        },
    )
    .parse(input)
}

pub(crate) fn literal_string(input: ParserInput) -> NomResult<Vec<u8>> {
    delimited(
        tag(&b"("[..]),
        |i| inner_literal_string(i, MAX_BRACKET),
        tag(&b")"[..]),
    )
    .parse(input)
}

#[inline]
fn hex_digit(input: ParserInput) -> NomResult<u8> {
    map_opt(take(1usize), |c: ParserInput| {
        str::from_utf8(&c).ok().and_then(|c| u8::from_str_radix(c, 16).ok())
    })
    .parse(input)
}

/// Hexadecimal string; an odd final digit is padded with zero.
pub(crate) fn hexadecimal_string(input: ParserInput) -> NomResult<Object> {
    map(
        delimited(
            tag(&b"<"[..]),
            terminated(
                fold_many0(
                    preceded(white_space, hex_digit),
                    || -> (Vec<u8>, bool) { (Vec::new(), false) },
                    |state, c| match state {
                        (mut out, false) => {
                            out.push(c << 4);
                            (out, true)
                        }
                        (mut out, true) => {
                            if let Some(last) = out.last_mut() {
                                *last |= c;
                            }
                            (out, false)
                        }
                    },
                ),
                white_space,
            ),
            tag(&b">"[..]),
        ),
        |(bytes, _)| Object::String(bytes, StringFormat::Hexadecimal),
    )
    .parse(input)
}

fn boolean(input: ParserInput) -> NomResult<Object> {
    alt((
        map(tag(&b"true"[..]), |_| Object::Boolean(true)),
        map(tag(&b"false"[..]), |_| Object::Boolean(false)),
    ))
    .parse(input)
}

fn null(input: ParserInput) -> NomResult<Object> {
    map(tag(&b"null"[..]), |_| Object::Null).parse(input)
}

fn array(input: ParserInput, depth: usize) -> NomResult<Vec<Object>> {
    if depth == 0 {
        return too_deep(input);
    }
    delimited(
        pair(tag(&b"["[..]), space),
        many0(|i| direct_object(i, depth - 1)),
        tag(&b"]"[..]),
    )
    .parse(input)
}

fn dictionary(input: ParserInput, depth: usize) -> NomResult<Dictionary> {
    if depth == 0 {
        return too_deep(input);
    }
    delimited(
        pair(tag(&b"<<"[..]), space),
        |i| inner_dictionary(i, depth - 1),
        tag(&b">>"[..]),
    )
    .parse(input)
}

fn inner_dictionary(input: ParserInput, depth: usize) -> NomResult<Dictionary> {
    fold_many0(
        pair(terminated(name, space), |i| direct_object(i, depth)),
        Dictionary::new,
        |mut dict, (key, value)| {
            dict.set(key, value);
            dict
        },
    )
    .parse(input)
}

fn unsigned_int<I: FromStr>(input: ParserInput) -> NomResult<I> {
    map_opt(digit1, |digits: ParserInput| {
        str::from_utf8(&digits).ok().and_then(|s| I::from_str(s).ok())
    })
    .parse(input)
}

fn object_id(input: ParserInput) -> NomResult<ObjectId> {
    pair(terminated(unsigned_int, space), terminated(unsigned_int, space)).parse(input)
}

fn reference(input: ParserInput) -> NomResult<Object> {
    map(terminated(object_id, tag(&b"R"[..])), Object::Reference).parse(input)
}

fn direct_objects(input: ParserInput, depth: usize) -> NomResult<Object> {
    alt((
        null,
        boolean,
        reference,
        number,
        map(name, Object::Name),
        map(literal_string, Object::string_literal),
        hexadecimal_string,
        map(|i| array(i, depth), Object::Array),
        map(|i| dictionary(i, depth), Object::Dictionary),
    ))
    .parse(input)
}

fn direct_object(input: ParserInput, depth: usize) -> NomResult<Object> {
    terminated(|i| direct_objects(i, depth), space).parse(input)
}

/// Value starting with a delimiter, as it appears among content stream operands.
pub(crate) fn operand(input: ParserInput) -> NomResult<Object> {
    alt((
        map(name, Object::Name),
        map(literal_string, Object::string_literal),
        map(|i| dictionary(i, MAX_NESTING), Object::Dictionary),
        hexadecimal_string,
        map(|i| array(i, MAX_NESTING), Object::Array),
    ))
    .parse(input)
}

/// Run of regular characters, the shape of a content stream keyword.
pub(crate) fn keyword(input: ParserInput) -> NomResult<ParserInput> {
    take_while1(is_regular).parse(input)
}

/// Key/value pairs of an inline image up to and including `ID` and the single whitespace byte after it.
pub(crate) fn inline_image_dict(input: ParserInput) -> NomResult<Dictionary> {
    terminated(
        preceded(space, |i| inner_dictionary(i, MAX_NESTING)),
        (
            tag(&b"ID"[..]),
            verify(take(1usize), |c: &ParserInput| is_whitespace(c[0])),
        ),
    )
    .parse(input)
}

fn trim_eol(data: &[u8]) -> &[u8] {
    data.strip_suffix(b"\r\n")
        .or_else(|| data.strip_suffix(b"\n"))
        .or_else(|| data.strip_suffix(b"\r"))
        .unwrap_or(data)
}

/// Stream object. A `/Length` that is missing, indirect or wrong falls back to scanning for `endstream`.
fn stream(input: ParserInput) -> NomResult<Object> {
    let (i, dict) = terminated(
        |i| dictionary(i, MAX_NESTING),
        (space, tag(&b"stream"[..]), space0, eol),
    )
    .parse(input)?;
    let start = i.location_offset();

    let length = dict
        .get(b"Length")
        .and_then(Object::as_i64)
        .ok()
        .and_then(|length| usize::try_from(length).ok());
    if let Some(length) = length {
        let exact: NomResult<ParserInput> =
            terminated(take(length), pair(white_space, tag(&b"endstream"[..]))).parse(i);
        if let Ok((i, data)) = exact {
            return Ok((i, Object::Stream(Stream::new(dict, data.to_vec()).with_position(start))));
        }
        warn!("stream /Length {} at offset {} does not end at endstream", length, start);
    }

    let (i, data) = terminated(take_until(&b"endstream"[..]), tag(&b"endstream"[..])).parse(i)?;
    let content = trim_eol(data.fragment()).to_vec();
    Ok((i, Object::Stream(Stream::new(dict, content).with_position(start))))
}

/// `n g obj ... endobj` at the start of `input`.
pub(crate) fn indirect_object(input: ParserInput) -> crate::Result<(ObjectId, Object)> {
    let offset = input.location_offset();
    let (i, (_, id)) = terminated((space, object_id), pair(tag(&b"obj"[..]), space))
        .parse(input)
        .map_err(|_| ParseError::InvalidIndirectObject { offset })?;

    let (_, object) = terminated(
        alt((stream, |i| direct_objects(i, MAX_NESTING))),
        (space, opt(tag(&b"endobj"[..]))),
    )
    .parse(i)
    .map_err(|_| ParseError::InvalidIndirectObject { offset })?;

    Ok((id, object))
}

pub(crate) fn xref_keyword(input: ParserInput) -> NomResult<()> {
    map(
        (tag(&b"xref"[..]), verify(take(1usize), |c: &ParserInput| is_whitespace(c[0]))),
        |_| (),
    )
    .parse(input)
}

pub(crate) fn at_trailer(input: ParserInput) -> bool {
    input.fragment().starts_with(b"trailer")
}

/// `first count` line of a table subsection; signs are kept so that the caller can range check them.
pub(crate) fn subsection_header(input: ParserInput) -> NomResult<(i64, i64)> {
    terminated(
        separated_pair(integer, take_while1(|c: u8| c == b' '), integer),
        pair(take_while(|c: u8| c == b' ' || c == b'\t'), eol),
    )
    .parse(input)
}

/// One 20 byte table entry: offset, generation and whether it is in use.
pub(crate) fn xref_entry(input: ParserInput) -> NomResult<(u64, u32, bool)> {
    map(
        (
            unsigned_digits::<u64>(10),
            tag(&b" "[..]),
            unsigned_digits::<u32>(5),
            tag(&b" "[..]),
            one_of("nf"),
            alt((tag(&b"\r\n"[..]), tag(&b" \n"[..]), tag(&b" \r"[..]))),
        ),
        |(offset, _, generation, _, kind, _)| (offset, generation, kind == 'n'),
    )
    .parse(input)
}

fn unsigned_digits<'a, I: FromStr>(count: usize) -> impl Parser<ParserInput<'a>, Output = I, Error = NomError<'a>> {
    map_opt(
        take_while_m_n(count, count, |c: u8| c.is_ascii_digit()),
        |digits: ParserInput| str::from_utf8(&digits).ok().and_then(|s| I::from_str(s).ok()),
    )
}

pub(crate) fn trailer(input: ParserInput) -> NomResult<Dictionary> {
    delimited(
        pair(tag(&b"trailer"[..]), space),
        |i| dictionary(i, MAX_NESTING),
        space,
    )
    .parse(input)
}

pub(crate) fn xref_start(input: ParserInput) -> Option<i64> {
    strip_nom(
        delimited(
            pair(tag(&b"startxref"[..]), white_space),
            integer,
            (white_space, tag(&b"%%EOF"[..])),
        )
        .parse(input),
    )
}

/// Parse a single value, for tests and diagnostics.
pub fn direct_value(input: &[u8]) -> Option<Object> {
    strip_nom(direct_object(ParserInput::new_extra(input, "value"), MAX_NESTING))
}
