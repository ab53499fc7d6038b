use log::{debug, warn};
use std::cmp;
use std::collections::HashSet;
use std::io::Read;

use nom::Input;

use crate::error::{ParseError, XrefError};
use crate::parser::{self, ParserInput};
use crate::xref::{self, Xref};
use crate::xref_stream;
use crate::{Dictionary, Error, Object, ParseOptions, Result};

/// Trailer keys carried over from older revisions when the newest trailer lacks them.
const INHERITED_KEYS: [&[u8]; 4] = [b"Root", b"Info", b"ID", b"Encrypt"];

/// Resolves the cross reference chain of a PDF file held in memory.
pub struct Reader<'a> {
    buffer: &'a [u8],
    options: ParseOptions,
}

/// Offsets visited while following one chain, and how many sections were read.
#[derive(Debug, Default)]
pub struct XrefChainState {
    visited: HashSet<usize>,
    steps: usize,
    limit: usize,
}

impl XrefChainState {
    pub fn new(limit: usize) -> Self {
        XrefChainState {
            limit,
            ..Default::default()
        }
    }

    /// Record a section offset, failing on the second visit or once the limit is exceeded.
    pub fn visit(&mut self, offset: usize) -> Result<()> {
        if !self.visited.insert(offset) {
            return Err(XrefError::Cycle(offset).into());
        }
        self.steps += 1;
        if self.steps > self.limit {
            return Err(XrefError::ChainTooLong(self.limit).into());
        }
        Ok(())
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl<'a> Reader<'a> {
    /// Offsets are taken relative to the `%PDF-` header; bytes before it are ignored.
    pub fn new(buffer: &'a [u8]) -> Self {
        let offset = buffer.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
        Reader {
            buffer: &buffer[offset..],
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    /// Read a whole source into memory and resolve its cross reference chain.
    pub fn load_from<R: Read>(mut source: R, options: ParseOptions) -> Result<(Xref, Dictionary)> {
        let mut buffer = Vec::new();
        source.read_to_end(&mut buffer)?;
        Reader::new(&buffer).with_options(options).load()
    }

    /// Locate `startxref` and resolve the chain from there.
    pub fn load(&self) -> Result<(Xref, Dictionary)> {
        let start = self.xref_start()?;
        self.resolve(start)
    }

    /// Offset named by the last `startxref` before the final `%%EOF`.
    pub fn xref_start(&self) -> Result<usize> {
        let buffer = self.buffer;
        let seek_pos = buffer.len() - cmp::min(buffer.len(), 512);
        let eof_pos = rfind(&buffer[seek_pos..], b"%%EOF")
            .map(|pos| seek_pos + pos)
            .ok_or(XrefError::Start)?;
        let xref_pos = rfind(&buffer[..eof_pos], b"startxref").ok_or(XrefError::Start)?;

        let input = ParserInput::new_extra(&buffer[xref_pos..], "startxref");
        let start = parser::xref_start(input).ok_or(XrefError::Start)?;
        usize::try_from(start).map_err(|_| XrefError::Start.into())
    }

    /// Follow the chain starting at the section at `start` and merge every revision, newest first.
    ///
    /// The returned trailer is the newest one, completed from older trailers.
    pub fn resolve(&self, start: usize) -> Result<(Xref, Dictionary)> {
        let mut state = XrefChainState::new(self.options.max_xref_chain_length);
        let mut merged: Option<(Xref, Dictionary)> = None;
        let mut next = Some((start, XrefError::Start));

        while let Some((offset, error)) = next.take() {
            let offset = self.section_offset(offset, error)?;
            state.visit(offset)?;
            debug!("reading xref section {} at {}", state.steps(), offset);
            let (mut section, mut trailer) = self.read_section(offset)?;

            // hybrid file: the companion stream describes the same revision and wins over its table
            if let Some(stream_start) = trailer.remove(b"XRefStm") {
                let stream_offset = self.link_offset(&stream_start, XrefError::StreamStart)?;
                state.visit(stream_offset)?;
                debug!("reading xref stream at {} for table at {}", stream_offset, offset);
                let (mut stream_xref, _) = self.read_section(stream_offset)?;
                stream_xref.xref_type = section.xref_type;
                stream_xref.merge(section);
                section = stream_xref;
            }

            next = match trailer.remove(b"Prev") {
                Some(prev) => Some((self.link_offset(&prev, XrefError::PrevStart)?, XrefError::PrevStart)),
                None => None,
            };

            merged = Some(match merged {
                None => (section, trailer),
                Some((mut xref, mut newest)) => {
                    xref.merge(section);
                    inherit_trailer_keys(&mut newest, &trailer);
                    (xref, newest)
                }
            });
        }

        let (mut xref, trailer) = merged.ok_or(Error::InternalLogic("xref chain read no section"))?;
        let entry_count = xref.max_id().map_or(0, |id| id.saturating_add(1));
        if xref.size != entry_count {
            warn!(
                "Size entry of trailer dictionary is {}, correct value is {}.",
                xref.size, entry_count
            );
            xref.size = entry_count;
        }
        Ok((xref, trailer))
    }

    /// Classic section with its trailer, or an xref stream object, at `offset`.
    pub fn read_section(&self, offset: usize) -> Result<(Xref, Dictionary)> {
        if offset >= self.buffer.len() {
            return Err(Error::NoXref { offset });
        }
        let input = ParserInput::new_extra(self.buffer, "xref").take_from(offset);
        let input = parser::skip_white_space(input);
        if parser::xref_keyword(input).is_ok() {
            return xref::xref_section(input, &self.options);
        }

        let (id, object) = parser::indirect_object(input).map_err(|err| match err {
            Error::Parse(ParseError::InvalidIndirectObject { offset }) => Error::NoXref { offset },
            err => err,
        })?;
        match object {
            Object::Stream(stream) => {
                debug!("reading xref stream {} {} R at {}", id.0, id.1, offset);
                xref_stream::decode_xref_stream(stream, &self.options)
            }
            _ => Err(XrefError::NotXrefStream.into()),
        }
    }

    fn section_offset(&self, offset: usize, error: XrefError) -> Result<usize> {
        if offset < self.buffer.len() {
            Ok(offset)
        } else {
            Err(error.into())
        }
    }

    fn link_offset(&self, value: &Object, error: XrefError) -> Result<usize> {
        let offset = value
            .as_i64()
            .ok()
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or_else(|| error.clone())?;
        self.section_offset(offset, error)
    }
}

fn inherit_trailer_keys(newest: &mut Dictionary, older: &Dictionary) {
    for key in INHERITED_KEYS {
        if newest.has(key) {
            continue;
        }
        if let Ok(value) = older.get(key) {
            warn!("trailer lacks /{}, taking it from an older revision", String::from_utf8_lossy(key));
            newest.set(key.to_vec(), value.clone());
        }
    }
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
