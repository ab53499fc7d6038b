use std::collections::BTreeMap;

use log::warn;
use nom::Input;

use crate::parser::{self, ParserInput};
use crate::{Dictionary, Error, Object, ParseError, ParseOptions, Result, XrefError};

/// Length of one entry of a classic cross reference table.
pub const XREF_ENTRY_SIZE: usize = 20;

/// Object index of one revision, or of a whole file once revisions are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Xref {
    /// Type of Cross-Reference used in the last incremental version.
    pub xref_type: XrefType,

    /// Entries for indirect object.
    pub entries: BTreeMap<u32, XrefEntry>,

    /// Total number of entries (including free entries), equal to the highest object number plus 1.
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum XrefType {
    /// Cross-Reference Streams are supported beginning with PDF 1.5.
    CrossReferenceStream,
    CrossReferenceTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum XrefEntry {
    /// Unused slot; `next` is the next free object number.
    Free { next: u64, generation: u16 },
    /// Object stored at a byte offset of the file.
    Normal { offset: u64, generation: u16 },
    /// Object stored at `index` inside object stream `container`.
    Compressed { container: u32, index: u32 },
}

impl XrefEntry {
    pub fn is_compressed(&self) -> bool {
        matches!(self, XrefEntry::Compressed { .. })
    }
}

impl Xref {
    pub fn new(size: u32, xref_type: XrefType) -> Xref {
        Xref {
            xref_type,
            entries: BTreeMap::new(),
            size,
        }
    }

    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn insert(&mut self, id: u32, entry: XrefEntry) {
        self.entries.insert(id, entry);
    }

    /// Store `entry` only if the slot is still unset; returns whether it was stored.
    pub fn insert_if_absent(&mut self, id: u32, entry: XrefEntry) -> bool {
        match self.entries.entry(id) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Combine with an older revision. Entries already present win.
    pub fn merge(&mut self, older: Xref) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        self.size = self.size.max(older.size);
    }

    /// Highest object number with an entry.
    pub fn max_id(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Check a subsection `first count` against the configured object limit.
pub(crate) fn check_subsection(first: i64, count: i64, options: &ParseOptions) -> Result<()> {
    if count < 0 {
        return Err(Error::ValueOutOfRange(format!("negative subsection count {}", count)));
    }
    if first < 0 {
        return Err(Error::ValueOutOfRange(format!("negative first object number {}", first)));
    }
    let max = options.max_object_count;
    let limit = i64::from(max);
    match first.checked_add(count) {
        Some(end) if first < limit && end <= limit => Ok(()),
        _ => Err(XrefError::ObjectCount { first, count, max }.into()),
    }
}

/// Read `count` 20 byte entries for objects `first..first + count` into `xref`.
///
/// Slots already set are left as they are. Returns the input after the last entry.
pub fn read_subsection<'a>(
    input: ParserInput<'a>, first: i64, count: i64, xref: &mut Xref, options: &ParseOptions,
) -> Result<ParserInput<'a>> {
    check_subsection(first, count, options)?;
    if count == 0 {
        return Ok(input);
    }

    let mut input = parser::skip_white_space(input);
    // bounded by max_object_count, see check_subsection
    let (first, count) = (first as u32, count as u32);
    let needed = (count as usize).saturating_mul(XREF_ENTRY_SIZE);
    if input.len() < needed {
        return Err(Error::NoXref {
            offset: input.location_offset(),
        });
    }

    for id in first..first + count {
        let record = input.take(XREF_ENTRY_SIZE);
        match parser::xref_entry(record) {
            Ok((_, (offset, generation, in_use))) => {
                let generation = u16::try_from(generation).unwrap_or(u16::MAX);
                let entry = if in_use {
                    XrefEntry::Normal { offset, generation }
                } else {
                    XrefEntry::Free {
                        next: offset,
                        generation,
                    }
                };
                xref.insert_if_absent(id, entry);
            }
            Err(_) if options.strict_xref_entries => {
                return Err(XrefError::Entry {
                    object: id,
                    offset: record.location_offset(),
                }
                .into());
            }
            Err(_) => warn!(
                "skipping malformed xref entry for object {} at offset {}",
                id,
                record.location_offset()
            ),
        }
        input = input.take_from(XREF_ENTRY_SIZE);
    }
    Ok(input)
}

/// Classic section: `xref`, its subsections and the trailer dictionary.
pub fn xref_section(input: ParserInput, options: &ParseOptions) -> Result<(Xref, Dictionary)> {
    let offset = input.location_offset();
    let (mut input, _) = parser::xref_keyword(input).map_err(|_| Error::NoXref { offset })?;
    let mut xref = Xref::new(0, XrefType::CrossReferenceTable);

    loop {
        input = parser::skip_white_space(input);
        if parser::at_trailer(input) {
            break;
        }
        let (rest, (first, count)) = parser::subsection_header(input).map_err(|_| XrefError::Parse {
            offset: input.location_offset(),
        })?;
        input = read_subsection(rest, first, count, &mut xref, options)?;
    }

    let (_, trailer) = parser::trailer(input).map_err(|_| ParseError::InvalidTrailer)?;
    xref.size = declared_size(&trailer, options)?;
    Ok((xref, trailer))
}

/// `/Size` of a trailer or xref stream dictionary.
pub(crate) fn declared_size(dict: &Dictionary, options: &ParseOptions) -> Result<u32> {
    let size = dict
        .get(b"Size")
        .and_then(Object::as_i64)
        .map_err(|_| XrefError::MissingKey("Size"))?;
    match u32::try_from(size) {
        Ok(size) if size <= options.max_object_count.saturating_add(1) => Ok(size),
        _ => Err(Error::ValueOutOfRange(format!("/Size {} exceeds the object limit", size))),
    }
}
