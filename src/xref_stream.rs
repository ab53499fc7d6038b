use log::warn;

use crate::xref::{self, Xref, XrefEntry, XrefType};
use crate::{Dictionary, Error, Object, ParseOptions, Result, Stream, XrefError};

/// Widest field a record may declare; every field must fit in a u64.
pub const MAX_FIELD_WIDTH: u64 = 8;

/// Keys describing the stream itself rather than the document.
const STREAM_KEYS: [&[u8]; 6] = [b"Length", b"Filter", b"DecodeParms", b"W", b"Index", b"Type"];

/// Decode the records of a `/Type /XRef` stream into `xref`. Slots already set are kept.
pub fn read_stream(stream: &Stream, xref: &mut Xref, options: &ParseOptions) -> Result<()> {
    let dict = &stream.dict;
    if !dict.type_is(b"XRef") {
        return Err(XrefError::NotXrefStream.into());
    }
    let size = xref::declared_size(dict, options)?;
    let widths = field_widths(dict)?;
    let sections = sections(dict, size, options)?;

    let no_xref = Error::NoXref {
        offset: stream.start_position.unwrap_or(0),
    };
    let record_width = widths.iter().sum::<usize>();
    if record_width == 0 {
        return Err(no_xref);
    }
    let data = stream.decompressed_content()?;
    if data.len() % record_width != 0 {
        return Err(no_xref);
    }

    let available = data.len() / record_width;
    let declared = sections
        .iter()
        .fold(0usize, |total, &(_, count)| total.saturating_add(count as usize));
    if declared != available {
        warn!(
            "xref stream declares {} entries but holds {}, reading {}",
            declared,
            available,
            declared.min(available)
        );
    }

    let mut records = data.chunks_exact(record_width);
    'sections: for (start, count) in sections {
        for id in start..start + count {
            let Some(record) = records.next() else {
                break 'sections;
            };
            xref.insert_if_absent(id, decode_record(record, widths)?);
        }
    }
    xref.xref_type = XrefType::CrossReferenceStream;
    xref.size = xref.size.max(size);
    Ok(())
}

/// Decode an xref stream and return its entries with the trailer part of its dictionary.
pub fn decode_xref_stream(stream: Stream, options: &ParseOptions) -> Result<(Xref, Dictionary)> {
    let mut xref = Xref::new(0, XrefType::CrossReferenceStream);
    read_stream(&stream, &mut xref, options)?;
    let mut dict = stream.dict;
    for key in STREAM_KEYS {
        dict.remove(key);
    }
    Ok((xref, dict))
}

/// `/W` as three byte widths.
fn field_widths(dict: &Dictionary) -> Result<[usize; 3]> {
    let array = dict
        .get(b"W")
        .map_err(|_| XrefError::MissingKey("W"))?
        .as_array()
        .map_err(|_| Error::InvalidXrefStream("/W is not an array".into()))?;
    if array.len() != 3 {
        return Err(Error::InvalidXrefStream(format!("/W has {} entries instead of 3", array.len())));
    }

    let mut widths = [0usize; 3];
    let mut total: u64 = 0;
    for (slot, value) in widths.iter_mut().zip(array) {
        let width = value
            .as_i64()
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|&v| v <= MAX_FIELD_WIDTH)
            .ok_or_else(|| Error::InvalidXrefStream(format!("invalid field width {:?} in /W", value)))?;
        total = total
            .checked_add(width)
            .ok_or_else(|| Error::InvalidXrefStream("/W record width overflows".into()))?;
        *slot = width as usize;
    }
    Ok(widths)
}

/// `/Index` as `(start, count)` pairs, `[0 Size]` when absent.
fn sections(dict: &Dictionary, size: u32, options: &ParseOptions) -> Result<Vec<(u32, u32)>> {
    let array = match dict.get(b"Index") {
        Ok(index) => index
            .as_array()
            .map_err(|_| Error::InvalidXrefStream("/Index is not an array".into()))?,
        Err(_) => {
            xref::check_subsection(0, i64::from(size), options)?;
            return Ok(vec![(0, size)]);
        }
    };
    if array.len() % 2 != 0 {
        return Err(Error::InvalidXrefStream(format!("/Index has odd length {}", array.len())));
    }
    if array.is_empty() {
        warn!("xref stream has an empty /Index");
    }

    let mut sections = Vec::with_capacity(array.len() / 2);
    for pair in array.chunks_exact(2) {
        let start = index_value(&pair[0])?;
        let count = index_value(&pair[1])?;
        xref::check_subsection(start, count, options)?;
        // bounded by max_object_count
        sections.push((start as u32, count as u32));
    }
    Ok(sections)
}

fn index_value(value: &Object) -> Result<i64> {
    value
        .as_i64()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| Error::InvalidXrefStream(format!("invalid /Index value {:?}", value)))
}

/// One record. Generations are clamped like table entries.
fn decode_record(record: &[u8], widths: [usize; 3]) -> Result<XrefEntry> {
    let (kind, rest) = record.split_at(widths[0]);
    let (second, third) = rest.split_at(widths[1]);

    let kind = if kind.is_empty() { 1 } else { read_field(kind) };
    let second = read_field(second);
    let third = read_field(third);

    let entry = match kind {
        0 => XrefEntry::Free {
            next: second,
            generation: u16::try_from(third).unwrap_or(u16::MAX),
        },
        1 => XrefEntry::Normal {
            offset: second,
            generation: u16::try_from(third).unwrap_or(u16::MAX),
        },
        2 => XrefEntry::Compressed {
            container: u32::try_from(second)
                .map_err(|_| Error::ValueOutOfRange(format!("object stream number {}", second)))?,
            index: u32::try_from(third).map_err(|_| Error::ValueOutOfRange(format!("object stream index {}", third)))?,
        },
        other => return Err(Error::InvalidXrefType(other)),
    };
    Ok(entry)
}

/// Big-endian unsigned integer of at most eight bytes.
fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |value, &byte| (value << 8) | u64::from(byte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;

    fn xref_stream(dict: Dictionary, data: &[u8]) -> Stream {
        let mut dict = dict;
        dict.set("Type", Object::Name(b"XRef".to_vec()));
        Stream::new(dict, data.to_vec())
    }

    fn read(stream: &Stream) -> Result<Xref> {
        let mut xref = Xref::new(0, XrefType::CrossReferenceStream);
        read_stream(stream, &mut xref, &ParseOptions::default())?;
        Ok(xref)
    }

    #[test]
    fn compressed_entry_from_index() {
        let stream = xref_stream(
            dictionary! { "Size" => 4, "W" => vec![1.into(), 2.into(), 1.into()], "Index" => vec![2.into(), 2.into()] },
            &[0x02, 0x00, 0x02, 0x00],
        );
        let xref = read(&stream).unwrap();
        assert_eq!(xref.len(), 1);
        assert_eq!(xref.get(2), Some(&XrefEntry::Compressed { container: 2, index: 0 }));
    }

    #[test]
    fn all_entry_types() {
        let stream = xref_stream(
            dictionary! { "Size" => 3, "W" => vec![1.into(), 2.into(), 2.into()] },
            &[0, 0, 0, 0xFF, 0xFF, 1, 0x01, 0x00, 0, 0, 2, 0, 5, 0, 3],
        );
        let xref = read(&stream).unwrap();
        assert_eq!(xref.size, 3);
        assert_eq!(xref.get(0), Some(&XrefEntry::Free { next: 0, generation: 65535 }));
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 256, generation: 0 }));
        assert_eq!(xref.get(2), Some(&XrefEntry::Compressed { container: 5, index: 3 }));
    }

    #[test]
    fn missing_type_field_means_in_use() {
        let stream = xref_stream(
            dictionary! { "Size" => 2, "W" => vec![0.into(), 2.into(), 0.into()] },
            &[0x00, 0x10, 0x00, 0x20],
        );
        let xref = read(&stream).unwrap();
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 32, generation: 0 }));
    }

    #[test]
    fn width_overflow_and_negative_widths() {
        for widths in [
            vec![1.into(), 2.into(), Object::Integer(i64::MAX)],
            vec![1.into(), Object::Integer(-4), 2.into()],
            vec![1.into(), 2.into()],
            vec![1.into(), 9.into(), 1.into()],
        ] {
            let stream = xref_stream(dictionary! { "Size" => 1, "W" => widths }, &[0; 4]);
            assert!(matches!(read(&stream), Err(Error::InvalidXrefStream(_))));
        }
    }

    #[test]
    fn record_width_must_divide_data() {
        let stream = xref_stream(
            dictionary! { "Size" => 1, "W" => vec![4.into(), 4.into(), 4.into()] },
            &[1, 2, 3, 4, 5, 6, 7, 8],
        );
        assert!(matches!(read(&stream), Err(Error::NoXref { .. })));

        let stream = xref_stream(
            dictionary! { "Size" => 1, "W" => vec![0.into(), 0.into(), 0.into()] },
            &[],
        );
        assert!(matches!(read(&stream), Err(Error::NoXref { .. })));
    }

    #[test]
    fn unknown_entry_type() {
        let stream = xref_stream(
            dictionary! { "Size" => 1, "W" => vec![1.into(), 1.into(), 1.into()] },
            &[7, 0, 0],
        );
        assert!(matches!(read(&stream), Err(Error::InvalidXrefType(7))));
    }

    #[test]
    fn malformed_index() {
        for index in [
            vec![0.into(), 1.into(), 2.into()],
            vec![Object::Integer(-1), 1.into()],
            vec![0.into(), Object::Integer(-1)],
        ] {
            let stream = xref_stream(
                dictionary! { "Size" => 1, "W" => vec![1.into(), 1.into(), 1.into()], "Index" => index },
                &[1, 0, 0],
            );
            assert!(matches!(read(&stream), Err(Error::InvalidXrefStream(_))));
        }

        let stream = xref_stream(
            dictionary! { "Size" => 1, "W" => vec![1.into(), 1.into(), 1.into()], "Index" => vec![8_388_607.into(), 1.into()] },
            &[1, 0, 0],
        );
        assert!(matches!(
            read(&stream),
            Err(Error::InvalidXref(XrefError::ObjectCount { .. }))
        ));
    }

    #[test]
    fn short_data_is_clamped() {
        let stream = xref_stream(
            dictionary! { "Size" => 10, "W" => vec![1.into(), 1.into(), 1.into()], "Index" => vec![0.into(), 5.into(), 7.into(), 3.into()] },
            &[1, 10, 0, 1, 20, 0],
        );
        let xref = read(&stream).unwrap();
        assert_eq!(xref.len(), 2);
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 20, generation: 0 }));
    }

    #[test]
    fn requires_xref_type_and_keys() {
        let plain = Stream::new(dictionary! { "Size" => 1, "W" => vec![1.into(), 1.into(), 1.into()] }, vec![1, 0, 0]);
        assert!(matches!(read(&plain), Err(Error::InvalidXref(XrefError::NotXrefStream))));

        let no_w = xref_stream(dictionary! { "Size" => 1 }, &[1, 0, 0]);
        assert!(matches!(read(&no_w), Err(Error::InvalidXref(XrefError::MissingKey("W")))));

        let no_size = xref_stream(dictionary! { "W" => vec![1.into(), 1.into(), 1.into()] }, &[1, 0, 0]);
        assert!(matches!(read(&no_size), Err(Error::InvalidXref(XrefError::MissingKey("Size")))));
    }

    #[test]
    fn flate_with_png_up_predictor() {
        use flate2::{Compression, write::ZlibEncoder};
        use std::io::Write;

        // rows 01 0010 00 and 01 0020 00, each behind a PNG Up filter byte
        let encoded = [2, 1, 0, 0x10, 0, 2, 0, 0, 0x10, 0];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded).unwrap();
        let compressed = encoder.finish().unwrap();

        let stream = xref_stream(
            dictionary! {
                "Size" => 2,
                "W" => vec![1.into(), 2.into(), 1.into()],
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! { "Predictor" => 12, "Columns" => 4 },
            },
            &compressed,
        );
        let (xref, trailer) = decode_xref_stream(stream, &ParseOptions::default()).unwrap();
        assert_eq!(xref.get(0), Some(&XrefEntry::Normal { offset: 16, generation: 0 }));
        assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 32, generation: 0 }));
        assert!(trailer.has(b"Size"));
        for key in STREAM_KEYS {
            assert!(!trailer.has(key));
        }
    }
}
