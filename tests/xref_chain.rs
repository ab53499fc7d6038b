use pdfstruct::{DecompressError, Error, ParseOptions, Reader, XrefEntry, XrefError, XrefType};

mod utils;
use utils::{PdfBuilder, record, xref_stream_object};

const W: [usize; 3] = [1, 2, 1];

/// A file of `count` xref streams, each adding one object and pointing `/Prev` at the one before.
fn stream_chain(count: u32) -> Vec<u8> {
    let mut pdf = PdfBuilder::new();
    let mut prev: Option<usize> = None;
    for i in 0..count {
        let id = i + 1;
        let prev_key = prev.map(|offset| format!(" /Prev {}", offset)).unwrap_or_default();
        let dict = format!("/Size {} /W [1 2 1] /Index [{} 1]{}", count + 1, id, prev_key);
        prev = Some(pdf.xref_stream(count + 100 + i, &dict, &record(W, [1, u64::from(i), 0])));
    }
    let start = prev.unwrap_or(0);
    pdf.finish(start)
}

#[test]
fn long_stream_chain() {
    let file = stream_chain(10_000);
    let (xref, trailer) = Reader::new(&file).load().unwrap();
    assert_eq!(xref.len(), 10_000);
    assert_eq!(xref.size, 10_001);
    assert_eq!(xref.xref_type, XrefType::CrossReferenceStream);
    assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 0, generation: 0 }));
    assert_eq!(xref.get(10_000), Some(&XrefEntry::Normal { offset: 9_999, generation: 0 }));
    assert!(!trailer.has(b"Prev"));
    assert!(!trailer.has(b"W"));
}

#[test]
fn chain_length_is_capped() {
    let file = stream_chain(10);
    let options = ParseOptions::builder().max_xref_chain_length(5).build();
    let result = Reader::new(&file).with_options(options).load();
    assert!(matches!(result, Err(Error::InvalidXref(XrefError::ChainTooLong(5)))));
}

#[test]
fn two_cycle() {
    // streams pad /Prev to ten digits so their length is known before the other offset
    let header = PdfBuilder::new().offset();
    let stream = |prev: usize| xref_stream_object(9, &format!("/Size 3 /W [1 2 1] /Prev {:010}", prev), &[1, 0, 9, 0]);
    let first = header;
    let second = first + stream(0).len();

    let mut pdf = PdfBuilder::new();
    pdf.raw(&stream(second));
    pdf.raw(&stream(first));
    let file = pdf.finish(second);

    let result = Reader::new(&file).load();
    assert!(matches!(result, Err(Error::InvalidXref(XrefError::Cycle(offset))) if offset == second));
}

#[test]
fn prev_outside_file() {
    let mut pdf = PdfBuilder::new();
    let start = pdf.xref_stream(1, "/Size 1 /W [1 2 1] /Prev 999999", &[0, 0, 0, 0]);
    let file = pdf.finish(start);
    assert!(matches!(
        Reader::new(&file).load(),
        Err(Error::InvalidXref(XrefError::PrevStart))
    ));
}

#[test]
fn hybrid_stream_wins_over_its_table() {
    let mut pdf = PdfBuilder::new();
    let catalog = pdf.object(1, "<</Type /Catalog>>");
    let stream = pdf.xref_stream(5, "/Size 6 /W [1 2 1] /Index [2 1]", &record(W, [2, 5, 0]));
    let table = pdf.raw(
        utils::xref_table(
            &[(0, &[(0, 65535, false), (catalog as u64, 0, true), (999, 0, true)][..])],
            &format!("<</Size 3 /Root 1 0 R /XRefStm {}>>", stream),
        )
        .as_bytes(),
    );
    let file = pdf.finish(table);

    let (xref, trailer) = Reader::new(&file).load().unwrap();
    assert_eq!(xref.xref_type, XrefType::CrossReferenceTable);
    assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: catalog as u64, generation: 0 }));
    assert_eq!(xref.get(2), Some(&XrefEntry::Compressed { container: 5, index: 0 }));
    assert_eq!(xref.size, 3);
    assert!(!trailer.has(b"XRefStm"));
}

#[test]
fn bad_hybrid_offset() {
    let mut pdf = PdfBuilder::new();
    let table = pdf.raw(utils::xref_table(&[(0, &[(0, 65535, false)][..])], "<</Size 1 /XRefStm -5>>").as_bytes());
    let file = pdf.finish(table);
    assert!(matches!(
        Reader::new(&file).load(),
        Err(Error::InvalidXref(XrefError::StreamStart))
    ));
}

#[test]
fn revisions_merge_newest_first() {
    let mut pdf = PdfBuilder::new();
    let catalog = pdf.object(1, "<</Type /Catalog>>");
    let old_page = pdf.object(2, "<</Type /Page>>");
    let info = pdf.object(3, "<</Title (x)>>");
    let old_table = pdf.raw(
        utils::xref_table(
            &[(
                0,
                &[
                    (0, 65535, false),
                    (catalog as u64, 0, true),
                    (old_page as u64, 0, true),
                    (info as u64, 0, true),
                ][..],
            )],
            "<</Size 4 /Root 1 0 R /Info 3 0 R /ID [<AA> <BB>]>>",
        )
        .as_bytes(),
    );
    let new_page = pdf.object(2, "<</Type /Page /Rotate 90>>");
    let new_table = pdf.raw(
        utils::xref_table(
            &[(2, &[(new_page as u64, 0, true)][..])],
            &format!("<</Size 4 /Root 1 0 R /Prev {}>>", old_table),
        )
        .as_bytes(),
    );
    let file = pdf.finish(new_table);

    let (xref, trailer) = Reader::new(&file).load().unwrap();
    assert_eq!(xref.len(), 4);
    assert_eq!(xref.get(2), Some(&XrefEntry::Normal { offset: new_page as u64, generation: 0 }));
    assert_eq!(xref.get(3), Some(&XrefEntry::Normal { offset: info as u64, generation: 0 }));
    assert_eq!(trailer.get(b"Info").unwrap().as_reference().unwrap(), (3, 0));
    assert!(trailer.has(b"ID"));
    assert!(!trailer.has(b"Prev"));
}

#[test]
fn compressed_stream_revision_below_table() {
    let mut pdf = PdfBuilder::new();
    let mut data = record(W, [0, 0, 255]);
    data.extend(record(W, [1, 500, 0]));
    let data = utils::deflate(&data);
    let stream = pdf.xref_stream(7, "/Size 2 /W [1 2 1] /Filter /FlateDecode", &data);
    let table = pdf.raw(
        utils::xref_table(&[(1, &[(42, 1, true)][..])], &format!("<</Size 2 /Prev {}>>", stream)).as_bytes(),
    );
    let file = pdf.finish(table);

    let (xref, _) = Reader::new(&file).load().unwrap();
    assert_eq!(xref.get(0), Some(&XrefEntry::Free { next: 0, generation: 255 }));
    assert_eq!(xref.get(1), Some(&XrefEntry::Normal { offset: 42, generation: 1 }));
}

#[test]
fn truncated_compressed_stream_fails() {
    let data: Vec<u8> = (0..2000u64).flat_map(|i| record(W, [1, i * 3, i % 7])).collect();
    let mut data = utils::deflate(&data);
    data.truncate(data.len() * 3 / 4);

    let mut pdf = PdfBuilder::new();
    let stream = pdf.xref_stream(1, "/Size 2000 /W [1 2 1] /Filter /FlateDecode", &data);
    let file = pdf.finish(stream);
    assert!(matches!(
        Reader::new(&file).load(),
        Err(Error::Decompress(DecompressError::Flate(_)))
    ));
}
