#![feature(test)]

extern crate test;
use pdfstruct::{OperatorGraph, Reader};

/// Incrementally updated file with `revisions` classic tables chained by `/Prev`.
fn incremental_file(revisions: u32) -> Vec<u8> {
    let mut buffer = b"%PDF-1.4\n".to_vec();
    let mut prev = None;
    for i in 0..revisions {
        let object = buffer.len();
        buffer.extend(format!("{} 0 obj\n<</Revision {}>>\nendobj\n", i + 1, i).as_bytes());
        let table = buffer.len();
        buffer.extend(format!("xref\n{} 1\n{:010} 00000 n\r\n", i + 1, object).as_bytes());
        let prev_key = prev.map(|p| format!(" /Prev {}", p)).unwrap_or_default();
        buffer.extend(format!("trailer\n<</Size {}{}>>\n", revisions + 1, prev_key).as_bytes());
        prev = Some(table);
    }
    buffer.extend(format!("startxref\n{}\n%%EOF\n", prev.unwrap_or(0)).as_bytes());
    buffer
}

#[bench]
fn bench_resolve_incremental(b: &mut test::test::Bencher) {
    let buffer = incremental_file(1000);
    b.iter(|| {
        Reader::new(&buffer).load().unwrap();
    })
}

#[bench]
fn bench_operator_graph(b: &mut test::test::Bencher) {
    let content = b"q 1 0 0 1 72 720 cm BT /F1 12 Tf 0 -14 Td [(Hello) -250 (World)] TJ ET 0 0 1 RG 10 10 100 100 re S Q "
        .repeat(500);
    b.iter(|| {
        OperatorGraph::parse(&content).unwrap();
    })
}
