use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Assembles a PDF file byte by byte so that tests know every offset.
#[allow(dead_code)]
pub struct PdfBuilder {
    buffer: Vec<u8>,
}

#[allow(dead_code)]
impl PdfBuilder {
    pub fn new() -> Self {
        PdfBuilder {
            buffer: b"%PDF-1.7\n".to_vec(),
        }
    }

    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Append raw bytes and return where they start.
    pub fn raw(&mut self, bytes: &[u8]) -> usize {
        let offset = self.offset();
        self.buffer.extend_from_slice(bytes);
        offset
    }

    pub fn object(&mut self, id: u32, body: &str) -> usize {
        self.raw(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes())
    }

    pub fn xref_stream(&mut self, id: u32, dict: &str, data: &[u8]) -> usize {
        let bytes = xref_stream_object(id, dict, data);
        self.raw(&bytes)
    }

    pub fn finish(mut self, startxref: usize) -> Vec<u8> {
        self.raw(format!("startxref\n{}\n%%EOF\n", startxref).as_bytes());
        self.buffer
    }
}

/// `id 0 obj` holding a `/Type /XRef` stream with `dict` added to its dictionary.
#[allow(dead_code)]
pub fn xref_stream_object(id: u32, dict: &str, data: &[u8]) -> Vec<u8> {
    let mut bytes = format!(
        "{} 0 obj\n<</Type /XRef /Length {} {}>>\nstream\n",
        id,
        data.len(),
        dict
    )
    .into_bytes();
    bytes.extend_from_slice(data);
    bytes.extend_from_slice(b"\nendstream\nendobj\n");
    bytes
}

/// Classic table section; entries are `(offset, generation, in use)` per subsection start.
#[allow(dead_code)]
pub fn xref_table(subsections: &[(u32, &[(u64, u16, bool)])], trailer: &str) -> String {
    let mut text = String::from("xref\n");
    for (first, entries) in subsections {
        text.push_str(&format!("{} {}\n", first, entries.len()));
        for (offset, generation, in_use) in entries.iter() {
            let kind = if *in_use { 'n' } else { 'f' };
            text.push_str(&format!("{:010} {:05} {}\r\n", offset, generation, kind));
        }
    }
    text.push_str(&format!("trailer\n{}\n", trailer));
    text
}

/// Big-endian record with the given field widths.
#[allow(dead_code)]
pub fn record(widths: [usize; 3], fields: [u64; 3]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (width, field) in widths.into_iter().zip(fields) {
        let be = field.to_be_bytes();
        bytes.extend_from_slice(&be[8 - width..]);
    }
    bytes
}

#[allow(dead_code)]
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
