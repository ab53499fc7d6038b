use std::io::{Result, Write};

use crate::content::KeywordInstance;
use crate::keyword::KeywordId;
use crate::{Dictionary, Object, Stream, StringFormat};

pub struct Writer;

impl Writer {
    fn need_separator(object: &Object) -> bool {
        matches!(
            object,
            Object::Null | Object::Boolean(_) | Object::Integer(_) | Object::Real(_) | Object::Reference(_)
        )
    }

    pub fn write_object(file: &mut dyn Write, object: &Object) -> Result<()> {
        match object {
            Object::Null => file.write_all(b"null"),
            Object::Boolean(value) => file.write_all(if *value { &b"true"[..] } else { &b"false"[..] }),
            Object::Integer(value) => file.write_all(itoa::Buffer::new().format(*value).as_bytes()),
            Object::Real(value) => Writer::write_real(file, *value),
            Object::Name(name) => Writer::write_name(file, name),
            Object::String(text, format) => Writer::write_string(file, text, *format),
            Object::Array(array) => Writer::write_array(file, array),
            Object::Dictionary(dict) => Writer::write_dictionary(file, dict),
            Object::Stream(stream) => Writer::write_stream(file, stream),
            Object::Reference(id) => write!(file, "{} {} R", id.0, id.1),
        }
    }

    /// Shortest text that reads back as the same real; whole values keep a `.0` so they stay reals.
    fn write_real(file: &mut dyn Write, value: f64) -> Result<()> {
        if !value.is_finite() {
            return file.write_all(b"0");
        }
        let text = value.to_string();
        file.write_all(text.as_bytes())?;
        if !text.contains('.') {
            file.write_all(b".0")?;
        }
        Ok(())
    }

    fn write_name(file: &mut dyn Write, name: &[u8]) -> Result<()> {
        file.write_all(b"/")?;
        for &byte in name {
            // white-space and delimiter chars are encoded to # sequences
            // also encode bytes outside of the range 33 (!) to 126 (~)
            if b" \t\n\r\x0C()<>[]{}/%#".contains(&byte) || !(33..=126).contains(&byte) {
                write!(file, "#{:02X}", byte)?;
            } else {
                file.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    fn write_string(file: &mut dyn Write, text: &[u8], format: StringFormat) -> Result<()> {
        match format {
            // Backslashes, carriage returns and unbalanced parentheses are escaped.
            StringFormat::Literal => {
                let mut escape_indice = Vec::new();
                let mut parentheses = Vec::new();
                for (index, &byte) in text.iter().enumerate() {
                    match byte {
                        b'(' => parentheses.push(index),
                        b')' => {
                            if parentheses.pop().is_none() {
                                escape_indice.push(index);
                            }
                        }
                        b'\\' | b'\r' => escape_indice.push(index),
                        _ => continue,
                    }
                }
                escape_indice.append(&mut parentheses);

                file.write_all(b"(")?;
                for (index, &byte) in text.iter().enumerate() {
                    if escape_indice.contains(&index) {
                        file.write_all(b"\\")?;
                        file.write_all(&[if byte == b'\r' { b'r' } else { byte }])?;
                    } else {
                        file.write_all(&[byte])?;
                    }
                }
                file.write_all(b")")?;
            }
            StringFormat::Hexadecimal => {
                file.write_all(b"<")?;
                for &byte in text {
                    write!(file, "{:02X}", byte)?;
                }
                file.write_all(b">")?;
            }
        }
        Ok(())
    }

    fn write_array(file: &mut dyn Write, array: &[Object]) -> Result<()> {
        file.write_all(b"[")?;
        let mut first = true;
        for object in array {
            if first {
                first = false;
            } else if Writer::need_separator(object) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, object)?;
        }
        file.write_all(b"]")?;
        Ok(())
    }

    fn write_dictionary(file: &mut dyn Write, dictionary: &Dictionary) -> Result<()> {
        file.write_all(b"<<")?;
        Writer::write_entries(file, dictionary)?;
        file.write_all(b">>")?;
        Ok(())
    }

    fn write_entries(file: &mut dyn Write, dictionary: &Dictionary) -> Result<()> {
        for (key, value) in dictionary {
            Writer::write_name(file, key)?;
            if Writer::need_separator(value) {
                file.write_all(b" ")?;
            }
            Writer::write_object(file, value)?;
        }
        Ok(())
    }

    fn write_stream(file: &mut dyn Write, stream: &Stream) -> Result<()> {
        Writer::write_dictionary(file, &stream.dict)?;
        file.write_all(b"stream\n")?;
        file.write_all(&stream.content)?;
        file.write_all(b"\nendstream")?;
        Ok(())
    }

    /// Operands separated by spaces, then the keyword and a newline.
    pub fn write_operation(file: &mut dyn Write, instance: &KeywordInstance) -> Result<()> {
        if let (KeywordId::BeginInlineImage, [Object::Stream(image)]) =
            (instance.keyword.id(), instance.operands.as_slice())
        {
            return Writer::write_inline_image(file, image);
        }
        for operand in &instance.operands {
            Writer::write_object(file, operand)?;
            file.write_all(b" ")?;
        }
        file.write_all(instance.keyword.as_str().as_bytes())?;
        file.write_all(b"\n")
    }

    fn write_inline_image(file: &mut dyn Write, image: &Stream) -> Result<()> {
        file.write_all(b"BI")?;
        for (key, value) in &image.dict {
            file.write_all(b" ")?;
            Writer::write_name(file, key)?;
            file.write_all(b" ")?;
            Writer::write_object(file, value)?;
        }
        file.write_all(b"\nID\n")?;
        file.write_all(&image.content)?;
        file.write_all(b"\nEI\n")
    }
}
