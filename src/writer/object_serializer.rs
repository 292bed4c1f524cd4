//! PDF object serialization.
//!
//! Output is deterministic: dictionary keys are written in sorted order so
//! that the same object always yields the same bytes, which the signature
//! byte-range bookkeeping depends on.

use crate::object::{Dictionary, Object};

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Put each dictionary entry on its own line
    pretty: bool,
}

impl ObjectSerializer {
    /// Create a compact serializer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a serializer that writes one dictionary entry per line.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    /// Serialize a direct object.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize a direct object to a string (for logs and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).into_owned()
    }

    /// Serialize an indirect object definition: `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn serialize_indirect(&self, id: u32, gen: u16, obj: &Object) -> Vec<u8> {
        let mut buf = format!("{} {} obj\n", id, gen).into_bytes();
        self.write_object(&mut buf, obj);
        buf.extend_from_slice(b"\nendobj\n");
        buf
    }

    fn write_object(&self, buf: &mut Vec<u8>, obj: &Object) {
        match obj {
            Object::Null => buf.extend_from_slice(b"null"),
            Object::Boolean(b) => buf.extend_from_slice(if *b { b"true" } else { b"false" }),
            Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
            Object::Real(r) => write_real(buf, *r),
            Object::String(s) => write_string(buf, s),
            Object::Name(n) => write_name(buf, n),
            Object::Array(items) => {
                buf.push(b'[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        buf.push(b' ');
                    }
                    self.write_object(buf, item);
                }
                buf.push(b']');
            },
            Object::Dictionary(dict) => self.write_dictionary(buf, dict),
            Object::Stream { dict, data } => {
                let mut dict = dict.clone();
                dict.insert("Length".to_string(), Object::Integer(data.len() as i64));
                self.write_dictionary(buf, &dict);
                buf.extend_from_slice(b"\nstream\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\nendstream");
            },
            Object::Reference(r) => buf.extend_from_slice(r.to_string().as_bytes()),
        }
    }

    fn write_dictionary(&self, buf: &mut Vec<u8>, dict: &Dictionary) {
        let mut keys: Vec<&String> = dict.keys().collect();
        keys.sort();

        buf.extend_from_slice(b"<<");
        for key in keys {
            buf.extend_from_slice(if self.pretty { b"\n  " } else { b" " });
            write_name(buf, key);
            buf.push(b' ');
            self.write_object(buf, &dict[key]);
        }
        buf.extend_from_slice(if self.pretty && !dict.is_empty() { b"\n>>" } else { b" >>" });
    }
}

fn write_real(buf: &mut Vec<u8>, value: f64) {
    if value.fract() == 0.0 {
        buf.extend_from_slice((value as i64).to_string().as_bytes());
    } else {
        let formatted = format!("{:.5}", value);
        buf.extend_from_slice(formatted.trim_end_matches('0').trim_end_matches('.').as_bytes());
    }
}

/// Printable text becomes a literal string, anything else a hex string.
fn write_string(buf: &mut Vec<u8>, data: &[u8]) {
    let printable = data.iter().all(|&b| matches!(b, b'\n' | b'\r' | b'\t' | 0x20..=0x7E));

    if printable && !data.is_empty() {
        buf.push(b'(');
        for &byte in data {
            match byte {
                b'(' | b')' | b'\\' => buf.extend_from_slice(&[b'\\', byte]),
                b'\n' => buf.extend_from_slice(b"\\n"),
                b'\r' => buf.extend_from_slice(b"\\r"),
                b'\t' => buf.extend_from_slice(b"\\t"),
                _ => buf.push(byte),
            }
        }
        buf.push(b')');
    } else {
        buf.push(b'<');
        buf.extend_from_slice(hex_upper(data).as_bytes());
        buf.push(b'>');
    }
}

/// Regular characters are written as-is, everything else as `#XX`.
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for byte in name.bytes() {
        let regular = (0x21..=0x7E).contains(&byte)
            && !matches!(byte, b'#' | b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}');
        if regular {
            buf.push(byte);
        } else {
            buf.extend_from_slice(format!("#{:02X}", byte).as_bytes());
        }
    }
}

/// Uppercase hex encoding.
pub fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    #[test]
    fn test_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(false)), "false");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
        assert_eq!(s.serialize_to_string(&Object::Real(1.0)), "1");
        assert_eq!(s.serialize_to_string(&Object::Real(0.25)), "0.25");
    }

    #[test]
    fn test_strings() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::String(b"Test (parens)".to_vec())), "(Test \\(parens\\))");
        assert_eq!(s.serialize_to_string(&Object::String(vec![0x00, 0xFF])), "<00FF>");
        assert_eq!(s.serialize_to_string(&Object::String(vec![0; 4])), "<00000000>");
    }

    #[test]
    fn test_name_escaping() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::name("Adobe.PPKLite")), "/Adobe.PPKLite");
        assert_eq!(s.serialize_to_string(&Object::name("A B#")), "/A#20B#23");
    }

    #[test]
    fn test_dictionary_keys_sorted() {
        let s = ObjectSerializer::new();
        let mut dict = Dictionary::new();
        dict.insert("Type".to_string(), Object::name("Sig"));
        dict.insert("ByteRange".to_string(), Object::Array(vec![Object::Integer(0), Object::Integer(1)]));
        dict.insert("P".to_string(), Object::Reference(ObjectRef::new(3, 0)));

        assert_eq!(
            s.serialize_to_string(&Object::Dictionary(dict)),
            "<< /ByteRange [0 1] /P 3 0 R /Type /Sig >>"
        );
    }

    #[test]
    fn test_indirect_and_stream() {
        let s = ObjectSerializer::new();
        let stream = Object::Stream {
            dict: Dictionary::new(),
            data: bytes::Bytes::from_static(b"abc"),
        };
        let out = String::from_utf8(s.serialize_indirect(4, 0, &stream)).unwrap();
        assert_eq!(out, "4 0 obj\n<< /Length 3 >>\nstream\nabc\nendstream\nendobj\n");
    }

    #[test]
    fn test_output_reparses() {
        let s = ObjectSerializer::pretty();
        let mut dict = Dictionary::new();
        dict.insert("T".to_string(), Object::String(b"Signature".to_vec()));
        dict.insert("Rect".to_string(), Object::Array(vec![Object::Integer(0); 4]));
        let original = Object::Dictionary(dict);

        let bytes = s.serialize(&original);
        let (_, reparsed) = crate::parser::parse_object(&bytes).unwrap();
        assert_eq!(reparsed, original);
    }
}
