//! Object streams (`/Type /ObjStm`, PDF 1.5+).
//!
//! The decoded stream starts with `/N` pairs of integers (object number,
//! offset relative to `/First`) followed by the object bodies.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

/// Parse every object packed into an object stream, keyed by object number.
///
/// Objects that fail to parse are logged and skipped.
pub fn parse_object_stream(stream: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream {
        Object::Stream { dict, .. } => dict,
        other => {
            return Err(Error::InvalidObjectType {
                expected: "Stream".to_string(),
                found: other.type_name().to_string(),
            })
        },
    };

    if let Some(kind) = dict.get("Type").and_then(|o| o.as_name()) {
        if kind != "ObjStm" {
            return Err(Error::InvalidPdf(format!("expected /Type /ObjStm, got /{}", kind)));
        }
    }

    let count = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::InvalidPdf("object stream without a valid /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::InvalidPdf("object stream without a valid /First".to_string()))?;

    let decoded = stream.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream holds {} bytes, /First is {}",
            decoded.len(),
            first
        )));
    }

    let (header, bodies) = decoded.split_at(first);
    let mut objects = HashMap::with_capacity(count);

    for (id, offset) in read_offset_pairs(header, count)? {
        let Some(body) = bodies.get(offset..) else {
            log::warn!("Object {} offset {} lies outside its object stream", id, offset);
            continue;
        };
        match parse_object(body) {
            Ok((_, object)) => {
                objects.insert(id, object);
            },
            Err(e) => log::warn!("Skipping unparsable object {} in object stream: {:?}", id, e),
        }
    }

    Ok(objects)
}

fn read_offset_pairs(mut header: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let mut next_int = |what: &str| -> Result<i64> {
        match token(header) {
            Ok((rest, Token::Integer(n))) => {
                header = rest;
                Ok(n)
            },
            _ => Err(Error::InvalidPdf(format!("object stream header: expected {}", what))),
        }
    };

    (0..count)
        .map(|_| {
            let id = next_int("object number")?;
            let offset = next_int("offset")?;
            match (u32::try_from(id), usize::try_from(offset)) {
                (Ok(id), Ok(offset)) => Ok((id, offset)),
                _ => Err(Error::InvalidPdf(format!("bad object stream pair {} {}", id, offset))),
            }
        })
        .collect()
}
