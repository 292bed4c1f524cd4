//! Stream decoders for the filters used by cross-reference and object streams.
//!
//! Signing never touches page content, so only FlateDecode and the PNG/TIFF
//! predictors it is usually combined with are needed to read the document
//! structure of a PDF 1.5+ file.

use crate::error::{Error, Result};

mod flate;
mod predictor;

pub use flate::FlateDecoder;
pub use predictor::{decode_predictor, DecodeParams};

/// Upper bound for a decoded structural stream (decompression bomb protection).
const MAX_DECOMPRESSED_SIZE: usize = 100 * 1024 * 1024;

/// Trait for PDF stream decoders.
pub trait StreamDecoder {
    /// Decode the input data.
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Get the name of this decoder (e.g., "FlateDecode").
    fn name(&self) -> &str;
}

/// Decode stream data through a filter pipeline, then undo the predictor.
pub fn decode_stream_with_params(
    data: &[u8],
    filters: &[String],
    params: Option<&DecodeParams>,
) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for filter_name in filters {
        let decoder: Box<dyn StreamDecoder> = match filter_name.as_str() {
            "FlateDecode" | "Fl" => Box::new(FlateDecoder),
            _ => return Err(Error::Unsupported(format!("stream filter /{}", filter_name))),
        };

        current = decoder.decode(&current)?;
        log::trace!("{} produced {} bytes", decoder.name(), current.len());

        if current.len() > MAX_DECOMPRESSED_SIZE {
            return Err(Error::Decode(format!(
                "decompressed size {} bytes exceeds limit {} bytes",
                current.len(),
                MAX_DECOMPRESSED_SIZE
            )));
        }
    }

    if let Some(params) = params {
        if params.predictor != 1 {
            current = decode_predictor(&current, params)?;
        }
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_decode_stream_no_filters() {
        let data = b"Hello, World!";
        let result = decode_stream_with_params(data, &[], None).unwrap();
        assert_eq!(result, data);
    }

    #[test]
    fn test_decode_stream_unsupported_filter() {
        let filters = vec!["DCTDecode".to_string()];
        let result = decode_stream_with_params(b"test", &filters, None);
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_flate_then_up_predictor() {
        let rows = [2u8, 1, 0, 10, 2, 0, 0, 5];
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&rows).unwrap();
        let compressed = encoder.finish().unwrap();

        let params = DecodeParams {
            predictor: 12,
            columns: 3,
            ..Default::default()
        };
        let filters = vec!["FlateDecode".to_string()];
        let decoded = decode_stream_with_params(&compressed, &filters, Some(&params)).unwrap();
        assert_eq!(decoded, vec![1, 0, 10, 1, 0, 15]);
    }
}
