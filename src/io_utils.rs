//! File reading and character decoding for dataset and document loading.
//!
//! All raw input flows through this module before parsing: bytes are decoded
//! via `encoding_rs` (UTF-8 by default) so the loader only ever sees `String`
//! data. Delimiter auto-detection lives with the loader in `dataset.rs`.

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn read_to_string(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Opening input file {path:?}"))?;
    decode_bytes(&bytes, encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some("latin1")).unwrap().name(), "windows-1252");
        assert!(resolve_encoding(Some("no-such-encoding")).is_err());
    }

    #[test]
    fn decode_bytes_round_trips_utf8() {
        let text = decode_bytes("Señora, ¿qué tal?".as_bytes(), UTF_8).unwrap();
        assert_eq!(text, "Señora, ¿qué tal?");
    }
}
