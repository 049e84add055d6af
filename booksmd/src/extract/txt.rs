//! Plain-text files: UTF-8 (with or without BOM), UTF-16 with BOM, or Windows-1252.

use encoding_rs::{Encoding, WINDOWS_1252};
use std::path::Path;

use super::ExtractionError;

pub fn extract_txt(path: &Path) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractionError::io(path, e))?;
    Ok(decode(&bytes))
}

fn decode(bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::debug!("Text file is not UTF-8, decoding as Windows-1252");
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}
