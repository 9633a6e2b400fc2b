//! Decoding of text database sources
//!
//! Files written by spreadsheet tools on Windows are often in the legacy
//! Windows-1252 code page rather than UTF-8.

use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The encoding a source was decoded with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    /// UTF-8, with or without a BOM
    Utf8,
    /// Fallback for legacy single-byte files
    Windows1252,
}

/// Decode source bytes: UTF-8 first (a BOM is dropped), then Windows-1252
pub fn decode(bytes: &[u8]) -> (Cow<'_, str>, SourceEncoding) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text), SourceEncoding::Utf8),
        Err(_) => {
            let (text, _had_errors) = WINDOWS_1252.decode_without_bom_handling(bytes);
            (text, SourceEncoding::Windows1252)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passes_through() {
        let (text, encoding) = decode("Kepco and \u{201c}TMK\u{201d} shunt".as_bytes());
        assert_eq!(text, "Kepco and \u{201c}TMK\u{201d} shunt");
        assert_eq!(encoding, SourceEncoding::Utf8);
    }

    #[test]
    fn test_bom_is_dropped() {
        let (text, _) = decode(b"\xEF\xBB\xBFmodel");
        assert_eq!(text, "model");
    }

    #[test]
    fn test_windows_1252_fallback() {
        // 0x93/0x94 are curly quotes and 0xD8 is a slashed O in Windows-1252
        let (text, encoding) = decode(b"Kepco and \x93TMK\x94 shunt \xd825mm");
        assert_eq!(text, "Kepco and \u{201c}TMK\u{201d} shunt \u{d8}25mm");
        assert_eq!(encoding, SourceEncoding::Windows1252);
    }
}
