//! Text encodings understood by the codec
//!
//! Decoding is strict: bytes that are not valid under the declared
//! encoding fail with [`Error::Encoding`] carrying the byte offset of the
//! first bad unit. Nothing is ever replaced with U+FFFD.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// A supported text encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8 without byte-order mark. A leading U+FEFF is kept as content.
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-8 with byte-order mark. The BOM is optional on read, always written.
    #[serde(rename = "utf-8-bom")]
    Utf8Bom,
    /// UTF-16 little endian, BOM optional on read, always written.
    #[serde(rename = "utf-16le")]
    Utf16Le,
    /// UTF-16 big endian, BOM optional on read, always written.
    #[serde(rename = "utf-16be")]
    Utf16Be,
}

impl Encoding {
    /// Identifier used in option files and on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf8Bom => "utf-8-bom",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
        }
    }

    /// The byte-order mark written on output, if any
    pub fn bom(&self) -> &'static [u8] {
        match self {
            Encoding::Utf8 => &[],
            Encoding::Utf8Bom => UTF8_BOM,
            Encoding::Utf16Le => UTF16LE_BOM,
            Encoding::Utf16Be => UTF16BE_BOM,
        }
    }

    /// Decode raw bytes into text
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => decode_utf8(*self, bytes, 0),
            Encoding::Utf8Bom => {
                let skip = if bytes.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
                decode_utf8(*self, &bytes[skip..], skip)
            }
            Encoding::Utf16Le | Encoding::Utf16Be => {
                let bom = self.bom();
                let skip = if bytes.starts_with(bom) { bom.len() } else { 0 };
                decode_utf16(*self, &bytes[skip..], skip)
            }
        }
    }

    /// Encode text into bytes, prefixed with this encoding's BOM
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() + 3);
        out.extend_from_slice(self.bom());
        match self {
            Encoding::Utf8 | Encoding::Utf8Bom => out.extend_from_slice(text.as_bytes()),
            Encoding::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Encoding::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
        out
    }
}

fn decode_utf8(encoding: Encoding, bytes: &[u8], base: usize) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(e) => Err(Error::Encoding {
            encoding,
            offset: base + e.valid_up_to(),
            message: e.to_string(),
        }),
    }
}

fn decode_utf16(encoding: Encoding, bytes: &[u8], base: usize) -> Result<String> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Encoding {
            encoding,
            offset: base + bytes.len() - 1,
            message: "odd number of bytes".to_string(),
        });
    }

    let units = bytes.chunks_exact(2).map(|pair| match encoding {
        Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
        _ => u16::from_le_bytes([pair[0], pair[1]]),
    });

    let mut text = String::with_capacity(bytes.len() / 2);
    let mut consumed = 0usize;
    for decoded in char::decode_utf16(units) {
        match decoded {
            Ok(c) => {
                consumed += c.len_utf16();
                text.push(c);
            }
            Err(e) => {
                return Err(Error::Encoding {
                    encoding,
                    offset: base + consumed * 2,
                    message: format!("unpaired surrogate 0x{:04X}", e.unpaired_surrogate()),
                });
            }
        }
    }
    Ok(text)
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "utf-8-bom" | "utf8-bom" | "utf-8-sig" => Ok(Encoding::Utf8Bom),
            "utf-16le" | "utf16le" => Ok(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Encoding::Utf16Be),
            other => Err(format!(
                "unknown encoding '{}', expected one of utf-8, utf-8-bom, utf-16le, utf-16be",
                other
            )),
        }
    }
}
