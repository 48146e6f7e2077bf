//! Character encodings for attribute tables.

use std::fmt;
use std::str::FromStr;

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encoding used to decode text attributes of a boundary set.
///
/// `ascii` is strict 7-bit ASCII. Every other label is resolved through the
/// WHATWG encoding registry, so `latin1` and `iso-8859-1` select
/// `windows-1252`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TextEncoding {
    /// Strict 7-bit ASCII.
    #[default]
    Ascii,
    /// Any encoding known to the WHATWG registry.
    Whatwg(&'static Encoding),
}

/// Raised when an encoding label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown text encoding {label:?}")]
pub struct UnknownEncoding {
    /// The label as written in the definition.
    pub label: String,
}

impl TextEncoding {
    /// UTF-8, the encoding most modern data sources use.
    pub const UTF_8: Self = Self::Whatwg(encoding_rs::UTF_8);

    /// Resolve an encoding label such as `ascii`, `utf-8` or `iso-8859-1`.
    pub fn from_label(label: &str) -> Result<Self, UnknownEncoding> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("ascii") || trimmed.eq_ignore_ascii_case("us-ascii") {
            return Ok(Self::Ascii);
        }
        Encoding::for_label(trimmed.as_bytes())
            .map(Self::Whatwg)
            .ok_or_else(|| UnknownEncoding {
                label: label.to_owned(),
            })
    }

    /// Canonical name of the encoding.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Decode `bytes`, returning `None` when they are malformed for this
    /// encoding. No replacement characters are ever produced.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Ascii => bytes
                .is_ascii()
                .then(|| String::from_utf8_lossy(bytes).into_owned()),
            Self::Whatwg(encoding) => encoding
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(std::borrow::Cow::into_owned),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = UnknownEncoding;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_label(&value)
    }
}

impl From<TextEncoding> for String {
    fn from(value: TextEncoding) -> Self {
        value.name().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ascii", "ascii")]
    #[case("US-ASCII", "ascii")]
    #[case("utf-8", "UTF-8")]
    #[case("iso-8859-1", "windows-1252")]
    #[case(" latin1 ", "windows-1252")]
    fn resolves_labels(#[case] label: &str, #[case] name: &str) {
        let encoding = TextEncoding::from_label(label).expect("known label");
        assert_eq!(encoding.name(), name);
    }

    #[rstest]
    fn rejects_unknown_labels() {
        let err = TextEncoding::from_label("klingon").expect_err("unknown label");
        assert_eq!(err.label, "klingon");
    }

    #[rstest]
    fn ascii_is_strict() {
        assert_eq!(TextEncoding::Ascii.decode(b"Ward 1").as_deref(), Some("Ward 1"));
        assert_eq!(TextEncoding::Ascii.decode(b"Qu\xe9bec"), None);
    }

    #[rstest]
    fn latin1_decodes_high_bytes() {
        let encoding = TextEncoding::from_label("iso-8859-1").expect("known label");
        assert_eq!(encoding.decode(b"Qu\xe9bec").as_deref(), Some("Québec"));
    }

    #[rstest]
    fn utf8_rejects_malformed_bytes() {
        assert_eq!(TextEncoding::UTF_8.decode(b"Qu\xe9bec"), None);
    }

    #[rstest]
    fn deserializes_from_definition_strings() {
        let encoding: TextEncoding =
            serde_json::from_str("\"iso-8859-1\"").expect("deserialize encoding");
        assert_eq!(encoding.name(), "windows-1252");
        assert!(serde_json::from_str::<TextEncoding>("\"nope\"").is_err());
    }
}
