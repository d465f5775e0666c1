//! Header value decoding under the configured character coding.

use std::borrow::Cow;

use hyper::http::HeaderMap;
use thiserror::Error;

use crate::config::{CharCodingConfig, Charset, MalformedInputAction};

/// A header value is not valid in the configured charset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("header '{header}' is not valid {charset}")]
pub struct CharCodingError {
    pub header: String,
    pub charset: &'static str,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::UsAscii => "us-ascii",
            Charset::Latin1 => "iso-8859-1",
        }
    }
}

impl CharCodingConfig {
    /// Decode `value`. `None` means the bytes are malformed and the action is `Report`.
    pub fn decode<'a>(&self, value: &'a [u8]) -> Option<Cow<'a, str>> {
        match self.charset {
            Charset::Utf8 => match std::str::from_utf8(value) {
                Ok(s) => Some(Cow::Borrowed(s)),
                Err(_) if self.malformed_input == MalformedInputAction::Replace => {
                    Some(String::from_utf8_lossy(value))
                }
                Err(_) => None,
            },
            Charset::UsAscii => {
                if value.is_ascii() {
                    // ASCII is valid UTF-8.
                    std::str::from_utf8(value).ok().map(Cow::Borrowed)
                } else if self.malformed_input == MalformedInputAction::Replace {
                    Some(Cow::Owned(
                        value
                            .iter()
                            .map(|&b| if b.is_ascii() { b as char } else { '?' })
                            .collect(),
                    ))
                } else {
                    None
                }
            }
            Charset::Latin1 => Some(match std::str::from_utf8(value) {
                Ok(s) if value.is_ascii() => Cow::Borrowed(s),
                _ => Cow::Owned(value.iter().map(|&b| b as char).collect()),
            }),
        }
    }

    /// Check every header value of a request against the charset.
    pub fn check_headers(&self, headers: &HeaderMap) -> Result<(), CharCodingError> {
        for (name, value) in headers {
            if self.decode(value.as_bytes()).is_none() {
                return Err(CharCodingError {
                    header: name.as_str().to_string(),
                    charset: self.charset.name(),
                });
            }
        }
        Ok(())
    }
}
