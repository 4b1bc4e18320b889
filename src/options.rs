/*
MIT License

Copyright (c) 2021 Philipp Schuster

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/
//! Module for [`Options`].

use std::str::FromStr;

use thiserror::Error;

use crate::error::Result;

/// What to do with a header block whose checksum doesn't match.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Stop yielding entries, as if the archive ended there.
    ///
    /// A corrupt archive is then indistinguishable from one with fewer
    /// files, apart from a warning in the log.
    #[default]
    EndOfArchive,
    /// Fail with [`StreamError::InvalidHeader`].
    ///
    /// [`StreamError::InvalidHeader`]: crate::StreamError::InvalidHeader
    Error,
}

/// Character encoding used to turn a body into text.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8. Invalid sequences are an error.
    #[default]
    Utf8,
    /// UTF-8. Invalid sequences are replaced with `U+FFFD`.
    Utf8Lossy,
    /// ISO-8859-1, every byte maps to the code point of the same value.
    Latin1,
}

impl TextEncoding {
    /// Decodes `bytes` into a string.
    ///
    /// # Errors
    /// Returns [`StreamError::Utf8`] for invalid input to [`TextEncoding::Utf8`].
    ///
    /// [`StreamError::Utf8`]: crate::StreamError::Utf8
    pub fn decode(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Self::Utf8 => Ok(String::from_utf8(bytes)?),
            Self::Utf8Lossy => Ok(String::from_utf8(bytes)
                .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())),
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

/// Error for an encoding label that isn't supported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown text encoding {0:?}")]
pub struct UnknownEncodingError(String);

impl FromStr for TextEncoding {
    type Err = UnknownEncodingError;

    /// Accepts the common labels, case-insensitively.
    fn from_str(label: &str) -> std::result::Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "unicode-1-1-utf-8" => Ok(Self::Utf8),
            "utf-8-lossy" | "utf8-lossy" => Ok(Self::Utf8Lossy),
            "latin1" | "latin-1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(Self::Latin1),
            _ => Err(UnknownEncodingError(label.to_string())),
        }
    }
}

/// Configuration of an [`Entries`] decoder.
///
/// # Example
///
/// ```
/// use untar_stream::{ChecksumPolicy, Options, TextEncoding};
///
/// let options = Options {
///     text_encoding: TextEncoding::Latin1,
///     ..Options::strict()
/// };
/// assert_eq!(options.checksum_mismatch, ChecksumPolicy::Error);
/// ```
///
/// [`Entries`]: crate::Entries
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Options {
    /// Handling of headers that fail checksum validation.
    ///
    /// Default: [`ChecksumPolicy::EndOfArchive`].
    pub checksum_mismatch: ChecksumPolicy,

    /// Encoding used by [`Entry::text`] and `Entry::json`.
    ///
    /// Default: [`TextEncoding::Utf8`].
    ///
    /// [`Entry::text`]: crate::Entry::text
    pub text_encoding: TextEncoding,
}

impl Options {
    /// Create a new `Options` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for archives that must not be silently cut short: a header
    /// that fails its checksum is an error.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            checksum_mismatch: ChecksumPolicy::Error,
            ..Self::default()
        }
    }
}
