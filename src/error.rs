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
//! Error types for streaming Tar decoding.

use std::string::FromUtf8Error;

use thiserror::Error;

/// Errors from decoding a single header field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// A numeric field doesn't hold ASCII octal digits.
    #[error("invalid octal in {field} field: {bytes:?}")]
    InvalidOctal {
        /// Name of the header field.
        field: &'static str,
        /// Raw field content including padding.
        bytes: Vec<u8>,
    },

    /// The mode field holds bits that are not UNIX permission bits.
    #[error("illegal mode bits: {0:#o}")]
    IllegalMode(u64),

    /// The stored checksum doesn't match the checksum computed over the block.
    #[error("checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        /// The checksum value stored in the header.
        stored: u64,
        /// The checksum computed from the header bytes.
        computed: u64,
    },
}

/// Errors that can occur while iterating entries or reading a body.
#[derive(Debug, Error)]
pub enum StreamError {
    /// I/O error yielded by the underlying byte source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A header at `pos` passed its checksum but can't be used, or failed its
    /// checksum under [`ChecksumPolicy::Error`].
    ///
    /// [`ChecksumPolicy::Error`]: crate::ChecksumPolicy::Error
    #[error("invalid header at position {pos}: {source}")]
    InvalidHeader {
        /// Offset of the header block in the archive.
        pos: u64,
        /// What is wrong with it.
        #[source]
        source: HeaderError,
    },

    /// The source ended while bytes of an entry were still owed.
    #[error("unexpected end of stream at position {pos}")]
    UnexpectedEof {
        /// Position in the archive where the source ran dry.
        pos: u64,
    },

    /// The body of an entry was started a second time.
    #[error("body already used")]
    BodyUsed,

    /// The previous entry was dropped before its data was read or skipped,
    /// so the position of the next header is unknown.
    #[error("previous entry was dropped before its body was consumed")]
    EntryAbandoned,

    /// The declared file size can't be buffered on this platform.
    #[error("entry of {0} bytes is too large to buffer")]
    SizeTooLarge(u64),

    /// The body is not valid UTF-8.
    #[error("invalid UTF-8 in body: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// The body is not valid JSON for the requested type.
    #[cfg(feature = "json")]
    #[error("invalid JSON in body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for stream decoding operations.
pub type Result<T> = std::result::Result<T, StreamError>;
