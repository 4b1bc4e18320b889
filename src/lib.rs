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
//! Library to read Tar archives incrementally from a stream of byte chunks, for archives that
//! arrive piecewise: a network download, a pipe, or a large file read block by block. Neither
//! the archive nor a single file is ever buffered as a whole. If you have the whole archive at
//! hand and need full feature support, I recommend the use of <https://crates.io/crates/tar>
//! instead.
//!
//! The crate is simple and only supports reading of "basic" archives, therefore no extensions,
//! such as GNU Longname or PAX headers. The maximum supported file name length is 100 bytes.
//! Compressed archives must be decompressed by the caller before the bytes are handed over.
//!
//! The source is any [`Stream`](futures::Stream) of `std::io::Result<Bytes>`. Chunks may have
//! any size; their boundaries don't need to line up with the 512 byte blocks of the archive.
//! Each [`Entry`] owns the source while its data is read and hands it back to [`Entries`] once
//! the data and its padding are consumed. Read or [skip](Entry::skip) every entry before asking
//! for the next one.
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use futures::executor::block_on;
//! use futures::stream;
//!
//! # fn archive() -> Vec<u8> {
//! #     let mut builder = tar::Builder::new(Vec::new());
//! #     let mut header = tar::Header::new_gnu();
//! #     header.set_size(5);
//! #     header.set_cksum();
//! #     builder.append_data(&mut header, "hello.txt", &b"hello"[..]).unwrap();
//! #     builder.into_inner().unwrap()
//! # }
//! let data = archive();
//! let chunks = data.chunks(100).map(|c| Ok(Bytes::copy_from_slice(c))).collect::<Vec<_>>();
//!
//! block_on(async {
//!     let mut entries = untar_stream::entries(stream::iter(chunks));
//!     while let Some(mut entry) = entries.next_entry().await? {
//!         if entry.name().ends_with(".txt") {
//!             let text = entry.text().await?;
//!             println!("{}: {}", entry.name(), text);
//!         } else {
//!             entry.skip().await?;
//!         }
//!     }
//!     Ok::<_, untar_stream::StreamError>(())
//! })
//! .unwrap();
//! ```

#![deny(rustdoc::all)]
#![allow(rustdoc::missing_doc_code_examples)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations)]

use std::io;

use bytes::Bytes;
use futures::Stream;

/// Each Archive Entry (either Header or Data Block) is a block of 512 bytes.
pub const BLOCKSIZE: usize = 512;

mod archive;
mod entry;
mod error;
mod handoff;
mod header;
mod options;
mod tar_format_types;

pub use archive::*;
pub use entry::{Body, Entry};
pub use error::*;
pub use header::*;
pub use options::*;
pub use tar_format_types::*;

/// An ordered source of byte chunks, such as an HTTP body or a
/// `tokio_util::io::ReaderStream`.
pub trait ByteSource: Stream<Item = io::Result<Bytes>> + Unpin {}

impl<T> ByteSource for T where T: Stream<Item = io::Result<Bytes>> + Unpin {}

/// Bytes a file of `size` bytes occupies in the archive: its data rounded up
/// to whole blocks.
pub(crate) const fn padded_size(size: u64) -> u64 {
    size.div_ceil(BLOCKSIZE as u64) * BLOCKSIZE as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_size() {
        assert_eq!(padded_size(0), 0);
        assert_eq!(padded_size(1), 512);
        assert_eq!(padded_size(100), 512);
        assert_eq!(padded_size(512), 512);
        assert_eq!(padded_size(513), 1024);
        assert_eq!(padded_size(5000), 5120);
    }
}
