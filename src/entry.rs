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
//! Module for [`Entry`] and its [`Body`].

use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::{Result, StreamError};
use crate::handoff::Deliver;
use crate::header::HeaderBlock;
use crate::options::TextEncoding;
use crate::{padded_size, ByteSource};

/// The source together with the bytes already pulled from it that belong
/// after the end of an entry.
#[derive(Debug)]
pub(crate) struct Leftover<S> {
    pub(crate) source: S,
    pub(crate) bytes: Bytes,
}

/// Exclusive use of the source, returned through `done` once the padded
/// extent is consumed.
struct Lease<S> {
    source: S,
    done: Deliver<Leftover<S>>,
}

/// A file in a Tar archive.
///
/// While an entry with data is alive it owns the byte source. The [`Entries`]
/// decoder gets the source back only after the entry's data including its
/// padding was consumed, by reading the [`Body`] to the end, by one of the
/// convenience reads, or by [`Entry::skip`]. Dropping an entry before that
/// makes the next call to [`Entries::next_entry`] fail with
/// [`StreamError::EntryAbandoned`].
///
/// [`Entries`]: crate::Entries
/// [`Entries::next_entry`]: crate::Entries::next_entry
pub struct Entry<S> {
    header: HeaderBlock,
    name: String,
    file_size: u64,
    body_used: bool,
    /// Bytes of the padded extent not handed out yet.
    remaining: u64,
    /// Bytes pulled along with the header that belong to this entry.
    carried: Option<Bytes>,
    lease: Option<Lease<S>>,
    /// Archive offset of the next byte of the padded extent.
    pos: u64,
    text_encoding: TextEncoding,
}

impl<S: ByteSource> Entry<S> {
    /// Creates an entry that owns `source` until its padded extent is
    /// consumed. `carried` are bytes following the header that were already
    /// pulled from the source.
    pub(crate) fn new(
        header: HeaderBlock,
        file_size: u64,
        source: S,
        done: Deliver<Leftover<S>>,
        carried: Bytes,
        pos: u64,
        text_encoding: TextEncoding,
    ) -> Self {
        Self {
            name: header.name(),
            header,
            file_size,
            body_used: false,
            remaining: padded_size(file_size),
            carried: (!carried.is_empty()).then_some(carried),
            lease: Some(Lease { source, done }),
            pos,
            text_encoding,
        }
    }

    /// An entry without data. It never touches the source.
    pub(crate) fn empty(header: HeaderBlock, pos: u64, text_encoding: TextEncoding) -> Self {
        Self {
            name: header.name(),
            header,
            file_size: 0,
            body_used: false,
            remaining: 0,
            carried: None,
            lease: None,
            pos,
            text_encoding,
        }
    }

    /// Marks the body as started. Fails the second time.
    fn begin(&mut self) -> Result<()> {
        if self.body_used {
            return Err(StreamError::BodyUsed);
        }
        self.body_used = true;
        Ok(())
    }

    /// Pulls the next piece of the padded extent, carried bytes first.
    ///
    /// The piece that completes the extent hands the source back together
    /// with whatever followed it in the same chunk.
    async fn pull_extent(&mut self) -> Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let mut chunk = loop {
            let chunk = match self.carried.take() {
                Some(chunk) => chunk,
                None => {
                    let Some(lease) = self.lease.as_mut() else {
                        return Err(StreamError::UnexpectedEof { pos: self.pos });
                    };
                    match lease.source.next().await {
                        Some(chunk) => chunk?,
                        None => return Err(StreamError::UnexpectedEof { pos: self.pos }),
                    }
                }
            };
            if !chunk.is_empty() {
                break chunk;
            }
        };

        let within_entry = clamp(self.remaining, chunk.len());
        let piece = chunk.split_to(within_entry);
        self.remaining -= within_entry as u64;
        self.pos += within_entry as u64;

        if self.remaining == 0 {
            if let Some(Lease { source, done }) = self.lease.take() {
                log::trace!(
                    "{:?}: extent consumed, returning source with {} leftover bytes",
                    self.name,
                    chunk.len()
                );
                done.deliver(Leftover {
                    source,
                    bytes: chunk,
                });
            }
        }

        Ok(Some(piece))
    }

    /// The exact file contents, `file_size` bytes in total.
    ///
    /// Nothing is read until the first [`Body::chunk`] call, which fails with
    /// [`StreamError::BodyUsed`] if the body was started before.
    pub fn body(&mut self) -> Body<'_, S> {
        Body {
            remaining: self.file_size,
            entry: self,
            started: false,
        }
    }

    /// Discards the data of this entry without exposing it.
    pub async fn skip(&mut self) -> Result<()> {
        self.begin()?;
        while self.pull_extent().await?.is_some() {}
        Ok(())
    }

    /// Reads the whole file into memory.
    pub async fn bytes(&mut self) -> Result<Vec<u8>> {
        let size = self.file_size;
        let capacity = usize::try_from(size).map_err(|_| StreamError::SizeTooLarge(size))?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| StreamError::SizeTooLarge(size))?;

        let mut body = self.body();
        while let Some(chunk) = body.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        if buf.len() != capacity {
            return Err(StreamError::UnexpectedEof { pos: self.pos });
        }
        Ok(buf)
    }

    /// Reads the whole file as text in the configured encoding.
    ///
    /// See [`Options::text_encoding`](crate::Options::text_encoding).
    pub async fn text(&mut self) -> Result<String> {
        self.text_with(self.text_encoding).await
    }

    /// Reads the whole file as text in the given encoding.
    pub async fn text_with(&mut self, encoding: TextEncoding) -> Result<String> {
        encoding.decode(self.bytes().await?)
    }

    /// Reads the whole file as JSON text in the configured encoding.
    #[cfg(feature = "json")]
    pub async fn json<T: serde::de::DeserializeOwned>(&mut self) -> Result<T> {
        self.json_with(self.text_encoding).await
    }

    /// Reads the whole file as JSON text in the given encoding.
    #[cfg(feature = "json")]
    pub async fn json_with<T: serde::de::DeserializeOwned>(
        &mut self,
        encoding: TextEncoding,
    ) -> Result<T> {
        let text = self.text_with(encoding).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl<S> Entry<S> {
    /// Name of the file.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the file in bytes.
    #[must_use]
    pub const fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes the file occupies in the archive, padding included.
    #[must_use]
    pub const fn padded_size(&self) -> u64 {
        padded_size(self.file_size)
    }

    /// Whether the body has been read or partially read.
    #[must_use]
    pub const fn body_used(&self) -> bool {
        self.body_used
    }

    /// The header block this entry was decoded from.
    #[must_use]
    pub const fn header(&self) -> &HeaderBlock {
        &self.header
    }
}

impl<S> Debug for Entry<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.name)
            .field("file_size", &self.file_size)
            .field("body_used", &self.body_used)
            .field("remaining", &self.remaining)
            .field("owns_source", &self.lease.is_some())
            .finish()
    }
}

/// Number of bytes of a `len` byte chunk that fit into `remaining`.
fn clamp(remaining: u64, len: usize) -> usize {
    usize::try_from(remaining).map_or(len, |remaining| remaining.min(len))
}

/// The data of one [`Entry`], without padding.
///
/// Once the last data byte is handed out, the padding behind it is consumed
/// as well, so the source always ends up at the next header.
pub struct Body<'a, S> {
    entry: &'a mut Entry<S>,
    remaining: u64,
    started: bool,
}

impl<'a, S: ByteSource> Body<'a, S> {
    /// The next chunk of file data, or `None` after the last one.
    ///
    /// # Errors
    /// - [`StreamError::BodyUsed`] if the entry's body was started before.
    /// - [`StreamError::UnexpectedEof`] if the source ends inside the entry.
    /// - [`StreamError::Io`] for errors of the source.
    pub async fn chunk(&mut self) -> Result<Option<Bytes>> {
        if !self.started {
            self.entry.begin()?;
            self.started = true;
        }

        if self.remaining == 0 {
            self.drain_padding().await?;
            return Ok(None);
        }

        let mut chunk = self
            .entry
            .pull_extent()
            .await?
            .ok_or(StreamError::UnexpectedEof {
                pos: self.entry.pos,
            })?;
        let within_file = clamp(self.remaining, chunk.len());
        chunk.truncate(within_file);
        self.remaining -= within_file as u64;

        if self.remaining == 0 {
            self.drain_padding().await?;
        }
        Ok(Some(chunk))
    }

    async fn drain_padding(&mut self) -> Result<()> {
        while self.entry.pull_extent().await?.is_some() {}
        Ok(())
    }

    /// Turns the body into a [`Stream`] of chunks.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> + 'a {
        futures::stream::try_unfold(self, |mut body| async move {
            Ok::<_, StreamError>(body.chunk().await?.map(|chunk| (chunk, body)))
        })
    }
}

impl<S> Body<'_, S> {
    /// Data bytes not handed out yet.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<S> Debug for Body<'_, S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("entry", &self.entry.name)
            .field("remaining", &self.remaining)
            .field("started", &self.started)
            .finish()
    }
}
