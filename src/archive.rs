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
//! Module for [`Entries`].

use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::entry::{Entry, Leftover};
use crate::error::{Result, StreamError};
use crate::handoff::{handoff, Pending};
use crate::header::HeaderBlock;
use crate::options::{ChecksumPolicy, Options};
use crate::{padded_size, ByteSource, BLOCKSIZE};

/// Decoder that yields the entries of a Tar archive as its bytes arrive.
///
/// Each step starts at the next header block. Entries come in archive order
/// and only one of them is live at a time: the data of an entry must be read
/// to the end or skipped before the next one is requested. Waiting for the
/// next entry while still holding an unfinished one never completes, and
/// dropping an unfinished one ends the sequence with
/// [`StreamError::EntryAbandoned`].
///
/// The archive ends when the source is exhausted between two entries or at a
/// header block that fails checksum validation (see [`ChecksumPolicy`]).
pub struct Entries<S> {
    /// `None` while an entry owns the source.
    source: Option<S>,
    /// Pulled from the source but not consumed yet.
    chunk: Bytes,
    header_buf: [u8; BLOCKSIZE],
    /// Bytes of `header_buf` filled so far.
    filled: usize,
    /// Returns the source once the current entry is done.
    pending: Option<Pending<Leftover<S>>>,
    options: Options,
    /// Archive offset of the first byte of `chunk`.
    pos: u64,
    done: bool,
}

impl<S: ByteSource> Entries<S> {
    /// Decodes the archive in `source` with default [`Options`].
    pub fn new(source: S) -> Self {
        Self::with_options(source, Options::default())
    }

    /// Decodes the archive in `source` with the given [`Options`].
    pub fn with_options(source: S, options: Options) -> Self {
        Self {
            source: Some(source),
            chunk: Bytes::new(),
            header_buf: [0; BLOCKSIZE],
            filled: 0,
            pending: None,
            options,
            pos: 0,
            done: false,
        }
    }

    /// Returns the next entry, or `None` at the end of the archive.
    ///
    /// After `None` or an error, all further calls return `None`.
    pub async fn next_entry(&mut self) -> Result<Option<Entry<S>>> {
        if self.done {
            return Ok(None);
        }
        let next = self.read_entry().await;
        if !matches!(next, Ok(Some(_))) {
            self.done = true;
        }
        next
    }

    /// Turns the decoder into a [`Stream`] of entries.
    pub fn into_stream(self) -> impl Stream<Item = Result<Entry<S>>> {
        futures::stream::try_unfold(self, |mut entries| async move {
            Ok::<_, StreamError>(entries.next_entry().await?.map(|entry| (entry, entries)))
        })
    }

    /// Waits until the previous entry hands the source back.
    ///
    /// `pending` is only cleared once the wait resolved, so a cancelled
    /// `next_entry` call can be repeated.
    async fn reclaim_source(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.as_mut() {
            let reclaimed = pending.wait().await;
            self.pending = None;
            let Ok(Leftover { source, bytes }) = reclaimed else {
                log::warn!("Entry was dropped before its body was consumed!");
                return Err(StreamError::EntryAbandoned);
            };
            self.source = Some(source);
            self.chunk = bytes;
        }
        Ok(())
    }

    async fn read_entry(&mut self) -> Result<Option<Entry<S>>> {
        self.reclaim_source().await?;

        loop {
            if self.chunk.is_empty() {
                let Some(source) = self.source.as_mut() else {
                    return Err(StreamError::EntryAbandoned);
                };
                match source.next().await {
                    Some(chunk) => {
                        self.chunk = chunk?;
                        continue;
                    }
                    None => return self.end_of_source(),
                }
            }

            let take = (BLOCKSIZE - self.filled).min(self.chunk.len());
            let part = self.chunk.split_to(take);
            self.header_buf[self.filled..self.filled + take].copy_from_slice(&part);
            self.filled += take;
            self.pos += take as u64;

            if self.filled == BLOCKSIZE {
                self.filled = 0;
                return self.accept_header(HeaderBlock::new(self.header_buf));
            }
        }
    }

    fn end_of_source(&self) -> Result<Option<Entry<S>>> {
        if self.filled == 0 {
            log::debug!("End of Tar archive at position {}", self.pos);
            return Ok(None);
        }
        log::warn!(
            "Tar archive ended with {} bytes of an incomplete header block!",
            self.filled
        );
        match self.options.checksum_mismatch {
            ChecksumPolicy::EndOfArchive => Ok(None),
            ChecksumPolicy::Error => Err(StreamError::UnexpectedEof { pos: self.pos }),
        }
    }

    /// Validates a complete header block and builds its entry. An entry with
    /// data takes the source and the rest of the current chunk along.
    fn accept_header(&mut self, header: HeaderBlock) -> Result<Option<Entry<S>>> {
        let header_pos = self.pos - BLOCKSIZE as u64;

        if let Err(e) = header.verify_checksum() {
            if header.is_zero_block() {
                log::debug!("End of Tar archive with zero block at position {header_pos}");
                return Ok(None);
            }
            return match self.options.checksum_mismatch {
                ChecksumPolicy::EndOfArchive => {
                    log::warn!(
                        "Header at position {header_pos} is invalid ({e}), treating it as end of archive!"
                    );
                    Ok(None)
                }
                ChecksumPolicy::Error => Err(StreamError::InvalidHeader {
                    pos: header_pos,
                    source: e,
                }),
            };
        }

        let file_size = header.file_size().map_err(|source| StreamError::InvalidHeader {
            pos: header_pos,
            source,
        })?;
        log::trace!(
            "Found entry {:?} of {} bytes at position {}",
            header.name(),
            file_size,
            header_pos
        );

        if file_size == 0 {
            return Ok(Some(Entry::empty(
                header,
                self.pos,
                self.options.text_encoding,
            )));
        }

        let Some(source) = self.source.take() else {
            return Err(StreamError::EntryAbandoned);
        };
        let (done, pending) = handoff();
        self.pending = Some(pending);
        let carried = std::mem::take(&mut self.chunk);
        let data_pos = self.pos;
        self.pos += padded_size(file_size);

        Ok(Some(Entry::new(
            header,
            file_size,
            source,
            done,
            carried,
            data_pos,
            self.options.text_encoding,
        )))
    }
}

impl<S> Entries<S> {
    /// Archive offset of the next byte the decoder will look at.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// The options this decoder was created with.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }
}

impl<S> Debug for Entries<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entries")
            .field("pos", &self.pos)
            .field("header_bytes", &self.filled)
            .field("buffered", &self.chunk.len())
            .field("awaiting_entry", &self.pending.is_some())
            .field("done", &self.done)
            .field("options", &self.options)
            .finish()
    }
}

/// Iterates over the files in the Tar archive read from `source`.
pub fn entries<S: ByteSource>(source: S) -> Entries<S> {
    Entries::new(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeaderError;
    use crate::header::tests::header_bytes;
    use futures::executor::block_on;
    use futures::{stream, FutureExt};

    /// Header plus data padded to the block size.
    fn member(name: &[u8], data: &[u8]) -> Vec<u8> {
        let mut out = header_bytes(name, data.len() as u64).to_vec();
        out.extend_from_slice(data);
        out.resize(out.len() + (padded_size(data.len() as u64) as usize - data.len()), 0);
        out
    }

    fn archive(members: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut out = members
            .iter()
            .flat_map(|(name, data)| member(name, data))
            .collect::<Vec<_>>();
        out.extend_from_slice(&[0; 2 * BLOCKSIZE]);
        out
    }

    fn chunked(data: &[u8], size: usize) -> impl ByteSource {
        stream::iter(
            data.chunks(size)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_entries_in_order() {
        let data = archive(&[(b"a.txt", b"first"), (b"b.txt", b"second")]);
        let mut entries = entries(chunked(&data, 100));
        block_on(async {
            let mut entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entry.name(), "a.txt");
            assert_eq!(entry.text().await.unwrap(), "first");
            let mut entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entry.name(), "b.txt");
            assert_eq!(entry.text().await.unwrap(), "second");
            assert!(entries.next_entry().await.unwrap().is_none());
            assert!(entries.next_entry().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_zero_sized_entry_keeps_the_source() {
        let data = archive(&[(b"empty", b""), (b"full", b"xyz")]);
        let mut entries = entries(chunked(&data, 4096));
        block_on(async {
            let entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entry.file_size(), 0);
            assert!(!entry.body_used());
            // never read, nothing to hand back
            drop(entry);
            let mut entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entry.name(), "full");
            assert_eq!(entry.bytes().await.unwrap(), b"xyz".to_vec());
            assert!(entries.next_entry().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_position() {
        let data = archive(&[(b"a", &[1; 600])]);
        let mut entries = entries(chunked(&data, 300));
        block_on(async {
            let mut entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entries.position(), 512 + 1024);
            entry.skip().await.unwrap();
            assert!(entries.next_entry().await.unwrap().is_none());
            assert_eq!(entries.position(), 512 + 1024 + 512);
        });
    }

    #[test]
    fn test_empty_source() {
        let mut entries = entries(chunked(&[], 1));
        assert!(block_on(entries.next_entry()).unwrap().is_none());
    }

    #[test]
    fn test_abandoned_entry() {
        let data = archive(&[(b"a", &[1; 10]), (b"b", &[2; 10])]);
        let mut entries = entries(chunked(&data, 512));
        block_on(async {
            let entry = entries.next_entry().await.unwrap().unwrap();
            drop(entry);
            assert!(matches!(
                entries.next_entry().await,
                Err(StreamError::EntryAbandoned)
            ));
            assert!(entries.next_entry().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_cancelled_next_entry_can_be_repeated() {
        let data = archive(&[(b"a", &[1; 10]), (b"b", b"")]);
        let mut entries = entries(chunked(&data, 512));
        block_on(async {
            let mut entry = entries.next_entry().await.unwrap().unwrap();
            // the entry still owns the source
            assert!(entries.next_entry().now_or_never().is_none());
            entry.skip().await.unwrap();
            let entry = entries.next_entry().await.unwrap().unwrap();
            assert_eq!(entry.name(), "b");
            assert!(entries.next_entry().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_non_octal_checksum_field() {
        let mut data = archive(&[(b"a", b"1"), (b"b", b"2")]);
        data[1024 + 148..1024 + 156].copy_from_slice(b"zzzzzz\0 ");

        let mut entries = entries(chunked(&data, 512));
        block_on(async {
            entries.next_entry().await.unwrap().unwrap().skip().await.unwrap();
            assert!(entries.next_entry().await.unwrap().is_none());
        });

        let mut entries = Entries::with_options(chunked(&data, 100), Options::strict());
        block_on(async {
            entries.next_entry().await.unwrap().unwrap().skip().await.unwrap();
            assert!(matches!(
                entries.next_entry().await,
                Err(StreamError::InvalidHeader {
                    pos: 1024,
                    source: HeaderError::InvalidOctal {
                        field: "checksum",
                        ..
                    },
                })
            ));
        });
    }

    #[test]
    fn test_checksum_mismatch_policies() {
        let mut data = archive(&[(b"a", b"1"), (b"b", b"2")]);
        // corrupt the name of the second header
        data[1024] = b'c';

        let mut entries = entries(chunked(&data, 512));
        block_on(async {
            entries.next_entry().await.unwrap().unwrap().skip().await.unwrap();
            assert!(entries.next_entry().await.unwrap().is_none());
        });

        let mut entries = Entries::with_options(chunked(&data, 512), Options::strict());
        block_on(async {
            entries.next_entry().await.unwrap().unwrap().skip().await.unwrap();
            assert!(matches!(
                entries.next_entry().await,
                Err(StreamError::InvalidHeader { pos: 1024, .. })
            ));
        });
    }

    #[test]
    fn test_zero_block_is_end_even_when_strict() {
        let data = archive(&[(b"a", b"1")]);
        let mut entries = Entries::with_options(chunked(&data, 7), Options::strict());
        block_on(async {
            entries.next_entry().await.unwrap().unwrap().skip().await.unwrap();
            assert!(entries.next_entry().await.unwrap().is_none());
        });
    }

    #[test]
    fn test_incomplete_header() {
        let data = header_bytes(b"a", 0);
        let mut entries = entries(chunked(&data[..300], 64));
        assert!(block_on(entries.next_entry()).unwrap().is_none());

        let mut entries = Entries::with_options(chunked(&data[..300], 64), Options::strict());
        assert!(matches!(
            block_on(entries.next_entry()),
            Err(StreamError::UnexpectedEof { pos: 300 })
        ));
    }

    #[test]
    fn test_malformed_size_after_valid_checksum() {
        let mut data = header_bytes(b"a", 0);
        data[124..136].copy_from_slice(b"0000000008x\0");
        let mut block = HeaderBlock::new(data);
        let checksum = format!("{:06o}\0 ", block.compute_checksum());
        data[148..156].copy_from_slice(checksum.as_bytes());
        block = HeaderBlock::new(data);
        assert_eq!(block.verify_checksum(), Ok(()));

        let mut entries = entries(chunked(&data, 512));
        assert!(matches!(
            block_on(entries.next_entry()),
            Err(StreamError::InvalidHeader { pos: 0, .. })
        ));
    }

    #[test]
    fn test_source_error() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(&[0; 100])),
            Err(std::io::Error::other("connection reset")),
        ]);
        let mut entries = entries(source);
        assert!(matches!(
            block_on(entries.next_entry()),
            Err(StreamError::Io(_))
        ));
        assert!(block_on(entries.next_entry()).unwrap().is_none());
    }

    #[test]
    fn test_into_stream() {
        use futures::TryStreamExt;

        let data = archive(&[(b"x", b"1"), (b"y", b""), (b"z", b"333")]);
        let names = block_on(
            entries(chunked(&data, 1000))
                .into_stream()
                .and_then(|mut entry| async move {
                    entry.skip().await?;
                    Ok(entry.name().to_string())
                })
                .try_collect::<Vec<_>>(),
        )
        .unwrap();
        assert_eq!(names, ["x", "y", "z"]);
    }
}
