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
use std::fs::File;
use std::io::{self, Read};

use bytes::Bytes;
use futures::executor::block_on;
use untar_stream::{entries, StreamError};

const CHUNK_SIZE: usize = 8192;

/// Lists the entries of the Tar archive given as first argument, or read from
/// stdin. Usage: `cargo run --example list_entries -- archive.tar`
fn main() -> Result<(), StreamError> {
    // log: not mandatory
    env_logger::init();

    let mut reader: Box<dyn Read> = match std::env::args_os().nth(1) {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };

    // a blocking reader, handed out one chunk at a time
    let chunks = std::iter::from_fn(move || {
        let mut buf = vec![0; CHUNK_SIZE];
        match reader.read(&mut buf) {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some(Ok(Bytes::from(buf)))
            }
            Err(e) => Some(Err(e)),
        }
    });

    block_on(async {
        let mut entries = entries(futures::stream::iter(chunks));
        while let Some(mut entry) = entries.next_entry().await? {
            println!(
                "{:>10} {:?} {}",
                entry.file_size(),
                entry.header().type_flag(),
                entry.name()
            );
            entry.skip().await?;
        }
        println!("{} bytes of archive data", entries.position());
        Ok(())
    })
}
