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
//! Single-use handoff of one value from an entry back to the decoder.
//!
//! The sending half is consumed by delivering, so a value is delivered at most
//! once. Waiting only borrows the receiving half: a wait that is cancelled
//! before the value arrives can be resumed later without losing it.

use futures::channel::oneshot;

/// Creates a connected pair of handoff halves.
pub(crate) fn handoff<T>() -> (Deliver<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (Deliver(tx), Pending(rx))
}

/// Sending half. Dropping it without delivering abandons the handoff.
#[derive(Debug)]
pub(crate) struct Deliver<T>(oneshot::Sender<T>);

impl<T> Deliver<T> {
    /// Hands `value` over without blocking. If the waiting side is gone the
    /// value is dropped.
    pub(crate) fn deliver(self, value: T) {
        if self.0.send(value).is_err() {
            log::trace!("handoff receiver is gone, dropping value");
        }
    }
}

/// The sender was dropped without delivering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Abandoned;

/// Receiving half.
#[derive(Debug)]
pub(crate) struct Pending<T>(oneshot::Receiver<T>);

impl<T> Pending<T> {
    /// Suspends until the value is delivered. Must not be called again once
    /// it has resolved.
    pub(crate) async fn wait(&mut self) -> Result<T, Abandoned> {
        (&mut self.0).await.map_err(|_| Abandoned)
    }
}
