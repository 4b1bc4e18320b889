/*
MIT License

Copyright (c) 2023 Philipp Schuster

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
//! Fixed-width field types of a Tar header block.

use std::borrow::Cow;
use std::fmt::{Debug, Formatter};
use std::str::{from_utf8, Utf8Error};

/// Base type for strings embedded in a Tar header. The length depends on the
/// context. The returned string is likely to be UTF-8/ASCII, which is verified
/// by getters, such as [`TarFormatString::as_str`].
///
/// An optionally null terminated string. The contents are either:
/// 1. A fully populated string with no null termination or
/// 2. A partially populated string where the unused bytes are zero.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct TarFormatString<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> TarFormatString<N> {
    /// Constructor.
    ///
    /// # Panics
    /// Panics of `N` is zero, i.e., the underlying array has no length.
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        assert!(N > 0, "array should have at least one element");
        Self { bytes }
    }

    /// True if the is string empty (ignoring NULL bytes).
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes[0] == 0
    }

    /// Returns the length of the payload in bytes. This is either the full
    /// capacity `N` or the data until the first NULL byte.
    #[must_use]
    pub fn size(&self) -> usize {
        memchr::memchr(0, &self.bytes).unwrap_or(N)
    }

    /// The payload bytes, i.e. everything before the first NULL byte.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[0..self.size()]
    }

    /// Returns a str ref without terminating or intermediate NULL bytes. The
    /// string is truncated at the first NULL byte, in case not the full length
    /// was used.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] error for invalid strings.
    pub fn as_str(&self) -> Result<&str, Utf8Error> {
        from_utf8(self.as_bytes())
    }

    /// Like [`Self::as_str`] but replaces invalid UTF-8 sequences with
    /// `U+FFFD` instead of failing.
    #[must_use]
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// Wrapper around [`Self::as_str`] that skips leading spaces and stops as
    /// soon as the next space is found. This is necessary to properly parse
    /// certain Tar-style encoded numbers. Some ustar implementations pad
    /// spaces which prevents the proper parsing as number.
    ///
    /// # Errors
    /// Returns a [`Utf8Error`] error for invalid strings.
    pub fn as_str_until_first_space(&self) -> Result<&str, Utf8Error> {
        self.as_str().map(|str| {
            let str = str.trim_start_matches(' ');
            let end_index_exclusive = str.find(' ').unwrap_or(str.len());
            &str[0..end_index_exclusive]
        })
    }
}

impl<const N: usize> Debug for TarFormatString<N> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "str='{:?}',byte_usage={}/{}",
            self.as_str(),
            self.size(),
            N
        )
    }
}

/// An octal number stored as ASCII digits. Leading and trailing spaces as
/// well as the NULL terminator are ignored.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct TarFormatOctal<const N: usize>(TarFormatString<N>);

impl<const N: usize> TarFormatOctal<N> {
    #[must_use]
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(TarFormatString::new(bytes))
    }

    /// Interprets the underlying value as an octal number of the specified
    /// type.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is empty, contains non-octal characters,
    /// or the value doesn't fit into `T`.
    pub fn as_number<T>(&self) -> Result<T, OctalError<N>>
    where
        T: num_traits::Num,
    {
        let str = self
            .0
            .as_str_until_first_space()
            .map_err(|_| OctalError(self.0))?;
        T::from_str_radix(str, 8).map_err(|_| OctalError(self.0))
    }
}

impl<const N: usize> Debug for TarFormatOctal<N> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.as_number::<u64>() {
            Ok(val) => write!(f, "{} [{:?}]", val, self.0.to_string_lossy()),
            Err(_) => write!(f, "<invalid octal> [{:?}]", self.0.to_string_lossy()),
        }
    }
}

/// The raw content of an octal field that could not be parsed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OctalError<const N: usize>(TarFormatString<N>);

impl<const N: usize> OctalError<N> {
    /// The offending field, including padding.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0.bytes.to_vec()
    }
}
