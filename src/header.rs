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
//! TAR header definition taken from <https://www.gnu.org/software/tar/manual/html_node/Standard.html>.
//! A Tar-archive is a collection of 512-byte sized blocks. Unfortunately there are several
//! TAR-like archive specifications. An Overview can be found here:
//! <https://www.gnu.org/software/tar/manual/html_node/Formats.html#Formats>
//!
//! Only the fields shared by all of them are decoded here. Each field is read
//! from its fixed offset on access, so a [`HeaderBlock`] is nothing more than
//! the 512 bytes it was built from.

#![allow(non_upper_case_globals)]

use crate::error::HeaderError;
use crate::tar_format_types::{TarFormatOctal, TarFormatString};
use crate::BLOCKSIZE;
use std::fmt::{Debug, Formatter};
use thiserror::Error;

/// Length of the name and link name fields.
pub const NAME_LEN: usize = 100;

const NAME_OFFSET: usize = 0;
const MODE_OFFSET: usize = 100;
const UID_OFFSET: usize = 108;
const GID_OFFSET: usize = 116;
const SIZE_OFFSET: usize = 124;
const MTIME_OFFSET: usize = 136;
const CHECKSUM_OFFSET: usize = 148;
const CHECKSUM_LEN: usize = 8;
const TYPEFLAG_OFFSET: usize = 156;
const LINKNAME_OFFSET: usize = 157;
const MAGIC_OFFSET: usize = 257;

/// Wrapper around the UNIX file permissions given in octal ASCII.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Mode(TarFormatOctal<8>);

impl Mode {
    /// Parses the [`ModeFlags`] from the mode string.
    pub fn to_flags(self) -> Result<ModeFlags, HeaderError> {
        let bits = self.0.as_number::<u64>().map_err(|e| HeaderError::InvalidOctal {
            field: "mode",
            bytes: e.into_bytes(),
        })?;
        ModeFlags::from_bits(bits).ok_or(HeaderError::IllegalMode(bits))
    }
}

impl Debug for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.to_flags(), f)
    }
}

/// One 512-byte header block as it appeared in the stream.
///
/// Construction never fails and never validates; call
/// [`HeaderBlock::verify_checksum`] before trusting any field.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    bytes: [u8; BLOCKSIZE],
}

impl HeaderBlock {
    /// Wraps the raw block.
    #[must_use]
    pub const fn new(bytes: [u8; BLOCKSIZE]) -> Self {
        Self { bytes }
    }

    /// The raw block.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BLOCKSIZE] {
        &self.bytes
    }

    fn field<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
    }

    fn octal<const N: usize>(
        &self,
        offset: usize,
        field: &'static str,
    ) -> Result<u64, HeaderError> {
        TarFormatOctal::new(self.field::<N>(offset))
            .as_number::<u64>()
            .map_err(|e| HeaderError::InvalidOctal {
                field,
                bytes: e.into_bytes(),
            })
    }

    /// The file name, truncated at the first NULL byte. A name may use all
    /// 100 bytes without a terminator. Invalid UTF-8 is replaced lossily.
    #[must_use]
    pub fn name(&self) -> String {
        self.name_field().to_string_lossy().into_owned()
    }

    /// The raw name field.
    #[must_use]
    pub fn name_field(&self) -> TarFormatString<NAME_LEN> {
        TarFormatString::new(self.field(NAME_OFFSET))
    }

    /// Size of the file data in bytes, excluding padding.
    pub fn file_size(&self) -> Result<u64, HeaderError> {
        self.octal::<12>(SIZE_OFFSET, "size")
    }

    /// The checksum the archiver stored in the header.
    pub fn checksum(&self) -> Result<u64, HeaderError> {
        self.octal::<CHECKSUM_LEN>(CHECKSUM_OFFSET, "checksum")
    }

    /// File permissions.
    #[must_use]
    pub fn mode(&self) -> Mode {
        Mode(TarFormatOctal::new(self.field(MODE_OFFSET)))
    }

    /// Numeric owner id.
    pub fn uid(&self) -> Result<u64, HeaderError> {
        self.octal::<8>(UID_OFFSET, "uid")
    }

    /// Numeric group id.
    pub fn gid(&self) -> Result<u64, HeaderError> {
        self.octal::<8>(GID_OFFSET, "gid")
    }

    /// Modification time in seconds since the UNIX epoch.
    pub fn mtime(&self) -> Result<u64, HeaderError> {
        self.octal::<12>(MTIME_OFFSET, "mtime")
    }

    /// Kind of the entry, see [`TypeFlag`].
    #[must_use]
    pub const fn type_flag(&self) -> TypeFlagRaw {
        TypeFlagRaw(self.bytes[TYPEFLAG_OFFSET])
    }

    /// Target of a hard or symbolic link.
    #[must_use]
    pub fn link_name(&self) -> String {
        TarFormatString::<NAME_LEN>::new(self.field(LINKNAME_OFFSET))
            .to_string_lossy()
            .into_owned()
    }

    /// `"ustar"` for POSIX and GNU archives, empty for v7 archives.
    #[must_use]
    pub fn magic(&self) -> TarFormatString<6> {
        TarFormatString::new(self.field(MAGIC_OFFSET))
    }

    /// Sum of all bytes of the block with the checksum field counted as eight
    /// ASCII spaces, because the field can't include its own value.
    #[must_use]
    pub fn compute_checksum(&self) -> u64 {
        let checksum_field = CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN;
        let initial = (CHECKSUM_LEN as u64) * u64::from(b' ');
        self.bytes
            .iter()
            .enumerate()
            .filter(|(i, _)| !checksum_field.contains(i))
            .fold(initial, |sum, (_, &byte)| sum + u64::from(byte))
    }

    /// Compares the stored against the computed checksum. A stored checksum
    /// that isn't valid octal never matches.
    pub fn verify_checksum(&self) -> Result<(), HeaderError> {
        let computed = self.compute_checksum();
        let stored = self.checksum()?;
        if stored == computed {
            Ok(())
        } else {
            Err(HeaderError::ChecksumMismatch { stored, computed })
        }
    }

    /// A Tar archive is terminated, if an end-of-archive entry, which consists
    /// of two 512 blocks of zero bytes, is found.
    #[must_use]
    pub fn is_zero_block(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl Debug for HeaderBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderBlock")
            .field("name", &self.name())
            .field("size", &self.file_size())
            .field("checksum", &self.checksum())
            .field("typeflag", &self.type_flag())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

/// The type flag byte of a header is none of the known [`TypeFlag`]s.
#[derive(Copy, Clone, Debug, Error, PartialOrd, PartialEq, Eq)]
#[error("{0:x} is not a valid TypeFlag")]
pub struct InvalidTypeFlagError(u8);

/// The undecoded type flag byte of a [`HeaderBlock`].
#[derive(Copy, Clone, PartialOrd, PartialEq, Eq)]
pub struct TypeFlagRaw(u8);

impl TypeFlagRaw {
    /// Tries to parse the underlying value as [`TypeFlag`]. This fails if the
    /// Tar file is corrupt and the type is invalid.
    pub fn try_to_type_flag(self) -> Result<TypeFlag, InvalidTypeFlagError> {
        TypeFlag::try_from(self)
    }
}

impl Debug for TypeFlagRaw {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.try_to_type_flag(), f)
    }
}

/// Describes the kind of payload, that follows after a [`HeaderBlock`].
///
/// Entries are yielded regardless of their type; the payload of every type is
/// skipped or read the same way, based on the size field alone.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
#[allow(unused)]
pub enum TypeFlag {
    /// Regular file.
    REGTYPE = b'0',
    /// Regular file, as written by old versions of tar.
    AREGTYPE = b'\0',
    /// Hard link to a previously archived file, named in the link name field.
    LINK = b'1',
    /// Symbolic link, the target is in the link name field.
    SYMTYPE = b'2',
    /// Character special file.
    CHRTYPE = b'3',
    /// Block special file.
    BLKTYPE = b'4',
    /// Directory. The name should end with a slash.
    DIRTYPE = b'5',
    /// FIFO special file. Only its existence is archived.
    FIFOTYPE = b'6',
    /// Contiguous file, treated like a regular file.
    CONTTYPE = b'7',
    /// Extended header referring to the next file in the archive
    XHDTYPE = b'x',
    /// Global extended header
    XGLTYPE = b'g',
}

impl TypeFlag {
    /// Whether we have a regular file.
    pub fn is_regular_file(self) -> bool {
        // Equivalent. See POSIX 1003.1-1990.
        self == Self::AREGTYPE || self == Self::REGTYPE
    }
}

impl TryFrom<TypeFlagRaw> for TypeFlag {
    type Error = InvalidTypeFlagError;

    fn try_from(value: TypeFlagRaw) -> Result<Self, Self::Error> {
        match value.0 {
            b'0' => Ok(Self::REGTYPE),
            b'\0' => Ok(Self::AREGTYPE),
            b'1' => Ok(Self::LINK),
            b'2' => Ok(Self::SYMTYPE),
            b'3' => Ok(Self::CHRTYPE),
            b'4' => Ok(Self::BLKTYPE),
            b'5' => Ok(Self::DIRTYPE),
            b'6' => Ok(Self::FIFOTYPE),
            b'7' => Ok(Self::CONTTYPE),
            b'x' => Ok(Self::XHDTYPE),
            b'g' => Ok(Self::XGLTYPE),
            e => Err(InvalidTypeFlagError(e)),
        }
    }
}

bitflags::bitflags! {
    /// UNIX file permissions in octal format.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModeFlags: u64 {
        /// Set UID on execution.
        const SetUID = 0o4000;
        /// Set GID on execution.
        const SetGID = 0o2000;
        /// Reserved.
        const TSVTX = 0o1000;
        /// Owner read.
        const OwnerRead = 0o400;
        /// Owner write.
        const OwnerWrite = 0o200;
        /// Owner execute.
        const OwnerExec = 0o100;
        /// Group read.
        const GroupRead = 0o040;
        /// Group write.
        const GroupWrite = 0o020;
        /// Group execute.
        const GroupExec = 0o010;
        /// Others read.
        const OthersRead = 0o004;
        /// Others write.
        const OthersWrite = 0o002;
        /// Others execute.
        const OthersExec = 0o001;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a header block the way GNU tar lays it out, with a valid
    /// checksum.
    pub(crate) fn header_bytes(name: &[u8], size: u64) -> [u8; BLOCKSIZE] {
        let mut bytes = [0u8; BLOCKSIZE];
        bytes[..name.len()].copy_from_slice(name);
        bytes[MODE_OFFSET..MODE_OFFSET + 8].copy_from_slice(b"0000644\0");
        bytes[UID_OFFSET..UID_OFFSET + 8].copy_from_slice(b"0001750\0");
        bytes[GID_OFFSET..GID_OFFSET + 8].copy_from_slice(b"0001750\0");
        let size = format!("{size:011o}\0");
        bytes[SIZE_OFFSET..SIZE_OFFSET + 12].copy_from_slice(size.as_bytes());
        bytes[MTIME_OFFSET..MTIME_OFFSET + 12].copy_from_slice(b"14340142576\0");
        bytes[TYPEFLAG_OFFSET] = b'0';
        bytes[MAGIC_OFFSET..MAGIC_OFFSET + 8].copy_from_slice(b"ustar  \0");
        let checksum = HeaderBlock::new(bytes).compute_checksum();
        let checksum = format!("{checksum:06o}\0 ");
        bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(checksum.as_bytes());
        bytes
    }

    #[test]
    fn test_display_header() {
        let header = HeaderBlock::new(header_bytes(b"bye_world_513b.txt", 513));
        assert_eq!(header.name(), "bye_world_513b.txt");
        println!("{:#?}'", header);
    }

    #[test]
    fn test_fields() {
        let header = HeaderBlock::new(header_bytes(b"hello_world.txt", 12));
        assert_eq!(header.file_size(), Ok(12));
        assert_eq!(header.uid(), Ok(1000));
        assert_eq!(header.gid(), Ok(1000));
        assert_eq!(header.mtime(), Ok(0o14340142576));
        assert_eq!(header.type_flag().try_to_type_flag(), Ok(TypeFlag::REGTYPE));
        assert!(TypeFlag::REGTYPE.is_regular_file());
        assert_eq!(header.link_name(), "");
        assert_eq!(header.magic().as_str(), Ok("ustar "));
        assert_eq!(
            header.mode().to_flags(),
            Ok(ModeFlags::OwnerRead
                | ModeFlags::OwnerWrite
                | ModeFlags::GroupRead
                | ModeFlags::OthersRead)
        );
    }

    #[test]
    fn test_checksum_roundtrip() {
        let header = HeaderBlock::new(header_bytes(b"file0", 512));
        assert_eq!(header.checksum(), Ok(header.compute_checksum()));
        assert_eq!(header.verify_checksum(), Ok(()));
    }

    #[test]
    fn test_checksum_ignores_own_field() {
        let mut bytes = header_bytes(b"file0", 512);
        let before = HeaderBlock::new(bytes).compute_checksum();
        bytes[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 8].copy_from_slice(b"7777777\0");
        assert_eq!(HeaderBlock::new(bytes).compute_checksum(), before);
    }

    #[test]
    fn test_checksum_mismatch() {
        let mut bytes = header_bytes(b"file0", 512);
        bytes[0] = b'g';
        let header = HeaderBlock::new(bytes);
        assert!(matches!(
            header.verify_checksum(),
            Err(HeaderError::ChecksumMismatch { stored, computed }) if computed == stored + 1
        ));
    }

    #[test]
    fn test_zero_block() {
        let header = HeaderBlock::new([0; BLOCKSIZE]);
        assert!(header.is_zero_block());
        assert_eq!(header.compute_checksum(), 256);
        assert!(matches!(
            header.verify_checksum(),
            Err(HeaderError::InvalidOctal { field: "checksum", .. })
        ));
        assert!(!HeaderBlock::new(header_bytes(b"a", 0)).is_zero_block());
    }

    #[test]
    fn test_name_uses_all_100_bytes() {
        let name = [b'n'; NAME_LEN];
        let header = HeaderBlock::new(header_bytes(&name, 1));
        assert_eq!(header.name().len(), NAME_LEN);
        assert_eq!(header.file_size(), Ok(1));
    }

    #[test]
    fn test_invalid_type_flag() {
        let mut bytes = header_bytes(b"file0", 0);
        bytes[TYPEFLAG_OFFSET] = b'Z';
        let err = HeaderBlock::new(bytes).type_flag().try_to_type_flag().unwrap_err();
        assert_eq!(err.to_string(), "5a is not a valid TypeFlag");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_name_stops_at_first_nul() {
        let header = HeaderBlock::new(header_bytes(b"abc\0def", 1));
        assert_eq!(header.name(), "abc");
        let header = HeaderBlock::new(header_bytes(b"", 1));
        assert_eq!(header.name(), "");
    }

    #[test]
    fn test_malformed_size() {
        let mut bytes = header_bytes(b"file0", 0);
        bytes[SIZE_OFFSET..SIZE_OFFSET + 12].copy_from_slice(b"0000000009z\0");
        let header = HeaderBlock::new(bytes);
        assert!(matches!(
            header.file_size(),
            Err(HeaderError::InvalidOctal { field: "size", .. })
        ));
    }
}
