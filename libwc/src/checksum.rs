use crate::error::WcResult;
use sha1::{Digest, Sha1};
use std::fmt::{self, Debug, Display, Formatter};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

pub const CHECKSUM_SIZE: usize = 20;

/// content address of an immutable pristine byte stream
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Checksum([u8; CHECKSUM_SIZE]);

impl Checksum {
    /// checksum of the empty stream
    // da39a3ee5e6b4b0d3255bfef95601890afd80709
    pub const EMPTY: Self = Self([
        0xda, 0x39, 0xa3, 0xee, 0x5e, 0x6b, 0x4b, 0x0d, 0x32, 0x55, 0xbf, 0xef, 0x95, 0x60, 0x18,
        0x90, 0xaf, 0xd8, 0x07, 0x09,
    ]);

    #[inline]
    pub const fn new(bytes: [u8; CHECKSUM_SIZE]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_SIZE] {
        &self.0
    }

    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut out = [0u8; CHECKSUM_SIZE];
        out.copy_from_slice(&Sha1::digest(bytes));
        Self(out)
    }

    /// hashes the file contents; used to tell a locally modified working file
    /// from one that still matches its pristine
    pub fn of_file(path: impl AsRef<Path>) -> WcResult<Self> {
        let mut reader = BufReader::new(File::open(path.as_ref())?);
        let mut hasher = Sha1::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let mut out = [0u8; CHECKSUM_SIZE];
        out.copy_from_slice(&hasher.finalize());
        Ok(Self(out))
    }
}

impl FromStr for Checksum {
    type Err = crate::error::WcGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ensure!(s.len() == 2 * CHECKSUM_SIZE, "invalid checksum `{}`", s);
        let mut bytes = [0u8; CHECKSUM_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

// purely for convenience
#[cfg(test)]
impl<'a> From<&'a str> for Checksum {
    fn from(s: &'a str) -> Self {
        Self::from_str(s).unwrap()
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
