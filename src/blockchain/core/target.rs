//! The 256-bit proof-of-work threshold.
//!
//! Headers store the target least-significant byte first, while digests are
//! compared most-significant byte first. The two orders get separate types and
//! [`Target::to_compare`] is the only way to go from one to the other.

use crate::codec::Sha256Hash;
use std::fmt;

/// Target as carried in a block header (little-endian byte order).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target([u8; 32]);

/// Target in digest comparison order (big-endian byte order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompareTarget([u8; 32]);

impl Target {
    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Target(bytes)
    }

    pub const fn as_le_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_compare(&self) -> CompareTarget {
        let mut be = self.0;
        be.reverse();
        CompareTarget(be)
    }
}

impl CompareTarget {
    /// Every digest satisfies this target.
    pub const MAX: CompareTarget = CompareTarget([0xff; 32]);

    pub const fn from_be_bytes(bytes: [u8; 32]) -> Self {
        CompareTarget(bytes)
    }

    pub const fn as_be_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Inverse of [`Target::to_compare`].
    pub fn to_stored(&self) -> Target {
        let mut le = self.0;
        le.reverse();
        Target(le)
    }

    /// `hash <= target`, both read most-significant byte first.
    pub fn is_met_by(&self, hash: &Sha256Hash) -> bool {
        hash <= &self.0
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target(le:{})", hex::encode(self.0))
    }
}

impl fmt::Debug for CompareTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompareTarget(be:{})", hex::encode(self.0))
    }
}

impl fmt::Display for CompareTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
