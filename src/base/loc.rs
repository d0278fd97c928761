//! Source identifiers and diagnostic locations.

use serde::{Deserialize, Serialize};
use std::fmt;
use text_size::TextSize;

/// An interned identifier for a source file.
///
/// `SourceId` is a lightweight handle (just a u32) that uniquely identifies
/// a source within a [`crate::base::SourceSet`]. The actual path is stored
/// there.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SourceId(pub u32);

impl SourceId {
    /// Create a new SourceId from a raw index.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw index.
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source#{}", self.0)
    }
}

impl From<u32> for SourceId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A diagnostic location: which source, and the byte offset within it.
///
/// The offset is opaque to this crate; the front end that produced the tree
/// owns the mapping back to line/column.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub struct Loc {
    pub source: Option<SourceId>,
    pub offset: TextSize,
}

impl Loc {
    pub fn new(source: SourceId, offset: TextSize) -> Self {
        Self {
            source: Some(source),
            offset,
        }
    }

    /// A location with a known offset but no source, for synthesized trees.
    pub fn detached(offset: TextSize) -> Self {
        Self {
            source: None,
            offset,
        }
    }
}

impl fmt::Debug for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loc({self})")
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "{}@{}", source, u32::from(self.offset)),
            None => write!(f, "<detached>@{}", u32::from(self.offset)),
        }
    }
}
