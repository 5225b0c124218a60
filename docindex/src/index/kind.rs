use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::common::{DICTIONARY, FULL_TEXT, HASH_INDEX_SUFFIX, NOT_UNIQUE, PROXY, UNIQUE};
use crate::errors::{ErrorKind, IndexError, IndexResult};

/// Key uniqueness policy of an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Uniqueness {
    /// A key maps to at most one record; duplicates are rejected.
    Unique,
    /// A key may map to many records.
    NotUnique,
    /// Words of a single string field; many records per word.
    FullText,
    /// A key maps to at most one record; a new put replaces the old one.
    Dictionary,
}

/// Storage engine family backing an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StorageFamily {
    /// Ordered skip list: point lookups and range scans.
    Sorted,
    /// Hash table: point lookups only.
    Hash,
}

/// How the planner may match predicates against an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatchStyle {
    /// Equality prefix plus an optional terminal range.
    Ordered,
    /// Every field equality-bound, nothing else.
    Exact,
    /// Not considered by the planner.
    Text,
}

/// Capabilities an index kind resolves to at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexCapabilities {
    pub supports_range: bool,
    pub supports_duplicates: bool,
    pub replaces_on_put: bool,
    pub match_style: MatchStyle,
}

/// Index kind: uniqueness × storage family.
///
/// Parsed from the textual names `UNIQUE`, `NOTUNIQUE`, `FULLTEXT`,
/// `DICTIONARY` and their `_HASH_INDEX` variants. `PROXY` is recognised
/// only to be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexKind {
    uniqueness: Uniqueness,
    family: StorageFamily,
}

impl IndexKind {
    pub const UNIQUE: IndexKind = IndexKind::new(Uniqueness::Unique, StorageFamily::Sorted);
    pub const NOT_UNIQUE: IndexKind = IndexKind::new(Uniqueness::NotUnique, StorageFamily::Sorted);
    pub const FULL_TEXT: IndexKind = IndexKind::new(Uniqueness::FullText, StorageFamily::Sorted);
    pub const DICTIONARY: IndexKind = IndexKind::new(Uniqueness::Dictionary, StorageFamily::Sorted);
    pub const UNIQUE_HASH: IndexKind = IndexKind::new(Uniqueness::Unique, StorageFamily::Hash);
    pub const NOT_UNIQUE_HASH: IndexKind = IndexKind::new(Uniqueness::NotUnique, StorageFamily::Hash);
    pub const FULL_TEXT_HASH: IndexKind = IndexKind::new(Uniqueness::FullText, StorageFamily::Hash);
    pub const DICTIONARY_HASH: IndexKind = IndexKind::new(Uniqueness::Dictionary, StorageFamily::Hash);

    pub const fn new(uniqueness: Uniqueness, family: StorageFamily) -> Self {
        IndexKind { uniqueness, family }
    }

    /// Parses a textual index type, case-insensitively.
    pub fn parse(name: &str) -> IndexResult<IndexKind> {
        let upper = name.trim().to_uppercase();
        if upper == PROXY {
            log::error!("Index type PROXY cannot be created");
            return Err(IndexError::new(
                "Index type PROXY is not supported and cannot be created",
                ErrorKind::InvalidIndexType,
            ));
        }

        let (base, family) = match upper.strip_suffix(HASH_INDEX_SUFFIX) {
            Some(base) => (base, StorageFamily::Hash),
            None => (upper.as_str(), StorageFamily::Sorted),
        };

        let uniqueness = match base {
            UNIQUE => Uniqueness::Unique,
            NOT_UNIQUE => Uniqueness::NotUnique,
            FULL_TEXT => Uniqueness::FullText,
            DICTIONARY => Uniqueness::Dictionary,
            _ => {
                log::error!("Unknown index type {}", name);
                return Err(IndexError::new(
                    &format!("Index type '{}' is not supported", name),
                    ErrorKind::InvalidIndexType,
                ));
            }
        };
        Ok(IndexKind::new(uniqueness, family))
    }

    pub fn uniqueness(&self) -> Uniqueness {
        self.uniqueness
    }

    pub fn family(&self) -> StorageFamily {
        self.family
    }

    pub fn is_unique(&self) -> bool {
        self.uniqueness == Uniqueness::Unique
    }

    pub fn is_hash(&self) -> bool {
        self.family == StorageFamily::Hash
    }

    pub fn is_full_text(&self) -> bool {
        self.uniqueness == Uniqueness::FullText
    }

    pub fn capabilities(&self) -> IndexCapabilities {
        let supports_duplicates = matches!(
            self.uniqueness,
            Uniqueness::NotUnique | Uniqueness::FullText
        );
        let match_style = match (self.uniqueness, self.family) {
            (Uniqueness::FullText, _) => MatchStyle::Text,
            (_, StorageFamily::Hash) => MatchStyle::Exact,
            (_, StorageFamily::Sorted) => MatchStyle::Ordered,
        };
        IndexCapabilities {
            supports_range: self.family == StorageFamily::Sorted,
            supports_duplicates,
            replaces_on_put: self.uniqueness == Uniqueness::Dictionary,
            match_style,
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let base = match self.uniqueness {
            Uniqueness::Unique => UNIQUE,
            Uniqueness::NotUnique => NOT_UNIQUE,
            Uniqueness::FullText => FULL_TEXT,
            Uniqueness::Dictionary => DICTIONARY,
        };
        match self.family {
            StorageFamily::Sorted => write!(f, "{}", base),
            StorageFamily::Hash => write!(f, "{}{}", base, HASH_INDEX_SUFFIX),
        }
    }
}

impl FromStr for IndexKind {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndexKind::parse(s)
    }
}
