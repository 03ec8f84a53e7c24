//! Domain types for the asset dependency graph.
//!
//! ## Identity
//!
//! An [`AssetId`] is a package path plus an asset name, written
//! `/Game/Props/Crate.Crate`. It is a plain value: equality, hashing and a
//! total order are all derived from the two strings, so iteration over ids is
//! deterministic everywhere in the engine.
//!
//! ## Edge Direction Convention
//!
//! A [`ReferenceEdge`] points from the **referencing** asset to the
//! **referenced** asset (`source` depends on `target`). "Dependencies" of an
//! asset follow edges forward; "dependents" follow them backwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Package path prefix of engine-native (code) packages.
pub const NATIVE_PACKAGE_PREFIX: &str = "/Script";

/// Stable identifier for one asset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId {
    /// Package path, e.g. `/Game/Props/Crate`
    pub package: String,
    /// Asset name inside the package, e.g. `Crate`
    pub name: String,
}

impl AssetId {
    /// Create an asset id from a package path and asset name.
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Returns `true` for assets living in an engine-native package.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.package.starts_with(NATIVE_PACKAGE_PREFIX)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

impl FromStr for AssetId {
    type Err = Error;

    /// Parse `/Package/Path.Name`.
    ///
    /// The `.Name` part may be omitted, in which case the last package path
    /// segment is used (`/Game/Props/Crate` is `/Game/Props/Crate.Crate`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.starts_with('/') {
            return Err(Error::InvalidRequest(format!(
                "asset id '{s}' must start with a package path ('/')"
            )));
        }

        let last_slash = s.rfind('/').unwrap_or(0);
        let (package, name) = match s[last_slash..].find('.') {
            Some(dot) => {
                let split = last_slash + dot;
                (&s[..split], &s[split + 1..])
            }
            None => (s, &s[last_slash + 1..]),
        };

        if package.len() <= 1 || name.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "asset id '{s}' needs a package path and an asset name"
            )));
        }

        Ok(Self::new(package, name))
    }
}

/// Kind of reference between two assets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Target is loaded whenever the source is loaded
    Hard,

    /// Target is resolved on demand and may be absent at load time
    Soft,

    /// Searchable-name reference, resolved by lookup rather than by path
    Searchable,

    /// Bookkeeping reference recorded by the asset manager
    Management,
}

impl ReferenceKind {
    /// Every kind, in canonical order.
    pub const ALL: [Self; 4] = [Self::Hard, Self::Soft, Self::Searchable, Self::Management];

    /// Lowercase name used in manifests and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hard => "hard",
            Self::Soft => "soft",
            Self::Searchable => "searchable",
            Self::Management => "management",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Hard => 1,
            Self::Soft => 1 << 1,
            Self::Searchable => 1 << 2,
            Self::Management => 1 << 3,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hard" => Ok(Self::Hard),
            "soft" => Ok(Self::Soft),
            "searchable" | "search" | "transient" => Ok(Self::Searchable),
            "management" | "manage" => Ok(Self::Management),
            other => Err(Error::InvalidRequest(format!(
                "unknown reference kind '{other}' (expected hard, soft, searchable or management)"
            ))),
        }
    }
}

/// A set of [`ReferenceKind`]s, used as a traversal filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceKinds(u8);

impl ReferenceKinds {
    /// No kinds at all.
    pub const NONE: Self = Self(0);

    /// Every kind.
    pub const ALL: Self = Self(0b1111);

    /// Only hard references.
    pub const HARD: Self = Self(1);

    /// Build a set from individual kinds.
    pub fn of(kinds: impl IntoIterator<Item = ReferenceKind>) -> Self {
        kinds
            .into_iter()
            .fold(Self::NONE, |set, kind| set.with(kind))
    }

    /// Add a kind to the set.
    #[must_use]
    pub fn with(self, kind: ReferenceKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Returns `true` if the kind is in the set.
    #[must_use]
    pub fn contains(self, kind: ReferenceKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns `true` if no kind is selected.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the selected kinds in canonical order.
    pub fn iter(self) -> impl Iterator<Item = ReferenceKind> {
        ReferenceKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

/// Hard and soft references, the kinds followed unless a rule says otherwise.
impl Default for ReferenceKinds {
    fn default() -> Self {
        Self::of([ReferenceKind::Hard, ReferenceKind::Soft])
    }
}

impl fmt::Display for ReferenceKinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(ReferenceKind::as_str).collect();
        write!(f, "{}", names.join(","))
    }
}

/// One asset known to the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetNode {
    /// Identity of the asset
    pub id: AssetId,

    /// Opaque asset type tag (`None` for placeholders never described)
    pub asset_type: Option<String>,

    /// Whether the asset is present on disk
    pub exists: bool,

    /// Last catalogue fetch failed; edges are the last known set
    pub stale: bool,

    /// Bumped on every mutation touching this node
    pub generation: u64,
}

impl AssetNode {
    /// A placeholder for an asset only known as a reference target.
    #[must_use]
    pub fn placeholder(id: AssetId) -> Self {
        Self {
            id,
            asset_type: None,
            exists: false,
            stale: false,
            generation: 0,
        }
    }

    /// Returns `true` if the node is a dangling reference target.
    ///
    /// A placeholder whose fetch failed is stale, not missing: whether it
    /// exists is unknown until a retry succeeds.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        !self.exists && !self.stale
    }
}

/// A directed reference between two assets.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ReferenceEdge {
    /// The referencing asset
    pub source: AssetId,
    /// The referenced asset
    pub target: AssetId,
    /// How the target is referenced
    pub kind: ReferenceKind,
}

impl ReferenceEdge {
    /// Create a new reference edge.
    #[must_use]
    pub fn new(source: AssetId, target: AssetId, kind: ReferenceKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

impl fmt::Display for ReferenceEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.target)
    }
}

/// Asset metadata as reported by the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescription {
    /// Opaque asset type tag
    pub asset_type: String,
    /// Whether the asset is present on disk
    pub exists: bool,
}
