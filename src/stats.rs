//! Defines entry metadata records returned by head and accepted by patch.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata of a single entry.
///
/// `size` doubles as the kind discriminator: a present size means a file of
/// that byte length, an absent size means a directory. All times are
/// milliseconds since the Unix epoch. A present `deleted` time is a
/// logical-delete tombstone; repositories configured for logical delete
/// report such entries as not found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Byte length for files; absent for directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Last access time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accessed: Option<i64>,
    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    /// Last modification time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    /// Logical-delete time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<i64>,
}

impl Stats {
    /// Stats of a file with the given byte length.
    pub fn file(size: u64) -> Self {
        Self { size: Some(size), ..Self::default() }
    }

    /// Stats of a directory.
    pub fn directory() -> Self {
        Self::default()
    }

    /// True when the entry is a directory.
    pub fn is_directory(&self) -> bool {
        self.size.is_none()
    }

    /// True when the entry is a file.
    pub fn is_file(&self) -> bool {
        self.size.is_some()
    }
}

/// Superset of [`Stats`] carrying backend-specific attributes; the payload
/// of patch operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Props {
    /// Core metadata fields.
    #[serde(flatten)]
    pub stats: Stats,
    /// Backend-specific attributes, passed through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Props {
    /// Overlays these props onto the entry's current stats. Fields present
    /// in the props win; absent fields keep their current value.
    pub fn merged_over(&self, current: &Stats) -> Props {
        Props {
            stats: Stats {
                size: self.stats.size.or(current.size),
                accessed: self.stats.accessed.or(current.accessed),
                created: self.stats.created.or(current.created),
                modified: self.stats.modified.or(current.modified),
                deleted: self.stats.deleted.or(current.deleted),
            },
            extra: self.extra.clone(),
        }
    }
}
