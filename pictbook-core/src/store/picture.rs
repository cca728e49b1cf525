use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::util::{is_movie_extension, path_extension};

/// Metadata for one picture or movie in a book. Plain data, no logic
/// beyond its ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureInfo {
    path: PathBuf,
    description: String,
    date: DateTime<Utc>,
    /// Explicit position in the book; pictures without one sort after
    /// every explicitly ordered picture.
    order: Option<u32>,
    hidden: bool,
}

impl PictureInfo {
    pub fn new(
        path: PathBuf,
        description: String,
        date: DateTime<Utc>,
        order: Option<u32>,
        hidden: bool,
    ) -> Self {
        Self {
            path,
            description,
            date,
            order,
            hidden,
        }
    }

    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn order(&self) -> Option<u32> {
        self.order
    }

    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn is_movie(&self) -> bool {
        is_movie_extension(path_extension(&self.path))
    }

    /// Size of the backing file, 0 when it has disappeared.
    pub fn file_size(&self) -> u64 {
        std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }
}

impl Ord for PictureInfo {
    /// Explicit order first, then date, then name.
    fn cmp(&self, other: &Self) -> Ordering {
        let own = (self.order.unwrap_or(u32::MAX), self.date, self.name());
        let theirs = (other.order.unwrap_or(u32::MAX), other.date, other.name());
        own.cmp(&theirs)
    }
}

impl PartialOrd for PictureInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
