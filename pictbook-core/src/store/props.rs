//! Tiny `key=value` property files, the on-disk format the book data
//! files use. Lines starting with `#` are comments; keys and values are
//! UTF-8 and the first `=` separates them. Written sorted so diffs stay
//! readable.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PictError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.to_string());
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key) == Some("true")
    }

    /// Insert or replace; returns true when the stored value changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match self.entries.get(key) {
            Some(current) if current == value => false,
            _ => {
                self.entries.insert(key.to_string(), value.to_string());
                true
            }
        }
    }

    /// Remove; returns true when a value was actually present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write atomically with a leading comment line.
    pub fn store(&self, path: &Path, comment: &str) -> Result<()> {
        let parent = path.parent().ok_or_else(|| {
            PictError::Internal(format!("no parent dir for {}", path.display()))
        })?;
        let mut temp = NamedTempFile::new_in(parent)?;
        writeln!(temp, "# {comment}")?;
        for (key, value) in &self.entries {
            writeln!(temp, "{key}={value}")?;
        }
        temp.persist(path).map_err(|e| PictError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_comments_and_blanks() {
        let props = Properties::parse(
            "# a comment\n\ntitle=Summer 2002\nphoto.jpg.hide=true\nbroken line\n",
        );
        assert_eq!(props.get("title"), Some("Summer 2002"));
        assert!(props.get_bool("photo.jpg.hide"));
        assert!(!props.get_bool("absent"));
        assert_eq!(props.get("broken line"), None);
    }

    #[test]
    fn set_reports_changes() {
        let mut props = Properties::new();
        assert!(props.set("k", "v"));
        assert!(!props.set("k", "v"));
        assert!(props.set("k", "w"));
        assert!(props.remove("k"));
        assert!(!props.remove("k"));
    }

    #[test]
    fn store_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        let mut props = Properties::new();
        props.set("title", "Västkusten");
        props.set("a.jpg.order", "3");
        props.store(&path, "Data for PictBook").unwrap();

        let loaded = Properties::load(&path).unwrap();
        assert_eq!(loaded, props);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# Data for PictBook\n"));
    }
}
