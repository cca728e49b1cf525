use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::Result;
use crate::store::picture::PictureInfo;
use crate::store::props::Properties;
use crate::util::is_book_entry;

const DATA_FILE_NAME: &str = "data";
const STORE_COMMENT: &str = "Data for PictBook";

/// One directory of a picture book: the directory with the original
/// files and the data directory carrying its property file and cached
/// renditions.
#[derive(Debug)]
pub struct BookDir {
    pict_dir: PathBuf,
    data_dir: PathBuf,
    data: Properties,
    dirty: bool,
}

impl BookDir {
    pub fn open(pict_dir: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let data_file = data_dir.join(DATA_FILE_NAME);
        let data = if data_file.exists() {
            Properties::load(&data_file)?
        } else {
            Properties::new()
        };
        Ok(Self {
            pict_dir,
            data_dir,
            data,
            dirty: false,
        })
    }

    pub fn pict_dir(&self) -> &Path {
        &self.pict_dir
    }

    /// Where cached renditions for this directory belong.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The book title: explicit `title` property or the directory name.
    pub fn title(&self) -> String {
        self.data
            .get("title")
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.data_dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default()
                    .to_string()
            })
    }

    /// File names of the pictures and movies in this directory, in
    /// directory order.
    pub fn picture_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.pict_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && is_book_entry(name)
            {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Subdirectories that are not marked hidden.
    pub fn visible_subdirs(&self) -> Result<Vec<String>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.pict_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !self.data.get_bool(&hide_key(name))
            {
                dirs.push(name.to_string());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Info for one picture, whether or not the file exists. The date is
    /// the file's modification time (creation dates are not portable).
    pub fn picture_info(&self, name: &str) -> PictureInfo {
        let path = self.pict_dir.join(name);
        let date = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();
        let description = self
            .data
            .get(&description_key(name))
            .filter(|value| !value.is_empty())
            .unwrap_or(name)
            .to_string();
        let order = self
            .data
            .get(&order_key(name))
            .and_then(|value| value.parse().ok());
        let hidden = self.data.get_bool(&hide_key(name));
        PictureInfo::new(path, description, date, order, hidden)
    }

    /// All pictures in the directory, hidden ones included, sorted by
    /// order, date, name.
    pub fn pictures(&self) -> Result<Vec<PictureInfo>> {
        let mut pictures: Vec<_> = self
            .picture_names()?
            .iter()
            .map(|name| self.picture_info(name))
            .collect();
        pictures.sort();
        Ok(pictures)
    }

    pub fn set_title(&mut self, title: &str) {
        if title.is_empty() {
            self.dirty |= self.data.remove("title");
        } else {
            self.dirty |= self.data.set("title", title);
        }
    }

    /// An empty description reverts to the default (the file name).
    pub fn set_description(&mut self, name: &str, description: &str) {
        let key = description_key(name);
        if description.is_empty() || description == name {
            self.dirty |= self.data.remove(&key);
        } else {
            self.dirty |= self.data.set(&key, description);
        }
    }

    pub fn set_order(&mut self, name: &str, order: Option<u32>) {
        let key = order_key(name);
        match order {
            Some(order) => self.dirty |= self.data.set(&key, &order.to_string()),
            None => self.dirty |= self.data.remove(&key),
        }
    }

    pub fn set_hidden(&mut self, name: &str, hidden: bool) {
        let key = hide_key(name);
        if hidden {
            self.dirty |= self.data.set(&key, "true");
        } else {
            self.dirty |= self.data.remove(&key);
        }
    }

    /// Persist the property file, but only when something changed.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            debug!("No property changes for {}", self.data_dir.display());
            return Ok(());
        }
        std::fs::create_dir_all(&self.data_dir)?;
        self.data
            .store(&self.data_dir.join(DATA_FILE_NAME), STORE_COMMENT)?;
        self.dirty = false;
        Ok(())
    }
}

fn description_key(name: &str) -> String {
    format!("{name}.description")
}

fn order_key(name: &str) -> String {
    format!("{name}.order")
}

fn hide_key(name: &str) -> String {
    format!("{name}.hide")
}
