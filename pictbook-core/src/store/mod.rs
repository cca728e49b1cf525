//! Book metadata: property files, per-picture info and path resolution
//! from a book path like `family/2002/summer` down to a directory pair.

mod dir;
mod picture;

pub mod props;

pub use dir::BookDir;
pub use picture::PictureInfo;

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{PictError, Result};
use crate::store::props::Properties;

const TOP_INFO_FILENAME: &str = "top";
const BOOK_PREFIX: &str = "book";

/// Finds picture books: the top-level `top` property file names the
/// books (`book1`, `book2`, ...) and where their picture trees live
/// (`<name>.path`); data directories mirror the tree under the
/// configured data dir.
#[derive(Debug)]
pub struct Storage {
    config: Config,
}

impl Storage {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn top_level_properties(&self) -> Result<Option<Properties>> {
        let info_file = self.config.data_dir.join(TOP_INFO_FILENAME);
        if !info_file.exists() {
            return Ok(None);
        }
        Properties::load(&info_file).map(Some)
    }

    /// Names of the top-level books that are not hidden, in their listed
    /// order. An absent `top` file means no books.
    pub fn visible_top_level_books(&self) -> Result<Vec<String>> {
        let Some(props) = self.top_level_properties()? else {
            return Ok(Vec::new());
        };

        let mut books = Vec::new();
        let mut index = 1;
        while let Some(name) = props.get(&format!("{BOOK_PREFIX}{index}")) {
            if !props.get_bool(&format!("{name}.hide")) {
                books.push(name.to_string());
            }
            index += 1;
        }
        Ok(books)
    }

    /// Resolve a `/book/sub/dir` path to its picture and data
    /// directories, creating data directories on demand. Components that
    /// would escape the tree are refused.
    pub fn book_dir(&self, path: &str) -> Result<BookDir> {
        let mut components = path.split('/').filter(|c| !c.is_empty());
        let book = components
            .next()
            .ok_or_else(|| PictError::NotFound(PathBuf::from(path)))?;

        let props = self.top_level_properties()?.ok_or_else(|| {
            PictError::NotFound(self.config.data_dir.join(TOP_INFO_FILENAME))
        })?;
        let pict_root = props
            .get(&format!("{book}.path"))
            .ok_or_else(|| PictError::NotFound(PathBuf::from(path)))?;

        let mut pict_dir = PathBuf::from(pict_root);
        if !pict_dir.exists() {
            return Err(PictError::NotFound(pict_dir));
        }
        let mut data_dir = safe_subdir(&self.config.data_dir, book)?;

        for component in components {
            pict_dir = safe_subdir(&pict_dir, component)?;
            if !pict_dir.exists() {
                return Err(PictError::NotFound(pict_dir));
            }
            data_dir = safe_subdir(&data_dir, component)?;
        }

        std::fs::create_dir_all(&data_dir)?;
        BookDir::open(pict_dir, data_dir)
    }
}

/// Join one path component, refusing anything that could step out of the
/// tree (separators, parent references, absolute names).
fn safe_subdir(dir: &Path, component: &str) -> Result<PathBuf> {
    let suspicious = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
        || component.contains('\0');
    if suspicious {
        return Err(PictError::NotFound(dir.join(component)));
    }
    Ok(dir.join(component))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_book() -> (tempfile::TempDir, Storage) {
        let root = tempfile::tempdir().unwrap();
        let data_dir = root.path().join("config");
        let pict_dir = root.path().join("holiday");
        std::fs::create_dir_all(&data_dir).unwrap();
        std::fs::create_dir_all(pict_dir.join("day1")).unwrap();

        let mut top = Properties::new();
        top.set("book1", "holiday");
        top.set("holiday.path", pict_dir.to_str().unwrap());
        top.set("book2", "secret");
        top.set("secret.path", pict_dir.to_str().unwrap());
        top.set("secret.hide", "true");
        top.store(&data_dir.join("top"), "books").unwrap();

        let storage = Storage::new(Config::with_data_dir(data_dir));
        (root, storage)
    }

    #[test]
    fn hidden_books_are_not_listed() {
        let (_root, storage) = storage_with_book();
        assert_eq!(storage.visible_top_level_books().unwrap(), ["holiday"]);
    }

    #[test]
    fn resolves_nested_dirs_and_creates_data_dirs() {
        let (root, storage) = storage_with_book();
        let book = storage.book_dir("holiday/day1").unwrap();
        assert!(book.pict_dir().ends_with("holiday/day1"));
        assert!(book.data_dir().is_dir());
        assert!(
            book.data_dir()
                .starts_with(root.path().join("config/holiday"))
        );
    }

    #[test]
    fn unknown_book_is_not_found() {
        let (_root, storage) = storage_with_book();
        assert!(matches!(
            storage.book_dir("nope"),
            Err(PictError::NotFound(_))
        ));
    }

    #[test]
    fn path_escape_is_refused() {
        let (_root, storage) = storage_with_book();
        assert!(storage.book_dir("holiday/../../etc").is_err());
        assert!(storage.book_dir("holiday/day1/..").is_err());
    }

    #[test]
    fn missing_top_file_means_no_books() {
        let root = tempfile::tempdir().unwrap();
        let storage =
            Storage::new(Config::with_data_dir(root.path().join("empty")));
        assert!(storage.visible_top_level_books().unwrap().is_empty());
    }
}
