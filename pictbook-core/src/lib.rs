//! On-demand derived-asset cache for picture books.
//!
//! Scaled renditions of pictures, and poster frames grabbed from home
//! movies, are built lazily under a data directory and reused on every
//! later request. Concurrent requests for the same rendition are
//! collapsed into a single build through per-key locks, and finished
//! files are published atomically so readers never see a partial write.

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod movie;
pub mod overlay;
pub mod scale;
pub mod store;
pub mod util;

pub use cache::{ServeFile, ThumbnailCache};
pub use config::Config;
pub use error::{PictError, Result};
pub use store::{BookDir, PictureInfo, Storage};
