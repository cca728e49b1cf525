//! The derived-asset cache: scaled renditions of pictures and movies,
//! built on demand, exactly once per (source, size) pair.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{PictError, Result};
use crate::lock::KeyedLocks;
use crate::movie::FrameGrabber;
use crate::overlay;
use crate::scale;
use crate::util::{extension_of, is_movie_extension};

/// What the caller should stream back: a ready cache file, or the
/// unscaled original when scaling was impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeFile {
    Cached(PathBuf),
    Original(PathBuf),
}

impl ServeFile {
    pub fn path(&self) -> &Path {
        match self {
            ServeFile::Cached(path) | ServeFile::Original(path) => path,
        }
    }
}

/// Name of the cache file for a source file at a given size:
/// `<stem>-s<size>.<ext>`, where the extension is `png` for gif sources
/// (we do not write gif), `jpg` for movies, and the source's own
/// extension otherwise.
pub fn cached_file_name(file_name: &str, max_size: u32) -> String {
    let extension = extension_of(file_name);
    let stem = if extension.is_empty() {
        file_name
    } else {
        &file_name[..file_name.len() - extension.len() - 1]
    };
    if extension.eq_ignore_ascii_case("gif") {
        format!("{stem}-s{max_size}.png")
    } else if is_movie_extension(extension) {
        format!("{stem}-s{max_size}.jpg")
    } else if extension.is_empty() {
        format!("{stem}-s{max_size}")
    } else {
        format!("{stem}-s{max_size}.{extension}")
    }
}

/// Name of the cached frame grabbed from a movie. Keeps the full movie
/// file name so different containers with the same stem do not collide,
/// and is shared by every requested thumbnail size.
pub fn grabbed_file_name(file_name: &str) -> String {
    debug_assert!(is_movie_extension(extension_of(file_name)));
    format!("{file_name}-grabbed.jpg")
}

/// Builds and serves scaled renditions. The data directory is owned by
/// this cache; nothing else writes into it.
#[derive(Debug)]
pub struct ThumbnailCache {
    config: Config,
    locks: KeyedLocks,
    grabber: FrameGrabber,
}

impl ThumbnailCache {
    pub fn new(config: Config) -> Result<Self> {
        config.ensure_directories()?;
        let grabber = FrameGrabber::new(&config)?;
        Ok(Self {
            config,
            locks: KeyedLocks::new(),
            grabber,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Return a file scaled to at most `max_size` pixels wide for the
    /// given source, building and caching it when absent.
    ///
    /// A missing source is a hard error. Every other failure degrades:
    /// movie frames that cannot be grabbed use the placeholder poster,
    /// and sources that cannot be scaled at all are served unscaled.
    pub async fn get_or_build(
        &self,
        source: &Path,
        data_dir: &Path,
        max_size: u32,
    ) -> Result<ServeFile> {
        if tokio::fs::metadata(source).await.is_err() {
            return Err(PictError::NotFound(source.to_path_buf()));
        }
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PictError::NotFound(source.to_path_buf()))?;

        tokio::fs::create_dir_all(data_dir).await?;
        let cache_path = data_dir.join(cached_file_name(file_name, max_size));

        // Fast path without the lock. Racing a concurrent first build is
        // harmless: the file only ever appears complete (atomic rename).
        if cache_path.exists() {
            debug!("Cache hit: {}", cache_path.display());
            return Ok(ServeFile::Cached(cache_path));
        }

        // Normalize the key through the real directory so every spelling
        // of the same path serializes on the same lock.
        let lock_key = lock_key_for(data_dir, &cache_path)?;
        let _guard = self.locks.acquire(&lock_key).await;

        // Double-checked: someone may have built it while we waited.
        if cache_path.exists() {
            debug!("Cache hit after wait: {}", cache_path.display());
            return Ok(ServeFile::Cached(cache_path));
        }

        match self.build(source, file_name, data_dir, &cache_path, max_size).await
        {
            Ok(()) => Ok(ServeFile::Cached(cache_path)),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Cannot scale {}, serving original ({e})",
                    source.display()
                );
                Ok(ServeFile::Original(source.to_path_buf()))
            }
            Err(e) => Err(e),
        }
    }

    async fn build(
        &self,
        source: &Path,
        file_name: &str,
        data_dir: &Path,
        cache_path: &Path,
        max_size: u32,
    ) -> Result<()> {
        let is_movie = is_movie_extension(extension_of(file_name));
        let scale_source = if is_movie {
            self.grabbed_frame(source, file_name, data_dir).await?
        } else {
            source.to_path_buf()
        };

        let target = cache_path.to_path_buf();
        let overlay_alpha = is_movie.then_some(self.config.movie_overlay_alpha);
        let built = tokio::task::spawn_blocking(move || {
            build_scaled_file(&scale_source, &target, max_size, overlay_alpha)
        })
        .await
        .map_err(|e| PictError::Internal(format!("scale task died: {e}")))?;
        built?;

        info!(
            "Built thumbnail {} ({}px) for {}",
            cache_path.display(),
            max_size,
            source.display()
        );
        Ok(())
    }

    /// The still frame standing in for a movie: the cached grab when one
    /// exists or can be made, otherwise the configured placeholder
    /// poster. Grabs take their own lock, keyed on the grabbed file, so
    /// concurrent requests for different sizes of one movie extract the
    /// frame only once.
    async fn grabbed_frame(
        &self,
        source: &Path,
        file_name: &str,
        data_dir: &Path,
    ) -> Result<PathBuf> {
        let grabbed = data_dir.join(grabbed_file_name(file_name));
        if grabbed.exists() {
            return Ok(grabbed);
        }

        let lock_key = lock_key_for(data_dir, &grabbed)?;
        let _guard = self.locks.acquire(&lock_key).await;
        if grabbed.exists() {
            return Ok(grabbed);
        }

        match self.grabber.grab_poster_frame(source, &grabbed).await {
            Ok(()) => Ok(grabbed),
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Frame grab failed for {}, using placeholder ({e})",
                    source.display()
                );
                Ok(self.config.movie_placeholder())
            }
            Err(e) => Err(e),
        }
    }
}

/// Decode, bound-check, scale, optionally overlay, and publish. Runs on a
/// blocking thread; all the work is CPU and file I/O.
fn build_scaled_file(
    scale_source: &Path,
    target: &Path,
    max_size: u32,
    overlay_alpha: Option<f32>,
) -> Result<()> {
    let image = scale::load_bounded(scale_source).map_err(|e| match e {
        // A vanished scale source (say, a deleted placeholder) is not a
        // hard error; the caller falls back to the original file.
        PictError::Io(io) => PictError::Decode(format!(
            "{}: {io}",
            scale_source.display()
        )),
        other => other,
    })?;

    let mut scaled = scale::scale(&image, max_size);
    if let Some(alpha) = overlay_alpha {
        scaled = overlay::apply_play_glyph(scaled, alpha);
    }

    let target_ext = extension_of(
        target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default(),
    );
    let format = scale::output_format_for(target_ext)?;
    scale::encode_atomic(&scaled, target, format)
}

fn lock_key_for(data_dir: &Path, cache_path: &Path) -> Result<String> {
    let file_name = cache_path
        .file_name()
        .ok_or_else(|| PictError::NotFound(cache_path.to_path_buf()))?;
    let canonical = data_dir.canonicalize()?.join(file_name);
    Ok(canonical.to_string_lossy().into_owned())
}
