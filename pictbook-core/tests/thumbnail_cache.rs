//! End to end cache behavior against a real temp data directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use pictbook_core::{Config, PictError, ServeFile, ThumbnailCache};

struct Fixture {
    _root: tempfile::TempDir,
    pict_dir: PathBuf,
    data_dir: PathBuf,
    cache: ThumbnailCache,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let pict_dir = root.path().join("pictures");
    let data_dir = root.path().join("data");
    std::fs::create_dir_all(&pict_dir).unwrap();

    let config = Config::with_data_dir(&data_dir);
    let cache = ThumbnailCache::new(config).unwrap();
    Fixture {
        _root: root,
        pict_dir,
        data_dir,
        cache,
    }
}

fn write_image(path: &Path, width: u32, height: u32, format: ImageFormat) {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
    image::DynamicImage::ImageRgb8(image)
        .save_with_format(path, format)
        .unwrap();
}

#[tokio::test]
async fn builds_and_caches_scaled_jpeg() {
    let f = fixture();
    let source = f.pict_dir.join("photo.jpg");
    write_image(&source, 800, 600, ImageFormat::Jpeg);

    let served = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    let expected = f.data_dir.join("photo-s150.jpg");
    assert_eq!(served.path(), expected);
    assert!(matches!(served, ServeFile::Cached(_)));

    let (w, h) = image::image_dimensions(&expected).unwrap();
    assert_eq!((w, h), (150, 112));
}

#[tokio::test]
async fn gif_thumbnails_become_png() {
    let f = fixture();
    let source = f.pict_dir.join("icon.gif");
    write_image(&source, 200, 100, ImageFormat::Gif);

    let served = f.cache.get_or_build(&source, &f.data_dir, 64).await.unwrap();
    assert_eq!(served.path(), f.data_dir.join("icon-s64.png"));

    let (w, h) = image::image_dimensions(served.path()).unwrap();
    assert_eq!((w, h), (64, 32));
}

#[tokio::test]
async fn never_scales_up() {
    let f = fixture();
    let source = f.pict_dir.join("small.jpg");
    write_image(&source, 100, 50, ImageFormat::Jpeg);

    let served = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    let (w, h) = image::image_dimensions(served.path()).unwrap();
    assert_eq!((w, h), (100, 50));
}

#[tokio::test]
async fn second_request_reuses_cached_file() {
    let f = fixture();
    let source = f.pict_dir.join("photo.jpg");
    write_image(&source, 800, 600, ImageFormat::Jpeg);

    let first = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    let mtime = std::fs::metadata(first.path()).unwrap().modified().unwrap();

    let second = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    assert_eq!(first.path(), second.path());
    let mtime_after =
        std::fs::metadata(second.path()).unwrap().modified().unwrap();
    assert_eq!(mtime, mtime_after, "cached file was rebuilt");
}

#[tokio::test]
async fn concurrent_requests_build_exactly_once() {
    use std::os::unix::fs::MetadataExt;

    let f = fixture();
    let source = f.pict_dir.join("busy.jpg");
    write_image(&source, 800, 600, ImageFormat::Jpeg);

    let cache = Arc::new(f.cache);
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let source = source.clone();
        let data_dir = f.data_dir.clone();
        tasks.push(tokio::spawn(async move {
            let served =
                cache.get_or_build(&source, &data_dir, 150).await.unwrap();
            // Identity of the cache file as this task saw it. A rebuild
            // publishes a fresh temp file, giving a new inode.
            let meta = std::fs::metadata(served.path()).unwrap();
            (served.path().to_path_buf(), meta.ino(), meta.modified().unwrap())
        }));
    }

    let expected = f.data_dir.join("busy-s150.jpg");
    let mut observed = Vec::new();
    for task in tasks {
        let (path, ino, mtime) = task.await.unwrap();
        assert_eq!(path, expected);
        observed.push((ino, mtime));
    }

    // Every task saw the same file, byte-identical and never replaced:
    // one inode, one write.
    let final_meta = std::fs::metadata(&expected).unwrap();
    let final_id = (final_meta.ino(), final_meta.modified().unwrap());
    for seen in &observed {
        assert_eq!(*seen, final_id, "cache file was rebuilt");
    }
    assert_eq!(image::image_dimensions(&expected).unwrap(), (150, 112));
}

#[tokio::test]
async fn unreadable_movie_falls_back_to_placeholder_poster() {
    let f = fixture();
    write_image(&f.data_dir.join("movie.png"), 320, 240, ImageFormat::Png);

    let source = f.pict_dir.join("clip.avi");
    std::fs::write(&source, vec![0u8; 4096]).unwrap();

    let served = f.cache.get_or_build(&source, &f.data_dir, 120).await.unwrap();
    assert_eq!(served.path(), f.data_dir.join("clip-s120.jpg"));
    let (w, h) = image::image_dimensions(served.path()).unwrap();
    assert_eq!((w, h), (120, 90));

    // A second size reuses the fallback without a hard error.
    let served = f.cache.get_or_build(&source, &f.data_dir, 200).await.unwrap();
    assert_eq!(served.path(), f.data_dir.join("clip-s200.jpg"));
}

#[tokio::test]
async fn unreadable_movie_without_placeholder_serves_original() {
    let f = fixture();
    let source = f.pict_dir.join("clip.mpg");
    std::fs::write(&source, vec![0u8; 4096]).unwrap();

    let served = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    assert!(matches!(served, ServeFile::Original(_)));
    assert_eq!(served.path(), source);
}

#[tokio::test]
async fn undecodable_picture_serves_original() {
    let f = fixture();
    let source = f.pict_dir.join("broken.jpg");
    std::fs::write(&source, b"not actually a jpeg").unwrap();

    let served = f.cache.get_or_build(&source, &f.data_dir, 150).await.unwrap();
    assert!(matches!(served, ServeFile::Original(_)));
    assert_eq!(served.path(), source);
}

#[tokio::test]
async fn missing_source_is_a_hard_error() {
    let f = fixture();
    let source = f.pict_dir.join("gone.jpg");
    let err = f.cache.get_or_build(&source, &f.data_dir, 150).await;
    assert!(matches!(err, Err(PictError::NotFound(_))));
}
