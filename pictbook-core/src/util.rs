use std::path::Path;

/// Extension of a file name without the dot, or the empty string when there
/// is no dot. `"photo.JPG"` gives `"JPG"`.
pub fn extension_of(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(dot) => &file_name[dot + 1..],
        None => "",
    }
}

/// Extension of a path's file name, empty when there is none.
pub fn path_extension(path: &Path) -> &str {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(extension_of)
        .unwrap_or("")
}

/// Whether the extension (without the dot) belongs to a movie container we
/// grab frames from.
pub fn is_movie_extension(extension: &str) -> bool {
    extension.eq_ignore_ascii_case("avi")
        || extension.eq_ignore_ascii_case("mpeg")
        || extension.eq_ignore_ascii_case("mpg")
}

/// Whether the file name is one of the picture or movie types a book lists.
pub fn is_book_entry(file_name: &str) -> bool {
    let ext = extension_of(file_name);
    ext.eq_ignore_ascii_case("jpg")
        || ext.eq_ignore_ascii_case("png")
        || ext.eq_ignore_ascii_case("gif")
        || is_movie_extension(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_extraction() {
        assert_eq!(extension_of("photo.jpg"), "jpg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("no_extension"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn movie_extensions_case_insensitive() {
        assert!(is_movie_extension("avi"));
        assert!(is_movie_extension("MPEG"));
        assert!(is_movie_extension("Mpg"));
        assert!(!is_movie_extension("mp4"));
        assert!(!is_movie_extension("jpg"));
    }

    #[test]
    fn book_entries() {
        assert!(is_book_entry("a.jpg"));
        assert!(is_book_entry("b.GIF"));
        assert!(is_book_entry("clip.avi"));
        assert!(!is_book_entry("notes.txt"));
        assert!(!is_book_entry("data"));
    }
}
