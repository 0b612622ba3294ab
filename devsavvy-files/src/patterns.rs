//! Path filters used when attaching whole directories as context.

use crate::kind::FileKind;
use std::path::Path;

/// Default directory and file name patterns to skip when collecting files.
pub fn default_exclude_patterns() -> Vec<String> {
    [
        // Version control
        ".git",
        ".svn",
        ".hg",
        // Build outputs
        "target",
        "dist",
        "build",
        ".next",
        // Package managers
        "node_modules",
        "vendor",
        ".pnpm-store",
        // Python
        "__pycache__",
        ".venv",
        "venv",
        ".pytest_cache",
        // IDEs
        ".vscode",
        ".idea",
        // OS
        ".DS_Store",
        "Thumbs.db",
        // Temp/cache
        ".cache",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// Extensions that never carry extractable text.
pub fn binary_extensions() -> &'static [&'static str] {
    &[
        // Archives
        "zip", "tar", "gz", "bz2", "7z", "rar",
        // Executables/Libraries
        "exe", "dll", "so", "dylib", "a", "lib", "wasm", "bin",
        // Media
        "mp3", "mp4", "avi", "mov", "mkv", "wav", "flac",
        // Databases
        "db", "sqlite", "sqlite3",
        // Legacy office formats we cannot read
        "doc", "ppt", "pptx",
        "lock",
    ]
}

/// Checks if any component of `path` matches an exclude pattern.
pub fn should_exclude(path: &Path, exclude_patterns: &[String]) -> bool {
    path.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| exclude_patterns.iter().any(|pattern| name == pattern))
            .unwrap_or(false)
    })
}

/// Checks if a file is worth handing to the extractor.
///
/// An empty `extensions` list accepts every file whose kind is supported.
pub fn is_collectable(path: &Path, extensions: &[String]) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    if let Some(ext) = &ext {
        if binary_extensions().contains(&ext.as_str()) {
            return false;
        }
    }

    if !extensions.is_empty() {
        return ext
            .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
            .unwrap_or(false);
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    FileKind::from_name(name) != FileKind::Unsupported
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_should_exclude_git() {
        let path = PathBuf::from("/home/user/project/.git/config");
        assert!(should_exclude(&path, &default_exclude_patterns()));
    }

    #[test]
    fn test_should_exclude_node_modules() {
        let path = PathBuf::from("/home/user/project/node_modules/package/index.js");
        assert!(should_exclude(&path, &default_exclude_patterns()));
    }

    #[test]
    fn test_should_not_exclude_similar_names() {
        let patterns = default_exclude_patterns();
        assert!(!should_exclude(Path::new("/home/user/project/src/main.rs"), &patterns));
        assert!(!should_exclude(Path::new("docs/build-guide.md"), &patterns));
    }

    #[test]
    fn test_is_collectable() {
        assert!(is_collectable(Path::new("report.pdf"), &[]));
        assert!(is_collectable(Path::new("notes.md"), &[]));
        assert!(!is_collectable(Path::new("archive.zip"), &[]));
        assert!(!is_collectable(Path::new("LICENSE"), &[]));
    }

    #[test]
    fn test_is_collectable_with_allow_list() {
        let extensions = vec!["md".to_string(), "PDF".to_string()];
        assert!(is_collectable(Path::new("a.md"), &extensions));
        assert!(is_collectable(Path::new("b.pdf"), &extensions));
        assert!(!is_collectable(Path::new("c.rs"), &extensions));
        assert!(!is_collectable(Path::new("Makefile"), &extensions));
    }
}
