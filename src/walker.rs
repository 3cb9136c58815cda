use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    cache::CACHE_DIR_NAME,
    error::{Error, Result},
};

/// Direct entries of one directory, split by kind and sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Level {
    /// Files whose extension is in the allow-list.
    pub files: Vec<PathBuf>,
    /// Subdirectories to descend into (hidden and cache directories
    /// excluded).
    pub dirs: Vec<PathBuf>,
}

/// Normalize an extension for comparison: lowercase, no leading `.`.
///
/// # Examples
///
/// ```
/// use recollect::walker::normalize_extension;
///
/// assert_eq!(normalize_extension(".PNG"), "png");
/// assert_eq!(normalize_extension("txt"), "txt");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Whether the text after the last `.` of the file name is one of
/// `allowed`. Both sides are normalized, so `"TXT"` and `".txt"` match
/// `notes.Txt`.
pub fn has_allowed_extension(path: &Path, allowed: &[String]) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(_, ext)| {
            let ext = normalize_extension(ext);
            allowed.iter().any(|a| normalize_extension(a) == ext)
        })
}

/// List the direct entries of `dir`.
///
/// Cache directories and hidden subdirectories are left out. Symlinks to
/// files are kept; symlinks to directories are not followed, which rules
/// out cycles. Fails with [`Error::DirectoryUnreadable`] when `dir` itself
/// cannot be listed; unreadable individual entries are skipped.
pub fn read_level(dir: &Path, allowed: &[String]) -> Result<Level> {
    let unreadable = |source| Error::DirectoryUnreadable {
        dir: dir.to_path_buf(),
        source,
    };

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(unreadable)?
        .filter_map(|entry| entry.ok())
        .collect();
    entries.sort_by_key(|entry| entry.file_name());

    let mut level = Level::default();

    for entry in entries {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        if name == CACHE_DIR_NAME {
            continue;
        }

        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            if name.starts_with('.') {
                debug!(dir = %path.display(), "skipping hidden directory");
                continue;
            }
            level.dirs.push(path);
        } else if file_type.is_symlink() {
            // Broken links and links to directories are skipped.
            let Ok(meta) = std::fs::metadata(&path) else {
                continue;
            };
            if meta.is_file() && has_allowed_extension(&path, allowed) {
                level.files.push(path);
            }
        } else if file_type.is_file() && has_allowed_extension(&path, allowed) {
            level.files.push(path);
        }
    }

    Ok(level)
}

/// Recursively enumerate files under `root` whose extension is allowed.
///
/// Depth-first: a directory's own files come first, then each subdirectory
/// in name order. `root` itself may be hidden; hidden directories below it
/// are skipped, as are cache directories. A directory that cannot be read
/// contributes nothing.
///
/// # Examples
///
/// ```
/// # let tmp = tempfile::tempdir().unwrap();
/// std::fs::write(tmp.path().join("a.TXT"), "x").unwrap();
/// std::fs::write(tmp.path().join("b.rs"), "x").unwrap();
///
/// let files = recollect::walker::enumerate(tmp.path(), &["txt".to_string()]);
/// assert_eq!(files, vec![tmp.path().join("a.TXT")]);
/// ```
pub fn enumerate(root: &Path, allowed_extensions: &[String]) -> Vec<PathBuf> {
    let allowed: Vec<String> = allowed_extensions
        .iter()
        .map(|e| normalize_extension(e))
        .collect();
    let mut results = Vec::new();
    walk_dir(root, &allowed, &mut results);
    results
}

fn walk_dir(dir: &Path, allowed: &[String], results: &mut Vec<PathBuf>) {
    let level = match read_level(dir, allowed) {
        Ok(level) => level,
        Err(e) => {
            warn!(error = %e, "skipping unreadable directory");
            return;
        }
    };

    results.extend(level.files);
    for sub in &level.dirs {
        walk_dir(sub, allowed, results);
    }
}
