use std::path::{Path, PathBuf};

/// Longest workspace root that contains `path`.
pub fn containing_root<'a>(roots: &'a [PathBuf], path: &Path) -> Option<&'a PathBuf> {
    roots
        .iter()
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
}

/// Directory to resolve for an activity.
///
/// With a path: its containing workspace root, or its parent directory when
/// it lies outside every root. Without a path: the first workspace root.
pub fn resolution_target(roots: &[PathBuf], path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => containing_root(roots, path)
            .cloned()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .filter(|dir| !dir.as_os_str().is_empty()),
        None => roots.first().cloned(),
    }
}
