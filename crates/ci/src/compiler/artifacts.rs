//! Artifact path handling for publish and download steps.

use std::path::Path;

const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Cut a product pattern back to its nearest ancestor without wildcards.
///
/// `output/**/*.nupkg` becomes `output`. A pattern whose first component
/// is already a wildcard reduces to `.`.
#[must_use]
pub fn reduce_to_static_ancestor(pattern: &str) -> String {
    let normalized = pattern.replace('\\', "/");
    let is_absolute = normalized.starts_with('/');

    let kept: Vec<&str> = normalized
        .split('/')
        .filter(|component| !component.is_empty())
        .take_while(|component| !component.contains(WILDCARDS))
        .collect();

    match (kept.is_empty(), is_absolute) {
        (true, true) => "/".to_string(),
        (true, false) => ".".to_string(),
        (false, true) => format!("/{}", kept.join("/")),
        (false, false) => kept.join("/"),
    }
}

/// Express `path` relative to `root` with forward slashes when it lies
/// under `root`; other paths are returned unchanged.
#[must_use]
pub fn root_relative(root: &Path, path: &str) -> String {
    Path::new(path)
        .strip_prefix(root)
        .map_or_else(|_| path.to_string(), to_unix)
}

fn to_unix(path: &Path) -> String {
    let text = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if text.is_empty() { ".".to_string() } else { text }
}

/// Artifact name: the last path segment.
#[must_use]
pub fn artifact_name(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty() && *segment != ".")
        .unwrap_or("artifact")
        .to_string()
}

/// Reduce, relativize and deduplicate a list of product patterns,
/// keeping first-seen order.
#[must_use]
pub fn artifact_paths<'a>(root: &Path, patterns: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for pattern in patterns {
        let reduced = root_relative(root, &reduce_to_static_ancestor(pattern));
        if !paths.contains(&reduced) {
            paths.push(reduced);
        }
    }
    paths
}
