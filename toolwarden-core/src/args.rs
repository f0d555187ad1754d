//! Inspection of raw tool-call arguments.
//!
//! Tool arguments arrive as free-form JSON from the model. These helpers pull
//! out the parts the authorization core cares about: path-like values and
//! URLs. Extraction is generous: anything that looks like a path
//! or URL is checked.

use regex::Regex;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use url::Url;

/// Argument keys whose string values (or string arrays) are treated as paths.
pub const PATH_KEYS: &[&str] = &[
    "path",
    "file_path",
    "filePath",
    "source",
    "destination",
    "target",
    "directory",
    "dir",
    "cwd",
    "paths",
];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(?i)\bhttps?://[^\s"'<>`]+"#).expect("valid URL pattern"))
}

/// Collect every path-like argument value, in [`PATH_KEYS`] order.
///
/// Only top-level keys listed in [`PATH_KEYS`] are considered. Arrays of
/// strings under those keys contribute each element.
pub fn path_args(args: &Value) -> Vec<String> {
    let Some(obj) = args.as_object() else {
        return Vec::new();
    };

    let mut paths = Vec::new();
    for key in PATH_KEYS {
        match obj.get(*key) {
            Some(Value::String(s)) if !s.is_empty() => paths.push(s.clone()),
            Some(Value::Array(items)) => paths.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            ),
            _ => {}
        }
    }
    paths
}

/// Collect every http(s) URL found anywhere in the arguments.
///
/// Strings are scanned for embedded URLs, so a shell command like
/// `curl https://example.com` yields `https://example.com/`.
pub fn url_args(args: &Value) -> Vec<Url> {
    let mut urls = Vec::new();
    collect_urls(args, &mut urls);
    urls
}

fn collect_urls(value: &Value, out: &mut Vec<Url>) {
    match value {
        Value::String(s) => {
            for m in url_pattern().find_iter(s) {
                let candidate = m.as_str().trim_end_matches(['.', ',', ';', ')', ']']);
                if let Ok(url) = Url::parse(candidate) {
                    if !out.contains(&url) {
                        out.push(url);
                    }
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_urls(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_urls(v, out)),
        _ => {}
    }
}

/// Lexically normalize `path` against `root`.
///
/// Relative paths are joined to `root`. `.` components are dropped and `..`
/// pops the previous component; nothing touches the filesystem, so symlinks
/// are not followed. Paths starting with `~` are rejected because the tool
/// executing them would expand them outside the workspace.
pub fn normalize_path(root: &Path, path: &str) -> Option<PathBuf> {
    if path.starts_with('~') {
        return None;
    }

    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };
    Some(lexical_normalize(&joined))
}

/// Remove `.` and `..` components without consulting the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if !at_root {
                    out.pop();
                } else if !path.has_root() {
                    // Relative path climbing above its start stays visible.
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Resolve `path` against `root` and return it relative to `root`.
///
/// Returns `None` when the normalized path escapes `root`.
pub fn relative_to_root(root: &Path, path: &str) -> Option<PathBuf> {
    let root = lexical_normalize(root);
    let normalized = normalize_path(&root, path)?;
    normalized.strip_prefix(&root).ok().map(Path::to_path_buf)
}
