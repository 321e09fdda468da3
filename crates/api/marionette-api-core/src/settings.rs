//! Model settings contract.
//!
//! Parsing a settings JSON is the platform's business. The rest of the
//! system only needs the named resource slots below and a way to resolve a
//! relative file reference against the settings' own location.

use std::any::Any;
use std::fmt::Debug;

use url::Url;

pub trait ModelSettings: Any + Debug {
    fn name(&self) -> &str;

    /// Location the settings were loaded from; empty when built in memory.
    fn url(&self) -> &str;

    /// Core-model binary file reference.
    fn moc(&self) -> &str;

    fn pose(&self) -> Option<&str> {
        None
    }

    fn physics(&self) -> Option<&str> {
        None
    }

    fn textures(&self) -> &[String];

    fn resolve_url(&self, path: &str) -> String {
        resolve_relative(self.url(), path)
    }

    /// Structural tests in platform adapters downcast through this.
    fn as_any(&self) -> &dyn Any;
}

/// Resolve `path` against the directory of `base`.
///
/// A base with a scheme and authority is resolved with [`Url::join`], so
/// its query and fragment never leak into the result. Relative and
/// file-system bases fold `.` and `..` segments instead. Absolute
/// references (`scheme://`, `data:`) are returned as-is.
pub fn resolve_relative(base: &str, path: &str) -> String {
    if path.contains("://") || path.starts_with("data:") {
        return path.to_string();
    }
    if let Some(base_url) = parse_absolute(base) {
        if let Ok(joined) = base_url.join(path) {
            return joined.into();
        }
    }
    if path.starts_with('/') {
        return path.to_string();
    }
    fold_segments(base, path)
}

fn parse_absolute(base: &str) -> Option<Url> {
    // Drive letters such as `C:/models` parse as a one-letter scheme.
    let url = Url::parse(base).ok()?;
    (url.scheme().len() > 1 && !url.cannot_be_a_base()).then_some(url)
}

fn fold_segments(base: &str, path: &str) -> String {
    let dir = match base.rfind('/') {
        Some(i) => &base[..=i],
        None => "",
    };
    let (prefix, rest) = match dir.strip_prefix('/') {
        Some(rest) => ("/", rest),
        None => ("", dir),
    };

    let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("{prefix}{}", segments.join("/"))
}
