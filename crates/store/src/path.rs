//! Slash-delimited store paths.
//!
//! A `Path` addresses a node in the store's value tree. Paths are
//! normalized on construction (leading/trailing/repeated separators are
//! dropped), so any two paths naming the same node compare equal and
//! there is no invalid-path state to handle at use sites.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    raw: Arc<str>,
}

impl Path {
    pub fn new(raw: impl AsRef<str>) -> Path {
        let normalized: Vec<&str> = raw
            .as_ref()
            .split('/')
            .filter(|seg| !seg.is_empty())
            .collect();
        Path {
            raw: normalized.join("/").into(),
        }
    }

    /// The root path, an ancestor of every other path.
    pub fn root() -> Path {
        Path { raw: "".into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('/').filter(|seg| !seg.is_empty())
    }

    pub fn join(&self, segment: &str) -> Path {
        if self.raw.is_empty() {
            Path::new(segment)
        } else {
            Path::new(format!("{}/{}", self.raw, segment))
        }
    }

    /// True when one path is the other (or an ancestor/descendant of it)
    /// on a segment boundary. A change at `other` may then affect the
    /// value visible at `self`.
    pub fn relates(&self, other: &Path) -> bool {
        let (a, b) = (self.as_str(), other.as_str());
        if a.is_empty() || b.is_empty() || a == b {
            return true;
        }
        let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
        longer.starts_with(shorter) && longer.as_bytes()[shorter.len()] == b'/'
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<&str> for Path {
    fn from(raw: &str) -> Path {
        Path::new(raw)
    }
}
