//! Well-known store paths for the report page.
//!
//! All store access goes through these constructors; raw path strings do
//! not appear at call sites.

use store::Path;

pub fn report() -> Path {
    Path::new("page/report")
}

pub fn report_sections() -> Path {
    Path::new("page/report/sections")
}

pub fn report_defaults() -> Path {
    Path::new("page/report/defaults")
}

pub fn report_public() -> Path {
    Path::new("page/report/public")
}

pub fn status() -> Path {
    Path::new("page/status")
}

pub fn editable() -> Path {
    Path::new("page/editable")
}

pub fn starred() -> Path {
    Path::new("page/starred")
}

pub fn header() -> Path {
    Path::new("page/header")
}

/// Working copy of the report defaults while the header is being edited.
pub fn defaults() -> Path {
    Path::new("page/defaults")
}

/// Transient per-section editor state, keyed by section id.
pub fn page_section(id: &str) -> Path {
    Path::new("page/sections").join(id)
}

pub fn route_id() -> Path {
    Path::new("route/id")
}

pub fn clipboard_report() -> Path {
    Path::new("clipboard/report")
}

pub fn user() -> Path {
    Path::new("user")
}
