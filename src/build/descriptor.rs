//! Project descriptor access
//!
//! The descriptor is an XML project file. Values are located by plain tag
//! search; no XML parser is involved.

use crate::core::error::PublishError;
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Text of the first `<tag>...</tag>` in `text`, trimmed
///
/// # Examples
///
/// ```
/// use release_publisher::build::descriptor::find_tag;
///
/// let text = "<PropertyGroup><Version> 3.1.0 </Version></PropertyGroup>";
/// assert_eq!(find_tag(text, "Version").as_deref(), Some("3.1.0"));
/// assert_eq!(find_tag(text, "PackageKind"), None);
/// ```
pub fn find_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let length = text[start..].find(&close)?;
    Some(text[start..start + length].trim().to_string())
}

/// Read the first `<tag>` value from the descriptor at `path`
///
/// A missing or unclosed tag is `Ok(None)`.
pub fn read_tag(path: &Path, tag: &str) -> Result<Option<String>, PublishError> {
    let text = read_descriptor(path)?;
    let value = find_tag(&text, tag);
    debug!(path = %path.display(), tag, value = ?value, "read descriptor tag");
    Ok(value)
}

/// Replace every occurrence of `placeholder` in the descriptor
///
/// Returns the number of replacements. The file is only rewritten when at
/// least one occurrence was found.
pub fn replace_placeholder(
    path: &Path,
    placeholder: &str,
    replacement: &str,
) -> Result<usize, PublishError> {
    let text = read_descriptor(path)?;
    let count = text.matches(placeholder).count();

    if count == 0 {
        warn!(path = %path.display(), placeholder, "placeholder not found in descriptor");
        return Ok(0);
    }

    fs::write(path, text.replace(placeholder, replacement))
        .map_err(|e| PublishError::io(path, e))?;
    debug!(path = %path.display(), placeholder, replacement, count, "patched descriptor");
    Ok(count)
}

/// Path from the descriptor's directory to `target`, ending in a separator
///
/// Both paths are relative to the same root.
///
/// # Examples
///
/// ```
/// use release_publisher::build::descriptor::relative_library_path;
/// use std::path::Path;
///
/// let path = relative_library_path(Path::new("repo/Lib/Lib.csproj"), Path::new("bin_deps"));
/// assert_eq!(path, format!("..{0}..{0}bin_deps{0}", std::path::MAIN_SEPARATOR));
/// ```
pub fn relative_library_path(descriptor: &Path, target: &Path) -> String {
    let depth = descriptor
        .parent()
        .map(|dir| {
            dir.components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);

    let mut path = std::iter::repeat_n("..", depth).collect::<std::path::PathBuf>();
    path.push(target);

    let mut text = path.to_string_lossy().into_owned();
    text.push(std::path::MAIN_SEPARATOR);
    text
}

fn read_descriptor(path: &Path) -> Result<String, PublishError> {
    if !path.exists() {
        return Err(PublishError::NotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|e| PublishError::io(path, e))
}
