//! Package identity extraction
//!
//! Reads `(id, version)` from the `.nuspec` manifest at the root of a package
//! archive.
//!
//! # Example
//!
//! ```no_run
//! use release_publisher::package::extract_identity;
//!
//! let identity = extract_identity("out/Pkg.1.2.3-stg.nupkg".as_ref())?;
//! assert_eq!(identity.base_version(), "1.2.3");
//! # Ok::<(), release_publisher::PublishError>(())
//! ```

use crate::core::error::PublishError;
use crate::core::traits::PackageIdentity;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Manifest entry file extension
pub const MANIFEST_EXTENSION: &str = ".nuspec";

lazy_static! {
    static ref ID_REGEX: Regex = Regex::new(r"<id>\s*([^<]*?)\s*</id>").unwrap();
    static ref VERSION_REGEX: Regex = Regex::new(r"<version>\s*([^<]*?)\s*</version>").unwrap();
}

/// Whether an archive entry is the package manifest
///
/// The manifest is a root-level entry ending in `.nuspec` (any case).
pub fn is_manifest_entry(name: &str) -> bool {
    !name.contains('/') && name.to_ascii_lowercase().ends_with(MANIFEST_EXTENSION)
}

/// Extract the package identity from an artifact
///
/// # Errors
///
/// - `PublishError::NotFound` - the path does not exist
/// - `PublishError::MalformedArtifact` - not an archive, no manifest, or the
///   manifest lacks an id or version
/// - `PublishError::IoFailure` - the file could not be read
pub fn extract_identity(path: &Path) -> Result<PackageIdentity, PublishError> {
    if !path.exists() {
        return Err(PublishError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|e| PublishError::io(path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| malformed(path, e))?;

    let text = read_manifest(&mut archive, path)?;
    let identity = parse_manifest(&text)
        .ok_or_else(|| malformed(path, "manifest has no parseable <id> and <version>"))?;

    debug!(path = %path.display(), id = identity.id(), version = identity.version(), "extracted package identity");
    Ok(identity)
}

/// Parse the identity out of manifest text
pub fn parse_manifest(text: &str) -> Option<PackageIdentity> {
    let id = ID_REGEX.captures(text)?.get(1)?.as_str();
    let version = VERSION_REGEX.captures(text)?.get(1)?.as_str();
    PackageIdentity::new(id, version)
}

/// Decode manifest bytes, tolerating a UTF-8 byte order mark
pub(crate) fn decode_manifest(bytes: Vec<u8>) -> Result<String, std::string::FromUtf8Error> {
    let text = String::from_utf8(bytes)?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<String, PublishError> {
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| malformed(path, e))?;
        if !is_manifest_entry(entry.name()) {
            continue;
        }

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| malformed(path, e))?;
        return decode_manifest(bytes).map_err(|e| malformed(path, e));
    }

    Err(malformed(path, "no manifest entry"))
}

fn malformed(path: &Path, reason: impl std::fmt::Display) -> PublishError {
    PublishError::MalformedArtifact {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
