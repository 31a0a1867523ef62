//! Staging package promotion
//!
//! Repackages an archive so that a `-suffix` version becomes its base version:
//! the file name token and the manifest's `<version>` element are rewritten,
//! every other entry is copied raw without recompression.

use crate::core::error::PublishError;
use crate::core::traits::split_version;
use crate::package::identity::{decode_manifest, is_manifest_entry};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Write a copy of `path` with `full_version` replaced by its base version
///
/// Returns the path of the derived artifact, next to the original. When
/// `full_version` has no `-suffix` nothing is written and the original path is
/// returned.
///
/// # Errors
///
/// - `PublishError::NotFound` - the source archive does not exist
/// - `PublishError::MalformedArtifact` - the source is not an archive or its
///   manifest is not UTF-8
/// - `PublishError::IoFailure` - reading or writing failed; the partial
///   destination is removed
pub fn strip_suffix(path: &Path, full_version: &str) -> Result<PathBuf, PublishError> {
    let (base, suffix) = split_version(full_version);
    if suffix.is_none() {
        return Ok(path.to_path_buf());
    }

    if !path.exists() {
        return Err(PublishError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let dest = derived_path(path, full_version, base)?;

    if let Err(error) = rewrite_archive(path, &dest, full_version, base) {
        if dest.exists()
            && let Err(cleanup) = fs::remove_file(&dest)
        {
            warn!(path = %dest.display(), error = %cleanup, "failed to remove partial package");
        }
        return Err(error);
    }

    info!(from = %path.display(), to = %dest.display(), "promoted {} to {}", full_version, base);
    Ok(dest)
}

/// Destination path: the file name with every `full_version` token replaced
fn derived_path(path: &Path, full_version: &str, base: &str) -> Result<PathBuf, PublishError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| PublishError::io(path, "file name is not valid UTF-8"))?;

    let new_name = file_name.replace(full_version, base);
    if new_name == file_name {
        return Err(PublishError::io(
            path,
            format!("file name does not contain version {}", full_version),
        ));
    }

    Ok(path.with_file_name(new_name))
}

fn rewrite_archive(
    source: &Path,
    dest: &Path,
    full_version: &str,
    base: &str,
) -> Result<(), PublishError> {
    let reader = BufReader::new(File::open(source).map_err(|e| PublishError::io(source, e))?);
    let mut archive = ZipArchive::new(reader).map_err(|e| PublishError::MalformedArtifact {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;

    let writer = BufWriter::new(File::create(dest).map_err(|e| PublishError::io(dest, e))?);
    let mut output = ZipWriter::new(writer);

    let from = format!("<version>{}</version>", full_version);
    let to = format!("<version>{}</version>", base);

    for i in 0..archive.len() {
        let is_manifest = {
            let entry = archive.by_index_raw(i).map_err(|e| PublishError::io(source, e))?;
            is_manifest_entry(entry.name())
        };

        if is_manifest {
            copy_manifest(&mut archive, i, &mut output, source, dest, &from, &to)?;
        } else {
            let entry = archive.by_index_raw(i).map_err(|e| PublishError::io(source, e))?;
            output
                .raw_copy_file(entry)
                .map_err(|e| PublishError::io(dest, e))?;
        }
    }

    let mut inner = output.finish().map_err(|e| PublishError::io(dest, e))?;
    inner.flush().map_err(|e| PublishError::io(dest, e))?;

    Ok(())
}

/// Re-encode the manifest entry with the version tag substituted
fn copy_manifest<R: Read + Seek, W: Write + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    output: &mut ZipWriter<W>,
    source: &Path,
    dest: &Path,
    from: &str,
    to: &str,
) -> Result<(), PublishError> {
    let mut entry = archive
        .by_index(index)
        .map_err(|e| PublishError::io(source, e))?;

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| PublishError::io(source, e))?;
    let had_bom = bytes.starts_with("\u{feff}".as_bytes());
    let text = decode_manifest(bytes).map_err(|e| PublishError::MalformedArtifact {
        path: source.to_path_buf(),
        reason: format!("manifest is not UTF-8: {}", e),
    })?;

    if !text.contains(from) {
        warn!(entry = entry.name(), "manifest does not contain {}", from);
    }
    let rewritten = text.replace(from, to);

    let mut options = SimpleFileOptions::default().compression_method(entry.compression());
    if let Some(modified) = entry.last_modified() {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = entry.unix_mode() {
        options = options.unix_permissions(mode);
    }

    let name = entry.name().to_string();
    output
        .start_file(name, options)
        .map_err(|e| PublishError::io(dest, e))?;
    if had_bom {
        output
            .write_all("\u{feff}".as_bytes())
            .map_err(|e| PublishError::io(dest, e))?;
    }
    output
        .write_all(rewritten.as_bytes())
        .map_err(|e| PublishError::io(dest, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::extract_identity;
    use crate::package::test_support::{read_entries, write_package, write_standard_package};
    use tempfile::TempDir;

    #[test]
    fn test_promotes_staging_package() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-stg");

        let dest = strip_suffix(&source, "1.2.3-stg").unwrap();

        assert_eq!(dest, temp_dir.path().join("Pkg.1.2.3.nupkg"));
        let identity = extract_identity(&dest).unwrap();
        assert_eq!(identity.id(), "Pkg");
        assert_eq!(identity.version(), "1.2.3");
    }

    #[test]
    fn test_preserves_every_other_entry() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-stg");

        let dest = strip_suffix(&source, "1.2.3-stg").unwrap();

        let before = read_entries(&source);
        let after = read_entries(&dest);
        assert_eq!(before.len(), after.len());

        for ((name_before, bytes_before), (name_after, bytes_after)) in before.iter().zip(&after) {
            assert_eq!(name_before, name_after);
            if name_before == "Pkg.nuspec" {
                let text_before = String::from_utf8(bytes_before.clone()).unwrap();
                let text_after = String::from_utf8(bytes_after.clone()).unwrap();
                assert_eq!(
                    text_before.replace("<version>1.2.3-stg</version>", "<version>1.2.3</version>"),
                    text_after
                );
                // attribute values are not the tagged version and stay untouched
                assert!(text_after.contains("version=\"1.2.3-stg\""));
            } else {
                assert_eq!(bytes_before, bytes_after);
            }
        }
    }

    #[test]
    fn test_source_is_not_modified() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-stg");
        let original = std::fs::read(&source).unwrap();

        strip_suffix(&source, "1.2.3-stg").unwrap();

        assert_eq!(std::fs::read(&source).unwrap(), original);
    }

    #[test]
    fn test_unsuffixed_version_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_standard_package(temp_dir.path(), "Pkg", "1.2.3");

        let dest = strip_suffix(&source, "1.2.3").unwrap();

        assert_eq!(dest, source);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();

        let result = strip_suffix(&temp_dir.path().join("Pkg.1.0.0-stg.nupkg"), "1.0.0-stg");

        assert!(matches!(result, Err(PublishError::NotFound { .. })));
    }

    #[test]
    fn test_file_name_without_version_token() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_package(
            temp_dir.path(),
            "package.nupkg",
            &[("Pkg.nuspec", &b"<id>Pkg</id><version>1.0.0-stg</version>"[..])],
        );

        let result = strip_suffix(&source, "1.0.0-stg");

        assert!(matches!(result, Err(PublishError::IoFailure { .. })));
    }

    #[test]
    fn test_corrupt_source_leaves_no_output() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("Pkg.1.0.0-stg.nupkg");
        std::fs::write(&source, b"not a zip archive").unwrap();

        let result = strip_suffix(&source, "1.0.0-stg");

        assert!(matches!(result, Err(PublishError::MalformedArtifact { .. })));
        assert!(!temp_dir.path().join("Pkg.1.0.0.nupkg").exists());
    }

    #[test]
    fn test_partial_output_removed_when_manifest_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = write_package(
            temp_dir.path(),
            "Pkg.1.0.0-stg.nupkg",
            &[
                ("lib/net8.0/a.dll", &[0x4d, 0x5a, 0x90, 0x00][..]),
                ("Pkg.nuspec", &[0xff, 0xfe, 0x00][..]),
            ],
        );

        let result = strip_suffix(&source, "1.0.0-stg");

        assert!(matches!(result, Err(PublishError::MalformedArtifact { .. })));
        assert!(!temp_dir.path().join("Pkg.1.0.0.nupkg").exists());
        assert!(source.exists());
    }

    #[test]
    fn test_only_the_exact_tag_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let manifest = "<id>Pkg</id><version>1.0.0-stg</version>\
                        <releaseNotes>built from 1.0.0-stg</releaseNotes>";
        let source = write_package(
            temp_dir.path(),
            "Pkg.1.0.0-stg.nupkg",
            &[("Pkg.nuspec", manifest.as_bytes())],
        );

        let dest = strip_suffix(&source, "1.0.0-stg").unwrap();

        let entries = read_entries(&dest);
        let text = String::from_utf8(entries[0].1.clone()).unwrap();
        assert!(text.contains("<version>1.0.0</version>"));
        assert!(text.contains("built from 1.0.0-stg"));
    }
}
