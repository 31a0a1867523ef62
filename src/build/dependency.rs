//! Third-party dependency download and extraction

use crate::core::error::PublishError;
use crate::core::traits::DependencyFetcher;
use async_trait::async_trait;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Download URL for the dependency archive
///
/// `{base}{archive}`, or `{base}{kind}/{archive}` when the descriptor names a
/// package kind.
///
/// # Examples
///
/// ```
/// use release_publisher::build::dependency::dependency_url;
///
/// let base = "https://example.test/distrib/";
/// assert_eq!(dependency_url(base, None, "latest.zip"), "https://example.test/distrib/latest.zip");
/// assert_eq!(
///     dependency_url(base, Some("stg"), "latest.zip"),
///     "https://example.test/distrib/stg/latest.zip"
/// );
/// ```
pub fn dependency_url(url_base: &str, package_kind: Option<&str>, archive: &str) -> String {
    match package_kind {
        Some(kind) if !kind.is_empty() => format!("{}{}/{}", url_base, kind, archive),
        _ => format!("{}{}", url_base, archive),
    }
}

/// Downloads a zip archive over HTTP and extracts it
pub struct HttpDependencyFetcher {
    http: reqwest::Client,
}

impl HttpDependencyFetcher {
    pub fn new() -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("release-publisher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl DependencyFetcher for HttpDependencyFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), PublishError> {
        let failed = |message: String| PublishError::DownloadFailed {
            url: url.to_string(),
            message,
        };

        info!(url, "downloading dependency");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        debug!(url, size = bytes.len(), "downloaded dependency");

        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| failed(format!("not a zip archive: {}", e)))?;

        info!(dest = %dest.display(), "extracting dependency");
        let count = extract_zip(&mut archive, dest)?;
        info!(files = count, "dependency extracted");
        Ok(())
    }
}

/// Extract every safely named entry into `dest`, returning the file count
pub(crate) fn extract_zip<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
) -> Result<usize, PublishError> {
    fs::create_dir_all(dest).map_err(|e| PublishError::io(dest, e))?;
    let mut extracted = 0;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| PublishError::io(dest, e))?;
        let relative_path = match file.enclosed_name() {
            Some(path) => path.to_owned(),
            None => {
                warn!(entry = file.name(), "skipping entry with unsafe path");
                continue;
            }
        };

        let absolute_path = dest.join(&relative_path);
        if file.is_dir() {
            fs::create_dir_all(&absolute_path).map_err(|e| PublishError::io(&absolute_path, e))?;
            continue;
        }

        if let Some(parent) = absolute_path.parent() {
            fs::create_dir_all(parent).map_err(|e| PublishError::io(parent, e))?;
        }

        let mut outfile =
            File::create(&absolute_path).map_err(|e| PublishError::io(&absolute_path, e))?;
        io::copy(&mut file, &mut outfile).map_err(|e| PublishError::io(&absolute_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))
                    .map_err(|e| PublishError::io(&absolute_path, e))?;
            }
        }

        extracted += 1;
    }

    Ok(extracted)
}
