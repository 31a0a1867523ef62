//! Build Pipeline - produces the artifact to publish
//!
//! Steps, unless downloads are disabled:
//! 1. Clear the checkout and dependency directories
//! 2. Clone the source
//! 3. Read `<Version>` and `<PackageKind>` from the descriptor
//! 4. Download and extract the dependency archive
//!
//! Then always: patch the descriptor's library path placeholder, run the build
//! and locate the produced package.

use crate::build::dependency::dependency_url;
use crate::build::descriptor::{read_tag, relative_library_path, replace_placeholder};
use crate::build::runner::locate_artifact;
use crate::build::workspace::clear_directory;
use crate::build::{DotnetBuildRunner, GitSourceFetcher, HttpDependencyFetcher};
use crate::core::config::{ArtifactConfig, DependencyConfig, PublishConfig, SourceConfig};
use crate::core::error::PublishError;
use crate::core::traits::{BuildRunner, DependencyFetcher, SourceFetcher};
use std::path::{Path, PathBuf};
use tracing::{info, info_span, Instrument};

/// Descriptor tag holding the project version
pub const VERSION_TAG: &str = "Version";

/// Descriptor tag selecting the dependency channel
pub const PACKAGE_KIND_TAG: &str = "PackageKind";

/// Build pipeline over pluggable collaborators
pub struct BuildPipeline {
    project_path: PathBuf,
    source: SourceConfig,
    dependency: Option<DependencyConfig>,
    artifact: ArtifactConfig,
    source_fetcher: Box<dyn SourceFetcher>,
    dependency_fetcher: Box<dyn DependencyFetcher>,
    build_runner: Box<dyn BuildRunner>,
}

impl BuildPipeline {
    /// Create a pipeline with the git, HTTP and dotnet collaborators
    ///
    /// # Errors
    ///
    /// - `PublishError::ConfigError` when the `source` or `artifact` section is
    ///   missing
    /// - `PublishError::IoFailure` when `project_path` cannot be made absolute
    ///
    /// A relative `project_path` is resolved against the current directory
    /// here, since the collaborators run their commands from inside it.
    pub fn from_config(project_path: &Path, config: &PublishConfig) -> Result<Self, PublishError> {
        let source = config
            .source
            .clone()
            .ok_or_else(|| PublishError::ConfigError("source section is required to build".into()))?;
        let artifact = config
            .artifact
            .clone()
            .ok_or_else(|| PublishError::ConfigError("artifact section is required to build".into()))?;
        let project_path =
            std::path::absolute(project_path).map_err(|e| PublishError::io(project_path, e))?;

        Ok(Self {
            source_fetcher: Box::new(GitSourceFetcher::new(&project_path)),
            dependency_fetcher: Box::new(HttpDependencyFetcher::new()?),
            build_runner: Box::new(DotnetBuildRunner::new(&project_path)),
            project_path,
            source,
            dependency: config.dependency.clone(),
            artifact,
        })
    }

    pub fn with_source_fetcher(mut self, fetcher: Box<dyn SourceFetcher>) -> Self {
        self.source_fetcher = fetcher;
        self
    }

    pub fn with_dependency_fetcher(mut self, fetcher: Box<dyn DependencyFetcher>) -> Self {
        self.dependency_fetcher = fetcher;
        self
    }

    pub fn with_build_runner(mut self, runner: Box<dyn BuildRunner>) -> Self {
        self.build_runner = runner;
        self
    }

    fn source_dir(&self) -> PathBuf {
        self.project_path.join(&self.source.directory)
    }

    fn descriptor_path(&self) -> PathBuf {
        self.source_dir().join(&self.source.descriptor)
    }

    /// Run the pipeline and return the located artifact
    pub async fn run(&self, download: bool) -> Result<PathBuf, PublishError> {
        async {
            if download {
                self.prepare().await?;
            } else {
                info!("downloads disabled, building existing checkout");
            }
            self.build().await
        }
        .instrument(info_span!("build", project = %self.project_path.display()))
        .await
    }

    async fn prepare(&self) -> Result<(), PublishError> {
        let source_dir = self.source_dir();

        // 1. Clear
        clear_directory(&source_dir)?;
        if let Some(dependency) = &self.dependency {
            clear_directory(&self.project_path.join(&dependency.directory))?;
        }

        // 2. Clone
        info!("downloading source");
        self.source_fetcher
            .clone_repository(&self.source.url, &self.source.branch, &source_dir)
            .await?;

        // 3. Descriptor metadata
        let descriptor = self.descriptor_path();
        let version = read_tag(&descriptor, VERSION_TAG)?;
        let package_kind = read_tag(&descriptor, PACKAGE_KIND_TAG)?;
        info!(version = ?version, package_kind = ?package_kind, "read descriptor");

        // 4. Dependency
        if let Some(dependency) = &self.dependency {
            let url = dependency_url(
                &dependency.url_base,
                package_kind.as_deref(),
                &dependency.archive,
            );
            info!("downloading dependency");
            self.dependency_fetcher
                .fetch(&url, &self.project_path.join(&dependency.directory))
                .await?;
        }

        Ok(())
    }

    async fn build(&self) -> Result<PathBuf, PublishError> {
        // 5. Patch descriptor
        if let Some(dependency) = &self.dependency
            && let Some(placeholder) = &dependency.path_placeholder
        {
            let descriptor = Path::new(&self.source.directory).join(&self.source.descriptor);
            let library_path = relative_library_path(&descriptor, Path::new(&dependency.directory));
            replace_placeholder(&self.descriptor_path(), placeholder, &library_path)?;
        }

        // 6. Build
        self.build_runner
            .build(&self.source_dir().join(&self.source.solution))
            .await?;

        // 7. Locate
        locate_artifact(
            &self.source_dir().join(&self.artifact.output_dir),
            &self.artifact.name_contains,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::write_standard_package;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const DESCRIPTOR: &str = "<Project>\n  <PropertyGroup>\n    <Version>1.2.3-stg</Version>\n    \
                              <PackageKind>stg</PackageKind>\n  </PropertyGroup>\n  \
                              <HintPath>$(DepLibPath)Dep.dll</HintPath>\n</Project>\n";

    type Calls = Arc<Mutex<Vec<String>>>;

    struct FakeSource {
        calls: Calls,
        descriptor: &'static str,
    }

    #[async_trait]
    impl SourceFetcher for FakeSource {
        async fn clone_repository(&self, url: &str, branch: &str, dest: &Path) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(format!("clone {} {}", url, branch));
            fs::create_dir_all(dest.join("Lib")).unwrap();
            fs::write(dest.join("Lib/Lib.csproj"), self.descriptor).unwrap();
            Ok(())
        }
    }

    struct FakeDependency {
        calls: Calls,
    }

    #[async_trait]
    impl DependencyFetcher for FakeDependency {
        async fn fetch(&self, url: &str, dest: &Path) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(format!("fetch {}", url));
            fs::create_dir_all(dest).unwrap();
            fs::write(dest.join("Dep.dll"), "MZ").unwrap();
            Ok(())
        }
    }

    struct FakeBuild {
        calls: Calls,
        produce: bool,
    }

    #[async_trait]
    impl BuildRunner for FakeBuild {
        async fn build(&self, solution: &Path) -> Result<(), PublishError> {
            let name = solution.file_name().unwrap().to_string_lossy().into_owned();
            self.calls.lock().unwrap().push(format!("build {}", name));
            if self.produce {
                let output = solution.parent().unwrap().join("Lib/bin/Release");
                fs::create_dir_all(&output).unwrap();
                write_standard_package(&output, "Lib", "1.2.3-stg");
            }
            Ok(())
        }
    }

    fn config() -> PublishConfig {
        serde_yaml::from_str(
            r#"
version: "1.0"
source:
  url: https://example.test/Lib.git
  directory: repo_lib
  solution: Lib.sln
  descriptor: Lib/Lib.csproj
dependency:
  urlBase: https://example.test/distrib/
  directory: bin_deps
  pathPlaceholder: $(DepLibPath)
artifact:
  outputDir: Lib/bin/Release
  nameContains: "Lib."
"#,
        )
        .unwrap()
    }

    fn pipeline(project: &Path, calls: &Calls, descriptor: &'static str, produce: bool) -> BuildPipeline {
        BuildPipeline::from_config(project, &config())
            .unwrap()
            .with_source_fetcher(Box::new(FakeSource {
                calls: calls.clone(),
                descriptor,
            }))
            .with_dependency_fetcher(Box::new(FakeDependency {
                calls: calls.clone(),
            }))
            .with_build_runner(Box::new(FakeBuild {
                calls: calls.clone(),
                produce,
            }))
    }

    #[tokio::test]
    async fn test_full_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Calls::default();
        let stale = temp_dir.path().join("repo_lib/stale.txt");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        let artifact = pipeline(temp_dir.path(), &calls, DESCRIPTOR, true)
            .run(true)
            .await
            .unwrap();

        assert_eq!(
            artifact,
            temp_dir.path().join("repo_lib/Lib/bin/Release/Lib.1.2.3-stg.nupkg")
        );
        assert!(!stale.exists());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "clone https://example.test/Lib.git master".to_string(),
                "fetch https://example.test/distrib/stg/latest.zip".to_string(),
                "build Lib.sln".to_string(),
            ]
        );

        let descriptor = fs::read_to_string(temp_dir.path().join("repo_lib/Lib/Lib.csproj")).unwrap();
        let expected = format!(
            "<HintPath>..{0}..{0}bin_deps{0}Dep.dll</HintPath>",
            std::path::MAIN_SEPARATOR
        );
        assert!(descriptor.contains(&expected));
    }

    #[tokio::test]
    async fn test_descriptor_without_package_kind() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Calls::default();

        pipeline(temp_dir.path(), &calls, "<Project><Version>1.0.0</Version></Project>", true)
            .run(true)
            .await
            .unwrap();

        assert!(calls
            .lock()
            .unwrap()
            .contains(&"fetch https://example.test/distrib/latest.zip".to_string()));
    }

    #[tokio::test]
    async fn test_no_download_builds_existing_checkout() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Calls::default();
        let descriptor = temp_dir.path().join("repo_lib/Lib/Lib.csproj");
        fs::create_dir_all(descriptor.parent().unwrap()).unwrap();
        fs::write(&descriptor, DESCRIPTOR).unwrap();

        let artifact = pipeline(temp_dir.path(), &calls, DESCRIPTOR, true)
            .run(false)
            .await
            .unwrap();

        assert!(artifact.exists());
        assert_eq!(*calls.lock().unwrap(), vec!["build Lib.sln".to_string()]);
        assert!(!fs::read_to_string(&descriptor).unwrap().contains("$(DepLibPath)"));
    }

    #[tokio::test]
    async fn test_missing_artifact_after_build() {
        let temp_dir = TempDir::new().unwrap();
        let calls = Calls::default();

        let result = pipeline(temp_dir.path(), &calls, DESCRIPTOR, false).run(true).await;

        assert!(matches!(result, Err(PublishError::NotFound { .. })));
    }

    #[test]
    fn test_relative_project_path_is_resolved_once() {
        let cwd = std::env::current_dir().unwrap();

        let pipeline = BuildPipeline::from_config(Path::new("proj"), &config()).unwrap();

        assert!(pipeline.project_path.is_absolute());
        assert_eq!(pipeline.source_dir(), cwd.join("proj").join("repo_lib"));
        assert_eq!(
            pipeline.descriptor_path(),
            cwd.join("proj").join("repo_lib").join("Lib/Lib.csproj")
        );
    }

    #[test]
    fn test_from_config_requires_source() {
        let temp_dir = TempDir::new().unwrap();

        let result = BuildPipeline::from_config(temp_dir.path(), &PublishConfig::default());

        assert!(matches!(result, Err(PublishError::ConfigError(_))));
    }
}
