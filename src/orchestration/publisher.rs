//! Release Publisher - orchestrates one publication run
//!
//! Manages the publishing workflow:
//! - Identity extraction from the artifact manifest
//! - Duplicate check against the registry's published versions
//! - Promotion of staging packages to their release version
//! - Push (or dry-run) and state tracking

use crate::core::config::{PublishOptionsConfig, DEFAULT_STAGING_SUFFIX};
use crate::core::error::PublishError;
use crate::core::state_machine::{PublishStateMachine, RunState};
use crate::core::traits::{PackageIdentity, PackagePusher, PublishOutcome, SkipReason};
use crate::package::{extract_identity, strip_suffix};
use crate::registry::NuGetRegistry;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, Instrument};

/// Publishing options passed from CLI or config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Suffix marking a staging package, without the leading `-`
    pub staging_suffix: String,

    /// Perform every step except the push
    pub dry_run: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            dry_run: false,
        }
    }
}

impl From<&PublishOptionsConfig> for PublishOptions {
    fn from(config: &PublishOptionsConfig) -> Self {
        Self {
            staging_suffix: config.staging_suffix.clone(),
            dry_run: config.dry_run,
        }
    }
}

/// Main release publisher orchestrator
pub struct ReleasePublisher {
    registry: Arc<NuGetRegistry>,
    pusher: Arc<dyn PackagePusher>,
    options: PublishOptions,
    state_machine: PublishStateMachine,
}

impl ReleasePublisher {
    /// Create a publisher that checks and pushes against `registry`
    pub fn new(registry: NuGetRegistry, options: PublishOptions) -> Self {
        let registry = Arc::new(registry);
        Self {
            pusher: registry.clone(),
            registry,
            options,
            state_machine: PublishStateMachine::new(),
        }
    }

    /// Replace the push transport
    pub fn with_pusher(mut self, pusher: Arc<dyn PackagePusher>) -> Self {
        self.pusher = pusher;
        self
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// State of the current or last run
    pub fn state_machine(&self) -> &PublishStateMachine {
        &self.state_machine
    }

    /// Whether `identity` carries the configured staging suffix (any case)
    pub fn is_staging(&self, identity: &PackageIdentity) -> bool {
        identity
            .suffix()
            .is_some_and(|suffix| suffix.eq_ignore_ascii_case(&self.options.staging_suffix))
    }

    /// Run the workflow, mapping any error to `PublishOutcome::Failed`
    pub async fn run(&mut self, artifact: &Path) -> PublishOutcome {
        self.reset();
        let span = info_span!("publish", run_id = %self.state_machine.run_id());

        async {
            let outcome = match self.publish(artifact).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(code = e.code(), "{}", e);
                    self.state_machine.fail(&e);
                    PublishOutcome::Failed(e)
                }
            };
            info!(
                state = %self.state_machine.state(),
                elapsed_ms = self.state_machine.elapsed_millis(),
                "run finished"
            );
            debug!("state history:\n{}", self.state_machine.history());
            outcome
        }
        .instrument(span)
        .await
    }

    /// Run the workflow
    ///
    /// 1. Extract the identity
    /// 2. Skip if a version with the same base is published
    /// 3. Promote staging packages, otherwise keep the original artifact
    /// 4. Push, unless in dry-run mode
    pub async fn publish(&mut self, artifact: &Path) -> Result<PublishOutcome, PublishError> {
        self.reset();

        // 1. Identity
        let identity = extract_identity(artifact)?;
        info!(id = identity.id(), version = identity.version(), "publishing {}", identity);
        self.state_machine.transition(RunState::IdentityExtracted)?;

        // 2. Duplicate check
        let collision = self
            .registry
            .find_published_collision(identity.id(), identity.version())
            .await?;
        self.state_machine.transition(RunState::DuplicateChecked)?;

        if let Some(existing) = collision {
            info!(existing = %existing, "version already exists, will not upload");
            self.state_machine.transition(RunState::Skipped)?;
            return Ok(PublishOutcome::Skipped {
                identity,
                reason: SkipReason::Duplicate { existing },
            });
        }

        // 3. Promotion
        let (to_push, pushed_identity) = if self.is_staging(&identity) {
            let derived = strip_suffix(artifact, identity.version())?;
            self.state_machine.transition(RunState::Rewritten)?;
            (derived, identity.promoted())
        } else {
            self.state_machine.transition(RunState::NotRewritten)?;
            (artifact.to_path_buf(), identity)
        };

        if self.options.dry_run {
            info!(artifact = %to_push.display(), "dry-run: skipping push of {}", pushed_identity);
            self.state_machine.transition(RunState::Skipped)?;
            return Ok(PublishOutcome::Skipped {
                identity: pushed_identity,
                reason: SkipReason::DryRun,
            });
        }

        // 4. Push
        info!(target_registry = self.pusher.name(), artifact = %to_push.display(), "uploading");
        self.pusher.push(&to_push).await?;
        self.state_machine.transition(RunState::Pushed)?;
        info!("package uploaded successfully");

        self.state_machine.transition(RunState::Done)?;
        Ok(PublishOutcome::Published {
            identity: pushed_identity,
            artifact: to_push,
        })
    }

    fn reset(&mut self) {
        if self.state_machine.state() != RunState::Start {
            self.state_machine = PublishStateMachine::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::test_support::write_standard_package;
    use crate::registry::test_support::{index_body, registry_for};
    use async_trait::async_trait;
    use mockito::{Server, ServerGuard};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records pushed paths; optionally rejects with a status
    #[derive(Default)]
    struct RecordingPusher {
        pushed: Mutex<Vec<PathBuf>>,
        reject_with: Option<u16>,
    }

    impl RecordingPusher {
        fn pushed(&self) -> Vec<PathBuf> {
            self.pushed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PackagePusher for RecordingPusher {
        fn name(&self) -> &str {
            "recording"
        }

        async fn push(&self, artifact: &Path) -> Result<(), PublishError> {
            self.pushed.lock().unwrap().push(artifact.to_path_buf());
            match self.reject_with {
                Some(status) => Err(PublishError::PushRejected {
                    status,
                    message: "rejected".to_string(),
                }),
                None => Ok(()),
            }
        }
    }

    async fn registry_with_versions(server: &mut ServerGuard, listing: Option<&str>) -> Vec<mockito::Mock> {
        let index = server
            .mock("GET", "/v3/index.json")
            .with_status(200)
            .with_body(index_body(&server.url()))
            .create_async()
            .await;
        let versions = match listing {
            Some(body) => server
                .mock("GET", "/flat/pkg/index.json")
                .with_status(200)
                .with_body(body)
                .create_async()
                .await,
            None => server
                .mock("GET", "/flat/pkg/index.json")
                .with_status(404)
                .create_async()
                .await,
        };
        vec![index, versions]
    }

    fn publisher(server: &ServerGuard, pusher: Arc<RecordingPusher>, dry_run: bool) -> ReleasePublisher {
        let options = PublishOptions {
            dry_run,
            ..PublishOptions::default()
        };
        ReleasePublisher::new(registry_for(&server.url(), None), options).with_pusher(pusher)
    }

    #[tokio::test]
    async fn test_published_base_skips_staging_package() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, Some(r#"{ "versions": ["1.0.0"] }"#)).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.0.0-stg");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        match &outcome {
            PublishOutcome::Skipped { reason, .. } => assert_eq!(
                reason,
                &SkipReason::Duplicate {
                    existing: "1.0.0".to_string()
                }
            ),
            other => panic!("expected skip, got {:?}", other),
        }
        assert_eq!(outcome.exit_code(), 0);
        assert!(pusher.pushed().is_empty());
        assert!(!temp_dir.path().join("Pkg.1.0.0.nupkg").exists());
        assert_eq!(publisher.state_machine().state(), RunState::Skipped);
    }

    #[tokio::test]
    async fn test_new_release_version_is_pushed_unchanged() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, Some(r#"{ "versions": ["1.0.0"] }"#)).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.1.0");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        assert!(matches!(outcome, PublishOutcome::Published { .. }));
        assert_eq!(pusher.pushed(), vec![artifact]);
        assert_eq!(publisher.state_machine().state(), RunState::Done);
    }

    #[tokio::test]
    async fn test_staging_package_is_promoted_and_pushed() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, Some(r#"{ "versions": ["1.2.2"] }"#)).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-stg");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        let derived = temp_dir.path().join("Pkg.1.2.3.nupkg");
        match outcome {
            PublishOutcome::Published { identity, artifact } => {
                assert_eq!(identity.version(), "1.2.3");
                assert_eq!(artifact, derived);
            }
            other => panic!("expected publish, got {:?}", other),
        }
        assert_eq!(pusher.pushed(), vec![derived.clone()]);
        assert_eq!(extract_identity(&derived).unwrap().version(), "1.2.3");

        let history = publisher.state_machine().history();
        assert!(history.contains("DuplicateChecked → Rewritten"));
        assert!(history.ends_with("Pushed → Done"));
        assert!(publisher.state_machine().elapsed_millis() >= 0);
    }

    #[tokio::test]
    async fn test_staging_suffix_matches_any_case() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, None).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "2.0.0-STG");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        publisher.run(&artifact).await;

        assert_eq!(pusher.pushed(), vec![temp_dir.path().join("Pkg.2.0.0.nupkg")]);
    }

    #[tokio::test]
    async fn test_other_prerelease_is_pushed_as_is() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, None).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-beta");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        match outcome {
            PublishOutcome::Published { identity, .. } => assert_eq!(identity.version(), "1.2.3-beta"),
            other => panic!("expected publish, got {:?}", other),
        }
        assert_eq!(pusher.pushed(), vec![artifact]);
        assert!(!temp_dir.path().join("Pkg.1.2.3.nupkg").exists());
    }

    #[tokio::test]
    async fn test_unknown_package_proceeds_to_push() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, None).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "0.1.0");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        assert!(outcome.is_success());
        assert_eq!(pusher.pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_index_without_base_address_fails_before_push() {
        let mut server = Server::new_async().await;
        let _index = server
            .mock("GET", "/v3/index.json")
            .with_status(200)
            .with_body(r#"{ "resources": [ { "@id": "https://x.test/query", "@type": "SearchQueryService" } ] }"#)
            .create_async()
            .await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.0.0-stg");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed(PublishError::MalformedIndex { .. })
        ));
        assert_eq!(outcome.exit_code(), 1);
        assert!(pusher.pushed().is_empty());
        assert_eq!(publisher.state_machine().state(), RunState::Failed);
        assert!(publisher.state_machine().last_error().is_some());
    }

    #[tokio::test]
    async fn test_dry_run_promotes_without_pushing() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, None).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.2.3-stg");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher.clone(), true);
        let outcome = publisher.run(&artifact).await;

        match outcome {
            PublishOutcome::Skipped { identity, reason } => {
                assert_eq!(reason, SkipReason::DryRun);
                assert_eq!(identity.version(), "1.2.3");
            }
            other => panic!("expected dry-run skip, got {:?}", other),
        }
        assert!(pusher.pushed().is_empty());
        assert!(temp_dir.path().join("Pkg.1.2.3.nupkg").exists());
    }

    #[tokio::test]
    async fn test_rejected_push_fails_the_run() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, None).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.0.0");
        let pusher = Arc::new(RecordingPusher {
            reject_with: Some(403),
            ..RecordingPusher::default()
        });

        let mut publisher = publisher(&server, pusher.clone(), false);
        let outcome = publisher.run(&artifact).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed(PublishError::PushRejected { status: 403, .. })
        ));
        assert_eq!(pusher.pushed().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails() {
        let server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher, false);
        let outcome = publisher.run(&temp_dir.path().join("Pkg.1.0.0.nupkg")).await;

        assert!(matches!(
            outcome,
            PublishOutcome::Failed(PublishError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_publisher_can_run_twice() {
        let mut server = Server::new_async().await;
        let _mocks = registry_with_versions(&mut server, Some(r#"{ "versions": ["1.0.0"] }"#)).await;
        let temp_dir = TempDir::new().unwrap();
        let artifact = write_standard_package(temp_dir.path(), "Pkg", "1.0.0");
        let pusher = Arc::new(RecordingPusher::default());

        let mut publisher = publisher(&server, pusher, false);
        let first_run = publisher.state_machine().run_id();
        publisher.run(&artifact).await;
        let outcome = publisher.run(&artifact).await;

        assert!(matches!(outcome, PublishOutcome::Skipped { .. }));
        assert_ne!(publisher.state_machine().run_id(), first_run);
    }

    #[test]
    fn test_options_from_config() {
        let config = PublishOptionsConfig {
            staging_suffix: "pre".to_string(),
            dry_run: true,
        };

        let options = PublishOptions::from(&config);

        assert_eq!(options.staging_suffix, "pre");
        assert!(options.dry_run);
    }
}
