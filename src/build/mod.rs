//! Build collaborators
//!
//! Producing the package before publication: clearing the run's working
//! directories, checking out the source, fetching the third-party dependency,
//! patching the project descriptor and running the build.

pub mod dependency;
pub mod descriptor;
pub mod runner;
pub mod source;
pub mod workspace;

pub use dependency::{dependency_url, HttpDependencyFetcher};
pub use descriptor::{read_tag, replace_placeholder};
pub use runner::{locate_artifact, DotnetBuildRunner};
pub use source::GitSourceFetcher;
pub use workspace::clear_directory;
