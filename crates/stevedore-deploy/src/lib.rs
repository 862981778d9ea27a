//! Download orchestration for a cluster node.
//!
//! A [`DownloadManager`] admits at most one download per [`DownloadKey`],
//! short-circuits keys with a recorded permanent failure, retries transient
//! failures with jittered linear backoff and, when content is missing, asks
//! whether the owning application still exists before spending the retry
//! budget. [`ApplicationPipeline`] composes whole-application downloads out
//! of individual ones.

pub mod config;
pub mod coordinator;
pub mod effects;
mod error;
pub mod identity;
pub mod kind;
pub mod layout;
pub mod manager;
pub mod pipeline;
pub mod plan;

pub use config::{ConfigError, DeploymentConfig};
pub use coordinator::{DownloadHandle, DownloadReport, DownloadRequest};
pub use error::{DownloadError, StickyFailure};
pub use identity::{ApplicationId, DownloadKey, ServicePackageId};
pub use kind::{ArtifactKind, Capabilities};
pub use layout::Layouts;
pub use manager::{DeploymentStatus, DownloadManager, DownloadManagerBuilder, PendingApplication, PendingServiceManifest};
pub use pipeline::{ApplicationDownloadSpec, ApplicationPipeline, PipelineReport, ServicePackageSpec};
pub use plan::{
    ApplicationPackageRequest, ContainerImage, DownloadPlan, PlatformUpgradeRequest, ServiceManifestRequest,
    ServicePackageContents, ServicePackageRequest,
};
