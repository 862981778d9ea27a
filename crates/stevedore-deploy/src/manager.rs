//! Entry point for callers: one manager per node.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex, PoisonError};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use stevedore_fetch::{ContentFetcher, RetryScheduler};
use stevedore_state::{OperationStatus, PendingOperationMap, StickyFailureCache};
use tokio::sync::oneshot;

use crate::config::{ConfigError, DeploymentConfig};
use crate::coordinator::{DownloadCoordinator, DownloadHandle, DownloadReport, DownloadRequest, Shared};
use crate::effects::{
    DeletedEntityQuery, FsProvisioner, HealthSink, ImagePuller, NoopImagePuller, QueryError, ResourceProvisioner,
    StaticDeletedEntities, TracingHealthSink,
};
use crate::error::DownloadError;
use crate::identity::{
    ApplicationId, DownloadKey, SYSTEM_APPLICATION_NAME, download_health_property, platform_health_property,
};
use crate::kind::ArtifactKind;
use crate::layout::Layouts;
use crate::pipeline::{ApplicationDownloadSpec, ApplicationPipeline, PipelineReport};
use crate::plan::{
    ApplicationPackageRequest, DownloadPlan, PlatformUpgradeRequest, ServiceManifestRequest, ServicePackageRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentStatus {
    Downloading,
}

/// An application whose package is being downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApplication {
    pub application_name: String,
    pub application_type: String,
    pub status:           DeploymentStatus,
}

/// A service package being downloaded for an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingServiceManifest {
    pub service_manifest_name: String,
    pub status:                DeploymentStatus,
}

/// Configures a [`DownloadManager`]. Collaborators default to the local,
/// standalone implementations.
pub struct DownloadManagerBuilder {
    config:      DeploymentConfig,
    layouts:     Layouts,
    fetcher:     Arc<dyn ContentFetcher>,
    health:      Arc<dyn HealthSink>,
    deleted:     Arc<dyn DeletedEntityQuery>,
    provisioner: Arc<dyn ResourceProvisioner>,
    images:      Arc<dyn ImagePuller>,
    rng_seed:    Option<u64>,
}

impl DownloadManagerBuilder {
    #[must_use]
    pub fn health_sink(mut self, sink: Arc<dyn HealthSink>) -> Self {
        self.health = sink;
        self
    }

    #[must_use]
    pub fn deleted_entities(mut self, query: Arc<dyn DeletedEntityQuery>) -> Self {
        self.deleted = query;
        self
    }

    #[must_use]
    pub fn provisioner(mut self, provisioner: Arc<dyn ResourceProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    #[must_use]
    pub fn image_puller(mut self, images: Arc<dyn ImagePuller>) -> Self {
        self.images = images;
        self
    }

    /// Derive every coordinator's jitter from one seed.
    #[must_use]
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<DownloadManager, ConfigError> {
        self.config.validate()?;
        let seeds = match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };

        Ok(DownloadManager {
            shared: Arc::new(Shared {
                pending:     PendingOperationMap::new(),
                sticky:      StickyFailureCache::new(),
                config:      self.config,
                fetcher:     self.fetcher,
                health:      self.health,
                deleted:     self.deleted,
                provisioner: self.provisioner,
                images:      self.images,
                scheduler:   RetryScheduler::new(),
                sequence:    AtomicU64::new(1),
            }),
            layouts: self.layouts,
            seeds:   Mutex::new(seeds),
        })
    }
}

/// Admits downloads, runs one coordinator task per admitted key and answers
/// "what is downloading" queries.
///
/// Download operations spawn onto the current tokio runtime.
pub struct DownloadManager {
    shared:  Arc<Shared>,
    layouts: Layouts,
    seeds:   Mutex<SmallRng>,
}

impl DownloadManager {
    pub fn builder(config: DeploymentConfig, layouts: Layouts, fetcher: Arc<dyn ContentFetcher>) -> DownloadManagerBuilder {
        DownloadManagerBuilder {
            config,
            layouts,
            fetcher,
            health: Arc::new(TracingHealthSink),
            deleted: Arc::new(StaticDeletedEntities::default()),
            provisioner: Arc::new(FsProvisioner),
            images: Arc::new(NoopImagePuller),
            rng_seed: None,
        }
    }

    pub fn config(&self) -> &DeploymentConfig { &self.shared.config }

    pub fn layouts(&self) -> &Layouts { &self.layouts }

    fn next_rng(&self) -> SmallRng {
        let seed = self
            .seeds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random();
        SmallRng::seed_from_u64(seed)
    }

    /// Start a download described by hand.
    pub fn submit(&self, request: DownloadRequest) -> DownloadHandle {
        let key = request.key.clone();
        let (sender, receiver) = oneshot::channel();
        let coordinator = DownloadCoordinator::new(Arc::clone(&self.shared), request, self.next_rng());
        tokio::spawn(async move {
            let _ = sender.send(coordinator.run().await);
        });
        DownloadHandle::new(key, receiver)
    }

    pub fn download_application_package(&self, request: &ApplicationPackageRequest) -> DownloadHandle {
        let plan = DownloadPlan::for_application_package(request, &self.layouts, &self.shared.config);
        self.submit(
            DownloadRequest::new(
                ArtifactKind::ApplicationPackage,
                DownloadKey::application(&request.application_id, &request.version),
                plan,
            )
            .owner(request.application_id.clone(), &request.application_name)
            .health_property(download_health_property(&request.version)),
        )
    }

    pub fn download_service_package(&self, request: &ServicePackageRequest) -> DownloadHandle {
        let plan = DownloadPlan::for_service_package(request, &self.layouts);
        self.submit(
            DownloadRequest::new(
                ArtifactKind::ServicePackage,
                DownloadKey::service_package(&request.package_id(), &request.version),
                plan,
            )
            .owner(request.application_id.clone(), &request.application_name)
            .package_name(&request.package_name)
            .health_property(download_health_property(&request.version)),
        )
    }

    /// Pre-deploy a service manifest's packages into the image cache.
    pub fn download_service_manifest(&self, request: &ServiceManifestRequest) -> DownloadHandle {
        let key = DownloadKey::service_manifest(&request.type_name, &request.type_version, request.manifest_name());
        match DownloadPlan::for_service_manifest(request, &self.layouts, &self.shared.config) {
            Ok(plan) => self.submit(DownloadRequest::new(ArtifactKind::ServiceManifest, key, plan)),
            Err(cause) => {
                tracing::warn!(key = %key, error = %cause, "pre-deployment rejected");
                DownloadHandle::ready(DownloadReport {
                    key,
                    status: OperationStatus::default(),
                    result: Err(DownloadError::NonRetryable { cause }),
                })
            },
        }
    }

    pub fn download_platform_upgrade(&self, request: &PlatformUpgradeRequest) -> DownloadHandle {
        let version = request.version();
        self.submit(
            DownloadRequest::new(
                ArtifactKind::PlatformUpgrade,
                DownloadKey::platform(&version),
                DownloadPlan::for_platform_upgrade(request, &self.layouts),
            )
            .owner(ApplicationId::system(), SYSTEM_APPLICATION_NAME)
            .health_property(platform_health_property(&version)),
        )
    }

    /// Application package first, then every service package concurrently.
    pub async fn download_application(&self, spec: &ApplicationDownloadSpec) -> PipelineReport {
        ApplicationPipeline::new(self).run(spec).await
    }

    /// Stop admitting downloads and cancel every one in flight.
    ///
    /// Sticky failures are discarded. Coordinators finish with
    /// [`DownloadError::Canceled`] and release their keys on their own.
    pub fn close(&self) {
        let discarded = self.shared.sticky.close();
        let handles = self.shared.pending.close();
        tracing::info!(in_flight = handles.len(), sticky_discarded = discarded, "download manager closing");
        for handle in handles {
            handle.token.cancel();
        }
    }

    pub fn is_closed(&self) -> bool { self.shared.pending.is_closed() }

    pub fn pending_status(&self, key: &DownloadKey) -> Option<OperationStatus> {
        self.shared.pending.get_status(key.as_str())
    }

    pub fn pending_count(&self) -> usize { self.shared.pending.len() }

    pub fn has_sticky_failure(&self, key: &DownloadKey) -> bool { self.shared.sticky.contains(key.as_str()) }

    /// Applications whose package is downloading, ordered by name.
    ///
    /// Names at or before `continuation` are skipped. A non-empty `filter`
    /// returns at most the one matching application.
    pub fn pending_applications(&self, filter: &str, continuation: &str) -> Vec<PendingApplication> {
        let mut applications: Vec<PendingApplication> = self
            .shared
            .pending
            .handles()
            .into_iter()
            .filter(|(_, handle)| handle.kind == ArtifactKind::ApplicationPackage)
            .filter_map(|(_, handle)| {
                let application_id = handle.application_id?;
                Some(PendingApplication {
                    application_name: handle.application_name,
                    application_type: application_id.type_name,
                    status:           DeploymentStatus::Downloading,
                })
            })
            .filter(|app| continuation.is_empty() || app.application_name.as_str() > continuation)
            .collect();
        applications.sort_by(|a, b| a.application_name.cmp(&b.application_name));

        if !filter.is_empty() {
            applications.retain(|app| app.application_name == filter);
            applications.truncate(1);
        }
        applications
    }

    /// Service packages downloading for `application_name`. A non-empty
    /// `manifest_filter` matches case-insensitively and returns at most one.
    pub fn pending_service_packages(
        &self,
        application_name: &str,
        manifest_filter: &str,
    ) -> Result<Vec<PendingServiceManifest>, QueryError> {
        if application_name.is_empty() {
            return Err(QueryError::InvalidArgument("application name must not be empty".into()));
        }

        let mut manifests: Vec<PendingServiceManifest> = self
            .shared
            .pending
            .handles()
            .into_iter()
            .filter(|(_, handle)| {
                handle.kind == ArtifactKind::ServicePackage && handle.application_name == application_name
            })
            .filter_map(|(_, handle)| handle.package_name)
            .map(|service_manifest_name| PendingServiceManifest {
                service_manifest_name,
                status: DeploymentStatus::Downloading,
            })
            .collect();

        if !manifest_filter.is_empty() {
            manifests.retain(|m| m.service_manifest_name.eq_ignore_ascii_case(manifest_filter));
            manifests.truncate(1);
        }
        Ok(manifests)
    }
}
