//! What one download attempt does: fetch steps, image pulls, and the folder
//! and link setup that follows a successful fetch.

use std::path::PathBuf;

use serde::Deserialize;
use stevedore_fetch::{FetchError, FetchRequest};

use crate::config::{DeploymentConfig, LOG_DIRECTORY};
use crate::identity::{ApplicationId, ServicePackageId};
use crate::layout::Layouts;

/// A service manifest named by a service package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestRef {
    pub name:     String,
    pub version:  String,
    /// Expected content digest; the store's checksum file is used when absent.
    #[serde(default)]
    pub checksum: Option<String>,
}

/// A code, config or data package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubPackage {
    pub name:     String,
    pub version:  String,
    /// Placed once per application type and linked into each application.
    #[serde(default)]
    pub shared:   bool,
    /// Container image a code package runs from.
    #[serde(default)]
    pub image:    Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct ContainerImage {
    pub name: String,
}

impl ContainerImage {
    pub fn new(name: impl Into<String>) -> Self { Self { name: name.into() } }
}

/// Parsed contents of a service manifest, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServicePackageContents {
    pub manifest:         ManifestRef,
    #[serde(default)]
    pub code:             Vec<SubPackage>,
    #[serde(default)]
    pub config:           Vec<SubPackage>,
    #[serde(default)]
    pub data:             Vec<SubPackage>,
    #[serde(default)]
    pub container_images: Vec<ContainerImage>,
}

impl ServicePackageContents {
    pub fn new(manifest_name: impl Into<String>, manifest_version: impl Into<String>) -> Self {
        Self {
            manifest:         ManifestRef {
                name:     manifest_name.into(),
                version:  manifest_version.into(),
                checksum: None,
            },
            code:             Vec::new(),
            config:           Vec::new(),
            data:             Vec::new(),
            container_images: Vec::new(),
        }
    }

    fn sub_packages(&self) -> impl Iterator<Item = &SubPackage> {
        self.code.iter().chain(&self.config).chain(&self.data)
    }

    /// Images of code packages followed by explicitly listed images, without repeats.
    pub fn images(&self) -> Vec<ContainerImage> {
        let mut images: Vec<ContainerImage> = Vec::new();
        let from_code = self.code.iter().filter_map(|c| c.image.clone()).map(ContainerImage::new);
        for image in from_code.chain(self.container_images.iter().cloned()) {
            if !images.contains(&image) {
                images.push(image);
            }
        }
        images
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationPackageRequest {
    pub application_id:   ApplicationId,
    pub version:          String,
    /// Owner used for health attribution. Empty for anonymous requests.
    pub application_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePackageRequest {
    pub application_id:   ApplicationId,
    pub package_name:     String,
    pub version:          String,
    pub application_name: String,
    pub contents:         ServicePackageContents,
}

impl ServicePackageRequest {
    pub fn package_id(&self) -> ServicePackageId {
        ServicePackageId::new(self.application_id.clone(), self.package_name.clone())
    }
}

/// Pre-deployment of a service manifest's packages into the image cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceManifestRequest {
    pub type_name:    String,
    pub type_version: String,
    pub contents:     ServicePackageContents,
}

impl ServiceManifestRequest {
    pub fn manifest_name(&self) -> &str { &self.contents.manifest.name }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformUpgradeRequest {
    pub code_version:   String,
    pub config_version: String,
}

impl PlatformUpgradeRequest {
    pub fn version(&self) -> String { format!("{}:{}", self.code_version, self.config_version) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicLink {
    pub link:   PathBuf,
    pub target: PathBuf,
}

/// Folder and link setup after a successful fetch. Applying it twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProvisionRequest {
    pub folders: Vec<PathBuf>,
    pub links:   Vec<SymbolicLink>,
}

impl ProvisionRequest {
    pub fn is_empty(&self) -> bool { self.folders.is_empty() && self.links.is_empty() }

    #[must_use]
    pub fn folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.folders.push(path.into());
        self
    }

    #[must_use]
    pub fn link(mut self, link: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        self.links.push(SymbolicLink {
            link:   link.into(),
            target: target.into(),
        });
        self
    }
}

/// The content of one download: every attempt runs all steps, then pulls images.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadPlan {
    pub steps:     Vec<FetchRequest>,
    pub images:    Vec<ContainerImage>,
    pub provision: ProvisionRequest,
}

impl DownloadPlan {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn step(mut self, request: FetchRequest) -> Self {
        self.steps.push(request);
        self
    }

    #[must_use]
    pub fn image(mut self, image: ContainerImage) -> Self {
        self.images.push(image);
        self
    }

    #[must_use]
    pub fn provision(mut self, provision: ProvisionRequest) -> Self {
        self.provision = provision;
        self
    }

    pub fn for_application_package(
        request: &ApplicationPackageRequest,
        layouts: &Layouts,
        config: &DeploymentConfig,
    ) -> Self {
        let app = &request.application_id;
        let plan = Self::new().step(FetchRequest::new(
            layouts.store.application_package_file(app, &request.version),
            layouts.run.application_package_file(app, &request.version),
        ));
        if app.is_system() {
            return plan;
        }

        let run = &layouts.run;
        let mut provision = ProvisionRequest::default()
            .folder(run.application_work_folder(app))
            .folder(run.application_temp_folder(app));

        for (name, root) in &config.logical_directories {
            let target = root.join(&layouts.node_id).join(app.to_string());
            provision = provision.folder(&target);
            provision = if name == LOG_DIRECTORY {
                provision.link(run.application_log_folder(app), target)
            } else {
                provision.link(run.application_work_folder(app).join(name), target)
            };
        }
        if !config.logical_directories.contains_key(LOG_DIRECTORY) {
            provision = provision.folder(run.application_log_folder(app));
        }

        plan.provision(provision)
    }

    pub fn for_service_package(request: &ServicePackageRequest, layouts: &Layouts) -> Self {
        let app = &request.application_id;
        let type_name = &app.type_name;
        let package = request.package_id();
        let manifest = &request.contents.manifest;

        let mut plan = Self::new()
            .step(FetchRequest::new(
                layouts.store.service_package_file(&package, &request.version),
                layouts.run.service_package_file(&package, &request.version),
            ))
            .step(with_checksum(
                FetchRequest::new(
                    layouts.store.service_manifest_file(type_name, &manifest.name, &manifest.version),
                    layouts.run.service_manifest_file(app, &manifest.name, &manifest.version),
                )
                .checksum_source(layouts.store.service_manifest_checksum_file(
                    type_name,
                    &manifest.name,
                    &manifest.version,
                )),
                manifest.checksum.as_deref(),
            ));

        let mut provision = ProvisionRequest::default();
        for sub in request.contents.sub_packages() {
            let source = layouts.store.sub_package_folder(type_name, &manifest.name, &sub.name, &sub.version);
            let run_path = layouts.run.sub_package_folder(app, &manifest.name, &sub.name, &sub.version);
            let destination = if sub.shared {
                let shared = layouts.shared.sub_package_folder(type_name, &manifest.name, &sub.name, &sub.version);
                provision = provision.link(run_path, &shared);
                shared
            } else {
                run_path
            };

            plan = plan.step(with_checksum(
                FetchRequest::new(source, destination)
                    .checksum_source(layouts.store.sub_package_checksum_file(
                        type_name,
                        &manifest.name,
                        &sub.name,
                        &sub.version,
                    ))
                    .check_archive(true),
                sub.checksum.as_deref(),
            ));
        }

        plan.images = request.contents.images();
        plan.provision(provision)
    }

    /// Fails with [`FetchError::PreDeploymentNotAllowed`] when the image cache is disabled.
    pub fn for_service_manifest(
        request: &ServiceManifestRequest,
        layouts: &Layouts,
        config: &DeploymentConfig,
    ) -> Result<Self, FetchError> {
        if !config.image_caching_enabled {
            return Err(FetchError::PreDeploymentNotAllowed);
        }

        let manifest = &request.contents.manifest;
        let type_name = &request.type_name;
        let cached = |source: PathBuf| {
            let destination = layouts.cache.path(&source);
            FetchRequest::new(source, destination).cache_only(true)
        };

        let mut plan = Self::new().step(with_checksum(
            cached(layouts.store.service_manifest_file(type_name, &manifest.name, &manifest.version)).checksum_source(
                layouts
                    .store
                    .service_manifest_checksum_file(type_name, &manifest.name, &manifest.version),
            ),
            manifest.checksum.as_deref(),
        ));

        for sub in request.contents.sub_packages() {
            plan = plan.step(with_checksum(
                cached(layouts.store.sub_package_folder(type_name, &manifest.name, &sub.name, &sub.version))
                    .checksum_source(layouts.store.sub_package_checksum_file(
                        type_name,
                        &manifest.name,
                        &sub.name,
                        &sub.version,
                    ))
                    .check_archive(true),
                sub.checksum.as_deref(),
            ));
        }

        plan.images = request.contents.images();
        Ok(plan)
    }

    pub fn for_platform_upgrade(request: &PlatformUpgradeRequest, layouts: &Layouts) -> Self {
        Self::new()
            .step(
                FetchRequest::new(
                    layouts.store.platform_code_package(&request.code_version),
                    layouts.run.platform_code_package(&request.code_version),
                )
                .check_archive(true),
            )
            .step(FetchRequest::new(
                layouts.store.cluster_manifest_file(&request.config_version),
                layouts.run.cluster_manifest_file(&request.config_version),
            ))
    }
}

fn with_checksum(request: FetchRequest, checksum: Option<&str>) -> FetchRequest {
    match checksum {
        Some(checksum) => request.expected_checksum(checksum),
        None => request,
    }
}
