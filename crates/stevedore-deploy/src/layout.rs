//! Where packages live in the store, in the local cache and on the node.
//!
//! Store paths are relative to the store root; the fetcher resolves them.
//! Run, shared and cache paths are absolute.

use std::path::{Path, PathBuf};

use crate::identity::{ApplicationId, ServicePackageId};

const PLATFORM_FOLDER: &str = "Fabric";

fn checksum_file(path: PathBuf) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".checksum");
    path.with_file_name(name)
}

/// Layout of the package store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreLayout;

impl StoreLayout {
    fn application_instance_folder(&self, application_id: &ApplicationId) -> PathBuf {
        PathBuf::from(&application_id.type_name)
            .join("apps")
            .join(application_id.to_string())
    }

    pub fn application_package_file(&self, application_id: &ApplicationId, version: &str) -> PathBuf {
        self.application_instance_folder(application_id)
            .join(format!("ApplicationPackage.{version}.xml"))
    }

    pub fn service_package_file(&self, package: &ServicePackageId, version: &str) -> PathBuf {
        self.application_instance_folder(&package.application_id)
            .join(format!("{}.Package.{version}.xml", package.name))
    }

    pub fn service_manifest_file(&self, type_name: &str, manifest: &str, version: &str) -> PathBuf {
        PathBuf::from(type_name).join(format!("{manifest}.Manifest.{version}.xml"))
    }

    pub fn service_manifest_checksum_file(&self, type_name: &str, manifest: &str, version: &str) -> PathBuf {
        checksum_file(self.service_manifest_file(type_name, manifest, version))
    }

    /// Code, config and data packages share one naming scheme.
    pub fn sub_package_folder(&self, type_name: &str, manifest: &str, package: &str, version: &str) -> PathBuf {
        PathBuf::from(type_name).join(format!("{manifest}.{package}.{version}"))
    }

    pub fn sub_package_checksum_file(&self, type_name: &str, manifest: &str, package: &str, version: &str) -> PathBuf {
        checksum_file(self.sub_package_folder(type_name, manifest, package, version))
    }

    pub fn platform_code_package(&self, code_version: &str) -> PathBuf {
        PathBuf::from(PLATFORM_FOLDER).join(format!("Fabric.Code.{code_version}"))
    }

    pub fn cluster_manifest_file(&self, config_version: &str) -> PathBuf {
        PathBuf::from(PLATFORM_FOLDER).join(format!("ClusterManifest.{config_version}.xml"))
    }
}

/// Layout of deployed applications on the node.
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn application_folder(&self, application_id: &ApplicationId) -> PathBuf {
        self.root.join(application_id.to_string())
    }

    pub fn application_work_folder(&self, application_id: &ApplicationId) -> PathBuf {
        self.application_folder(application_id).join("work")
    }

    pub fn application_log_folder(&self, application_id: &ApplicationId) -> PathBuf {
        self.application_folder(application_id).join("log")
    }

    pub fn application_temp_folder(&self, application_id: &ApplicationId) -> PathBuf {
        self.application_folder(application_id).join("temp")
    }

    pub fn application_package_file(&self, application_id: &ApplicationId, version: &str) -> PathBuf {
        self.application_folder(application_id)
            .join(format!("App.{version}.xml"))
    }

    pub fn service_package_file(&self, package: &ServicePackageId, version: &str) -> PathBuf {
        self.application_folder(&package.application_id)
            .join(format!("{}.Package.{version}.xml", package.name))
    }

    pub fn service_manifest_file(&self, application_id: &ApplicationId, manifest: &str, version: &str) -> PathBuf {
        self.application_folder(application_id)
            .join(format!("{manifest}.Manifest.{version}.xml"))
    }

    pub fn sub_package_folder(&self, application_id: &ApplicationId, manifest: &str, package: &str, version: &str) -> PathBuf {
        self.application_folder(application_id)
            .join(format!("{manifest}.{package}.{version}"))
    }

    pub fn platform_code_package(&self, code_version: &str) -> PathBuf {
        self.root
            .join(PLATFORM_FOLDER)
            .join(format!("Fabric.Code.{code_version}"))
    }

    pub fn cluster_manifest_file(&self, config_version: &str) -> PathBuf {
        self.root
            .join(PLATFORM_FOLDER)
            .join(format!("ClusterManifest.{config_version}.xml"))
    }
}

/// Sub-packages shared between applications of one type, linked into each run layout.
#[derive(Debug, Clone)]
pub struct SharedLayout {
    root: PathBuf,
}

impl SharedLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn sub_package_folder(&self, type_name: &str, manifest: &str, package: &str, version: &str) -> PathBuf {
        self.root
            .join(type_name)
            .join(format!("{manifest}.{package}.{version}"))
    }
}

/// The node-local image cache; mirrors store-relative paths.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    pub fn path(&self, store_relative: &Path) -> PathBuf { self.root.join(store_relative) }
}

/// Every layout a download plan needs, plus the node it runs on.
#[derive(Debug, Clone)]
pub struct Layouts {
    pub store:   StoreLayout,
    pub run:     RunLayout,
    pub shared:  SharedLayout,
    pub cache:   CacheLayout,
    pub node_id: String,
}

impl Layouts {
    /// Shared packages live under `<run_root>/_shared`.
    pub fn new(run_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>, node_id: impl Into<String>) -> Self {
        let run_root = run_root.into();
        Self {
            store:   StoreLayout,
            shared:  SharedLayout::new(run_root.join("_shared")),
            run:     RunLayout::new(run_root),
            cache:   CacheLayout::new(cache_root),
            node_id: node_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_paths() {
        let app = ApplicationId::new("Calc", 1);
        let store = StoreLayout;
        assert_eq!(
            store.application_package_file(&app, "1.0"),
            PathBuf::from("Calc/apps/Calc_App1/ApplicationPackage.1.0.xml")
        );
        assert_eq!(
            store.service_manifest_checksum_file("Calc", "Frontend", "1.0"),
            PathBuf::from("Calc/Frontend.Manifest.1.0.xml.checksum")
        );
        assert_eq!(
            store.sub_package_checksum_file("Calc", "Frontend", "Code", "1.0"),
            PathBuf::from("Calc/Frontend.Code.1.0.checksum")
        );
    }

    #[test]
    fn test_run_paths() {
        let layouts = Layouts::new("/run", "/cache", "node1");
        let app = ApplicationId::new("Calc", 1);
        assert_eq!(layouts.run.application_work_folder(&app), PathBuf::from("/run/Calc_App1/work"));
        assert_eq!(
            layouts.run.sub_package_folder(&app, "Frontend", "Code", "1.0"),
            PathBuf::from("/run/Calc_App1/Frontend.Code.1.0")
        );
        assert_eq!(
            layouts.shared.sub_package_folder("Calc", "Frontend", "Code", "1.0"),
            PathBuf::from("/run/_shared/Calc/Frontend.Code.1.0")
        );
        assert_eq!(layouts.cache.path(Path::new("Calc/x.xml")), PathBuf::from("/cache/Calc/x.xml"));
    }
}
