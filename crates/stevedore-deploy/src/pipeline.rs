//! Whole-application downloads.

use std::collections::BTreeMap;

use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use serde::Deserialize;
use stevedore_state::{OperationState, OperationStatus};

use crate::error::DownloadError;
use crate::identity::{ApplicationId, DownloadKey};
use crate::manager::DownloadManager;
use crate::plan::{ApplicationPackageRequest, ServicePackageContents, ServicePackageRequest};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServicePackageSpec {
    pub name:     String,
    pub version:  String,
    pub contents: ServicePackageContents,
}

/// An application version and the service packages it is made of.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationDownloadSpec {
    pub application_id:   ApplicationId,
    pub application_name: String,
    pub version:          String,
    #[serde(default)]
    pub service_packages: Vec<ServicePackageSpec>,
}

impl ApplicationDownloadSpec {
    pub fn application_request(&self) -> ApplicationPackageRequest {
        ApplicationPackageRequest {
            application_id:   self.application_id.clone(),
            version:          self.version.clone(),
            application_name: self.application_name.clone(),
        }
    }

    pub fn service_package_requests(&self) -> Vec<ServicePackageRequest> {
        self.service_packages
            .iter()
            .map(|package| ServicePackageRequest {
                application_id:   self.application_id.clone(),
                package_name:     package.name.clone(),
                version:          package.version.clone(),
                application_name: self.application_name.clone(),
                contents:         package.contents.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Final status of every key the pipeline knows about. Keys never issued
    /// stay `Unassigned`.
    pub statuses: BTreeMap<DownloadKey, OperationStatus>,
    /// The first failure, by completion order.
    pub result:   Result<(), DownloadError>,
}

/// Issues the application package, then all service packages at once.
///
/// A failing service package does not cancel its siblings; whatever they
/// placed on the node stays for the next attempt.
pub struct ApplicationPipeline<'a> {
    manager: &'a DownloadManager,
}

impl<'a> ApplicationPipeline<'a> {
    pub fn new(manager: &'a DownloadManager) -> Self { Self { manager } }

    pub async fn run(&self, spec: &ApplicationDownloadSpec) -> PipelineReport {
        let application = spec.application_request();
        let application_key = DownloadKey::application(&application.application_id, &application.version);
        let packages = spec.service_package_requests();

        let mut statuses = BTreeMap::new();
        statuses.insert(application_key.clone(), OperationStatus::default());
        for package in &packages {
            statuses.insert(
                DownloadKey::service_package(&package.package_id(), &package.version),
                OperationStatus::default(),
            );
        }

        mark_issued(&mut statuses, &application_key);
        let report = self.manager.download_application_package(&application).await;
        statuses.insert(report.key, report.status);
        if let Err(e) = report.result {
            return PipelineReport {
                statuses,
                result: Err(e),
            };
        }

        tracing::debug!(application = %spec.application_id, packages = packages.len(), "fanning out");
        let mut children = FuturesUnordered::new();
        for (index, package) in packages.iter().enumerate() {
            let handle = self.manager.download_service_package(package);
            mark_issued(&mut statuses, handle.key());
            children.push(handle.map(move |report| (index, report)));
        }

        let mut first_failure = None;
        while let Some(done) = children.next().await {
            // Completions that are ready together are taken in submission order.
            let mut batch = vec![done];
            while let Some(Some(ready)) = children.next().now_or_never() {
                batch.push(ready);
            }
            batch.sort_by_key(|(index, _)| *index);

            for (_, report) in batch {
                if let Err(e) = &report.result
                    && first_failure.is_none()
                {
                    first_failure = Some(e.clone());
                }
                statuses.insert(report.key, report.status);
            }
        }
        tracing::debug!(application = %spec.application_id, failed = first_failure.is_some(), "fan-in complete");

        PipelineReport {
            statuses,
            result: first_failure.map_or(Ok(()), Err),
        }
    }
}

fn mark_issued(statuses: &mut BTreeMap<DownloadKey, OperationStatus>, key: &DownloadKey) {
    if let Some(status) = statuses.get_mut(key) {
        status.advance(OperationState::InProgress);
    }
}
