use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use stevedore_deploy::{
    ApplicationDownloadSpec, DownloadError, DownloadManager, PlatformUpgradeRequest, ServiceManifestRequest,
};

use crate::cli::app::{AppArg, ManifestArg, UpgradeArg};

/// How a command ended, as far as the exit code is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    /// Someone else is already downloading the same content.
    AlreadyInProgress,
    Failed,
}

impl Outcome {
    pub fn of(result: &Result<(), DownloadError>) -> Self {
        match result {
            Ok(()) => Outcome::Succeeded,
            Err(e) if e.is_benign() => {
                tracing::warn!("{e}");
                Outcome::AlreadyInProgress
            },
            Err(e) => {
                tracing::error!(error = %e, "download failed");
                Outcome::Failed
            },
        }
    }

    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Succeeded | Outcome::AlreadyInProgress => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

pub async fn application(manager: &DownloadManager, arg: &AppArg) -> Result<Outcome> {
    let spec: ApplicationDownloadSpec = read_toml(&arg.spec)?;
    tracing::info!(
        application = %spec.application_id,
        version = %spec.version,
        packages = spec.service_packages.len(),
        "downloading application"
    );

    let report = manager.download_application(&spec).await;
    for (key, status) in &report.statuses {
        println!("{key}\t{status}");
    }
    Ok(Outcome::of(&report.result))
}

pub async fn upgrade(manager: &DownloadManager, arg: &UpgradeArg) -> Outcome {
    let request = PlatformUpgradeRequest {
        code_version:   arg.code.clone(),
        config_version: arg.config.clone(),
    };
    let report = manager.download_platform_upgrade(&request).await;
    println!("{}\t{}", report.key, report.status);
    Outcome::of(&report.result)
}

pub async fn manifest(manager: &DownloadManager, arg: &ManifestArg) -> Result<Outcome> {
    let request: ServiceManifestRequest = read_toml(&arg.spec)?;
    let report = manager.download_service_manifest(&request).await;
    println!("{}\t{}", report.key, report.status);
    Ok(Outcome::of(&report.result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stevedore_fetch::FetchError;
    use tempfile::tempdir;

    #[test]
    fn test_duplicate_is_not_a_failure() {
        assert_eq!(Outcome::of(&Ok(())), Outcome::Succeeded);
        assert_eq!(
            Outcome::of(&Err(DownloadError::DeploymentInProgress)),
            Outcome::AlreadyInProgress
        );
        assert_eq!(
            Outcome::of(&Err(DownloadError::NonRetryable {
                cause: FetchError::PreDeploymentNotAllowed,
            })),
            Outcome::Failed
        );
    }

    #[test]
    fn test_read_application_spec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("calc.toml");
        std::fs::write(
            &path,
            r#"
application_id = "CalcType_App1"
application_name = "fabric:/Calc"
version = "1.0"

[[service_packages]]
name = "Frontend"
version = "1.0"

[service_packages.contents.manifest]
name = "Frontend"
version = "1.0"

[[service_packages.contents.code]]
name = "Code"
version = "1.0"
shared = true
"#,
        )
        .unwrap();

        let spec: ApplicationDownloadSpec = read_toml(&path).unwrap();
        assert_eq!(spec.application_id.to_string(), "CalcType_App1");
        assert_eq!(spec.service_packages.len(), 1);
        assert!(spec.service_packages[0].contents.code[0].shared);
    }

    #[test]
    fn test_read_missing_spec_names_path() {
        let err = read_toml::<ServiceManifestRequest>(Path::new("/nonexistent/manifest.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/manifest.toml"));
    }
}
