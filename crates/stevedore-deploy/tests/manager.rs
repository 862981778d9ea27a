mod support;

use std::sync::Arc;

use stevedore_deploy::effects::QueryError;
use stevedore_deploy::plan::SubPackage;
use stevedore_deploy::{
    ApplicationId, ApplicationPackageRequest, DeploymentStatus, DownloadError, DownloadKey, PendingApplication,
    ServiceManifestRequest, ServicePackageContents, ServicePackageRequest,
};
use stevedore_fetch::FetchError;
use support::*;

fn application(type_name: &str, number: u64, name: &str) -> ApplicationPackageRequest {
    ApplicationPackageRequest {
        application_id:   ApplicationId::new(type_name, number),
        version:          "1.0".into(),
        application_name: name.into(),
    }
}

fn service_package(application: &ApplicationPackageRequest, name: &str) -> ServicePackageRequest {
    ServicePackageRequest {
        application_id:   application.application_id.clone(),
        package_name:     name.into(),
        version:          "1.0".into(),
        application_name: application.application_name.clone(),
        contents:         ServicePackageContents::new(name, "1.0"),
    }
}

fn manifest_request() -> ServiceManifestRequest {
    let mut contents = ServicePackageContents::new("Frontend", "1.0");
    contents.code.push(SubPackage {
        name:     "Code".into(),
        version:  "1.0".into(),
        shared:   false,
        image:    None,
        checksum: None,
    });
    ServiceManifestRequest {
        type_name: "CalcType".into(),
        type_version: "1.0".into(),
        contents,
    }
}

#[tokio::test]
async fn test_pending_queries_reflect_in_flight_downloads() {
    let fetcher = Arc::new(ScriptedFetcher::always(Ok(())).gated());
    let manager = builder(fast_config(), fetcher.clone()).build().unwrap();

    let beta = application("BetaType", 2, "fabric:/Beta");
    let alpha = application("AlphaType", 1, "fabric:/Alpha");
    let handles = vec![
        manager.download_application_package(&beta),
        manager.download_application_package(&alpha),
        manager.download_service_package(&service_package(&alpha, "Frontend")),
        manager.download_service_package(&service_package(&alpha, "Backend")),
    ];
    eventually(|| manager.pending_count() == 4).await;

    assert_eq!(
        manager.pending_applications("", ""),
        vec![
            PendingApplication {
                application_name: "fabric:/Alpha".into(),
                application_type: "AlphaType".into(),
                status:           DeploymentStatus::Downloading,
            },
            PendingApplication {
                application_name: "fabric:/Beta".into(),
                application_type: "BetaType".into(),
                status:           DeploymentStatus::Downloading,
            },
        ]
    );

    let after_alpha = manager.pending_applications("", "fabric:/Alpha");
    assert_eq!(after_alpha.len(), 1);
    assert_eq!(after_alpha[0].application_name, "fabric:/Beta");

    let filtered = manager.pending_applications("fabric:/Alpha", "");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].application_type, "AlphaType");
    assert!(manager.pending_applications("fabric:/Gamma", "").is_empty());

    let mut packages: Vec<String> = manager
        .pending_service_packages("fabric:/Alpha", "")
        .unwrap()
        .into_iter()
        .map(|p| p.service_manifest_name)
        .collect();
    packages.sort();
    assert_eq!(packages, vec!["Backend", "Frontend"]);

    let frontend = manager.pending_service_packages("fabric:/Alpha", "FRONTEND").unwrap();
    assert_eq!(frontend.len(), 1);
    assert_eq!(frontend[0].service_manifest_name, "Frontend");
    assert!(manager.pending_service_packages("fabric:/Beta", "").unwrap().is_empty());
    assert!(matches!(
        manager.pending_service_packages("", ""),
        Err(QueryError::InvalidArgument(_))
    ));

    fetcher.release();
    for handle in handles {
        assert_eq!(handle.await.result, Ok(()));
    }
    assert!(manager.pending_applications("", "").is_empty());
}

#[tokio::test]
async fn test_typed_requests_use_derived_keys() {
    let fetcher = Arc::new(ScriptedFetcher::always(Ok(())));
    let manager = builder(fast_config(), fetcher.clone()).build().unwrap();
    let app = application("CalcType", 3, "fabric:/Calc");

    let report = manager.download_application_package(&app).await;
    assert_eq!(report.key, DownloadKey::from_raw("Download:CalcType_App3:1.0"));

    let report = manager
        .download_service_package(&service_package(&app, "Frontend"))
        .await;
    assert_eq!(report.key, DownloadKey::from_raw("Download:CalcType_App3:Frontend:1.0"));
    assert_eq!(report.result, Ok(()));
}

#[tokio::test]
async fn test_service_manifest_rejected_when_caching_disabled() {
    let fetcher = Arc::new(ScriptedFetcher::always(Ok(())));
    let manager = builder(fast_config().with_image_caching_enabled(false), fetcher.clone())
        .build()
        .unwrap();

    let report = manager.download_service_manifest(&manifest_request()).await;
    assert_eq!(
        report.result,
        Err(DownloadError::NonRetryable {
            cause: FetchError::PreDeploymentNotAllowed,
        })
    );
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_service_manifest_missing_content_is_terminal_and_sticky() {
    let fetcher = Arc::new(ScriptedFetcher::always(Err(not_found())));
    let query = Arc::new(ScriptedDeletionQuery::new(Ok(true)));
    let manager = builder(fast_config(), fetcher.clone())
        .deleted_entities(query.clone())
        .build()
        .unwrap();

    let first = manager.download_service_manifest(&manifest_request()).await;
    assert_eq!(first.result, Err(DownloadError::NonRetryable { cause: not_found() }));
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(query.calls(), 0);
    assert!(manager.has_sticky_failure(&first.key));

    let second = manager.download_service_manifest(&manifest_request()).await;
    assert_eq!(second.result, Err(DownloadError::StickyTerminal { cause: not_found() }));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_service_manifest_transient_failure_is_retried() {
    let fetcher = Arc::new(ScriptedFetcher::script(vec![Err(other("busy"))], Ok(())));
    let manager = builder(fast_config(), fetcher.clone()).build().unwrap();

    let report = manager.download_service_manifest(&manifest_request()).await;
    assert_eq!(report.result, Ok(()));
    assert_eq!(report.status.failure_count, 1);
    assert_eq!(fetcher.calls(), 2);
}

#[test]
fn test_invalid_config_rejected_at_build() {
    let fetcher = Arc::new(ScriptedFetcher::always(Ok(())));
    let result = builder(fast_config().with_max_failure_count(0), fetcher).build();
    assert!(result.is_err());
}
