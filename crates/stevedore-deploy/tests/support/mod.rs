#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stevedore_deploy::effects::{
    DeletedEntityQuery, HealthError, HealthReport, HealthSink, ProvisionError, QueryError, ResourceProvisioner,
};
use stevedore_deploy::plan::ProvisionRequest;
use stevedore_deploy::{ApplicationId, DeploymentConfig, DownloadManager, DownloadManagerBuilder, Layouts};
use stevedore_fetch::{ContentFetcher, FetchError, FetchRequest};
use tokio::sync::Semaphore;

pub fn fast_config() -> DeploymentConfig {
    DeploymentConfig::default()
        .with_backoff_unit_ms(5)
        .with_max_retry_interval_ms(20)
        .with_jitter_range_ms(0)
        .with_attempt_timeout_ms(5_000)
}

pub fn builder(config: DeploymentConfig, fetcher: Arc<dyn ContentFetcher>) -> DownloadManagerBuilder {
    DownloadManager::builder(config, Layouts::new("/run", "/cache", "node1"), fetcher)
        .provisioner(Arc::new(RecordingProvisioner::default()))
        .rng_seed(7)
}

pub fn other(message: &str) -> FetchError { FetchError::Other(message.to_string()) }

pub fn not_found() -> FetchError { FetchError::NotFound { path: "missing".into() } }

pub fn sharing() -> FetchError { FetchError::SharingViolation { path: "busy".into() } }

/// Replays scripted results, then repeats a fallback.
pub struct ScriptedFetcher {
    script:   Mutex<VecDeque<Result<(), FetchError>>>,
    fallback: Result<(), FetchError>,
    calls:    AtomicUsize,
    gate:     Option<Semaphore>,
    delay:    Duration,
}

impl ScriptedFetcher {
    pub fn always(result: Result<(), FetchError>) -> Self { Self::script(Vec::new(), result) }

    pub fn script(script: Vec<Result<(), FetchError>>, fallback: Result<(), FetchError>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
            gate: None,
            delay: Duration::ZERO,
        }
    }

    /// Every fetch blocks until [`release`](Self::release).
    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1_000);
        }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl ContentFetcher for ScriptedFetcher {
    async fn fetch(&self, _request: &FetchRequest, _timeout: Duration) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Chooses a result by the first route whose marker occurs in the source path.
pub struct RoutingFetcher {
    routes:  Vec<(String, Duration, Result<(), FetchError>)>,
    fetched: Mutex<Vec<PathBuf>>,
}

impl RoutingFetcher {
    pub fn new(routes: Vec<(&str, Duration, Result<(), FetchError>)>) -> Self {
        Self {
            routes:  routes
                .into_iter()
                .map(|(marker, delay, result)| (marker.to_string(), delay, result))
                .collect(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched(&self) -> Vec<PathBuf> { self.fetched.lock().unwrap().clone() }

    pub fn fetched_matching(&self, marker: &str) -> usize {
        self.fetched()
            .iter()
            .filter(|p| p.to_string_lossy().contains(marker))
            .count()
    }
}

#[async_trait]
impl ContentFetcher for RoutingFetcher {
    async fn fetch(&self, request: &FetchRequest, _timeout: Duration) -> Result<(), FetchError> {
        self.fetched.lock().unwrap().push(request.source.clone());
        let source = request.source.to_string_lossy().into_owned();
        match self.routes.iter().find(|(marker, _, _)| source.contains(marker.as_str())) {
            Some((_, delay, result)) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            },
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    Registered { entity: String, property: String },
    Reported { entity: String, sequence: u64 },
    Unregistered { entity: String, property: String },
}

#[derive(Default)]
pub struct RecordingHealth {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealth {
    pub fn events(&self) -> Vec<HealthEvent> { self.events.lock().unwrap().clone() }
}

impl HealthSink for RecordingHealth {
    fn register_source(&self, entity: &str, _owner: &str, property: &str) -> Result<(), HealthError> {
        self.events.lock().unwrap().push(HealthEvent::Registered {
            entity:   entity.into(),
            property: property.into(),
        });
        Ok(())
    }

    fn unregister_source(&self, entity: &str, property: &str) {
        self.events.lock().unwrap().push(HealthEvent::Unregistered {
            entity:   entity.into(),
            property: property.into(),
        });
    }

    fn report_health(&self, entity: &str, _property: &str, report: HealthReport) {
        self.events.lock().unwrap().push(HealthEvent::Reported {
            entity:   entity.into(),
            sequence: report.sequence,
        });
    }
}

pub struct ScriptedDeletionQuery {
    answer: Result<bool, QueryError>,
    calls:  AtomicUsize,
}

impl ScriptedDeletionQuery {
    pub fn new(answer: Result<bool, QueryError>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl DeletedEntityQuery for ScriptedDeletionQuery {
    async fn is_deleted(&self, _application_id: &ApplicationId, _timeout: Duration) -> Result<bool, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[derive(Default)]
pub struct RecordingProvisioner {
    requests: Mutex<Vec<ProvisionRequest>>,
    fail:     bool,
}

impl RecordingProvisioner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ProvisionRequest> { self.requests.lock().unwrap().clone() }
}

#[async_trait]
impl ResourceProvisioner for RecordingProvisioner {
    async fn provision(&self, request: &ProvisionRequest, _timeout: Duration) -> Result<(), ProvisionError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(ProvisionError::Folder {
                path:    "/run/app/work".into(),
                message: "permission denied".into(),
            });
        }
        Ok(())
    }
}

/// Poll `condition` until it holds or a few seconds have passed.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
