//! The per-download state machine.
//!
//! A coordinator is owned by exactly one task and walks
//! `CheckPending -> CheckSticky -> Registering -> Retrying -> Fetching`, then
//! either completes or loops through classification, deletion checks and retry
//! timers back into `Fetching`. The first pass through `Retrying` waits only the
//! jitter delay. Every suspension point is raced against the
//! key's cancellation token.

mod classify;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use rand::rngs::SmallRng;
use stevedore_fetch::{ContentFetcher, FetchError, RetryScheduler, retry_delay};
use stevedore_state::{OperationState, OperationStatus, PendingOperationMap, StartError, StickyFailureCache};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use classify::{
    Classification, DeletionVerdict, FailureVerdict, after_deletion_query, classify_failure, count_failure,
};

use crate::config::DeploymentConfig;
use crate::effects::{
    DeletedEntityQuery, HealthCode, HealthRegistration, HealthReport, HealthSink, ImagePuller, QueryError,
    ResourceProvisioner,
};
use crate::error::{DownloadError, StickyFailure};
use crate::identity::{ApplicationId, DownloadKey};
use crate::kind::ArtifactKind;
use crate::plan::DownloadPlan;

/// One submitted download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub kind:              ArtifactKind,
    pub key:               DownloadKey,
    /// Owner for health attribution and deletion checks.
    pub application_id:    Option<ApplicationId>,
    /// Empty for anonymous requests, which register no health source.
    pub application_name:  String,
    /// Service manifest name, for service package downloads.
    pub package_name:      Option<String>,
    pub health_property:   String,
    pub plan:              DownloadPlan,
    /// Overrides the configured budget for this kind.
    pub max_failure_count: Option<u32>,
    /// Overrides the configured per-attempt timeout.
    pub timeout:           Option<Duration>,
}

impl DownloadRequest {
    pub fn new(kind: ArtifactKind, key: DownloadKey, plan: DownloadPlan) -> Self {
        Self {
            kind,
            key,
            application_id: None,
            application_name: String::new(),
            package_name: None,
            health_property: String::new(),
            plan,
            max_failure_count: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn owner(mut self, application_id: ApplicationId, application_name: impl Into<String>) -> Self {
        self.application_id = Some(application_id);
        self.application_name = application_name.into();
        self
    }

    #[must_use]
    pub fn package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn health_property(mut self, property: impl Into<String>) -> Self {
        self.health_property = property.into();
        self
    }

    #[must_use]
    pub fn max_failure_count(mut self, count: u32) -> Self {
        self.max_failure_count = Some(count);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The single terminal outcome of a submitted download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub key:    DownloadKey,
    /// Final status of the key; for a duplicate, the owner's status at rejection.
    pub status: OperationStatus,
    pub result: Result<(), DownloadError>,
}

impl DownloadReport {
    pub(crate) fn canceled(key: DownloadKey) -> Self {
        Self {
            key,
            status: OperationStatus::default(),
            result: Err(DownloadError::Canceled),
        }
    }
}

/// Resolves to the [`DownloadReport`] of a submitted download.
///
/// A coordinator torn down without reporting resolves to
/// [`DownloadError::Canceled`].
#[derive(Debug)]
pub struct DownloadHandle {
    key:      DownloadKey,
    receiver: oneshot::Receiver<DownloadReport>,
}

impl DownloadHandle {
    pub(crate) fn new(key: DownloadKey, receiver: oneshot::Receiver<DownloadReport>) -> Self { Self { key, receiver } }

    /// A handle that is already resolved.
    pub(crate) fn ready(report: DownloadReport) -> Self {
        let (sender, receiver) = oneshot::channel();
        let key = report.key.clone();
        let _ = sender.send(report);
        Self { key, receiver }
    }

    pub fn key(&self) -> &DownloadKey { &self.key }
}

impl Future for DownloadHandle {
    type Output = DownloadReport;

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(report)) => Poll::Ready(report),
            Poll::Ready(Err(_)) => Poll::Ready(DownloadReport::canceled(self.key.clone())),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Owning handle stored in the pending map for each admitted download.
#[derive(Debug, Clone)]
pub(crate) struct PendingDownload {
    pub(crate) token:            CancellationToken,
    pub(crate) kind:             ArtifactKind,
    pub(crate) application_id:   Option<ApplicationId>,
    pub(crate) application_name: String,
    pub(crate) package_name:     Option<String>,
}

/// State and collaborators shared by every coordinator of one manager.
pub(crate) struct Shared {
    pub(crate) pending:     PendingOperationMap<PendingDownload>,
    pub(crate) sticky:      StickyFailureCache<StickyFailure>,
    pub(crate) config:      DeploymentConfig,
    pub(crate) fetcher:     Arc<dyn ContentFetcher>,
    pub(crate) health:      Arc<dyn HealthSink>,
    pub(crate) deleted:     Arc<dyn DeletedEntityQuery>,
    pub(crate) provisioner: Arc<dyn ResourceProvisioner>,
    pub(crate) images:      Arc<dyn ImagePuller>,
    pub(crate) scheduler:   RetryScheduler,
    pub(crate) sequence:    AtomicU64,
}

enum Step {
    CheckPending,
    CheckSticky,
    Registering,
    Fetching,
    Classifying(FetchError),
    QueryingDeletion(FetchError),
    Retrying,
    Provisioning,
    Completed(Result<(), DownloadError>),
}

/// Removes the pending entry when dropped, including on task teardown.
struct Admission {
    shared: Arc<Shared>,
    key:    DownloadKey,
}

impl Drop for Admission {
    fn drop(&mut self) { self.shared.pending.remove(self.key.as_str()); }
}

pub(crate) struct DownloadCoordinator {
    shared:            Arc<Shared>,
    request:           DownloadRequest,
    max_failure_count: u32,
    status:            OperationStatus,
    token:             CancellationToken,
    rng:               SmallRng,
    // Dropped before `admission`: health is unregistered before the key is released.
    health:            HealthRegistration,
    admission:         Option<Admission>,
}

impl DownloadCoordinator {
    pub(crate) fn new(shared: Arc<Shared>, request: DownloadRequest, rng: SmallRng) -> Self {
        let max_failure_count = request
            .max_failure_count
            .unwrap_or_else(|| shared.config.max_failure_count_for(request.kind));
        Self {
            shared,
            request,
            max_failure_count,
            status: OperationStatus::in_progress(),
            token: CancellationToken::new(),
            rng,
            health: HealthRegistration::inert(),
            admission: None,
        }
    }

    fn key(&self) -> &str { self.request.key.as_str() }

    fn attempt_timeout(&self) -> Duration {
        self.request
            .timeout
            .unwrap_or_else(|| self.shared.config.attempt_timeout())
    }

    pub(crate) async fn run(mut self) -> DownloadReport {
        let mut step = Step::CheckPending;
        loop {
            step = match step {
                Step::CheckPending => self.check_pending(),
                Step::CheckSticky => self.check_sticky(),
                Step::Registering => self.register(),
                Step::Fetching => self.fetch().await,
                Step::Classifying(error) => self.classify(error),
                Step::QueryingDeletion(error) => self.query_deletion(error).await,
                Step::Retrying => self.retry().await,
                Step::Provisioning => self.provision().await,
                Step::Completed(result) => return self.complete(result),
            };
        }
    }

    fn check_pending(&mut self) -> Step {
        let handle = PendingDownload {
            token:            self.token.clone(),
            kind:             self.request.kind,
            application_id:   self.request.application_id.clone(),
            application_name: self.request.application_name.clone(),
            package_name:     self.request.package_name.clone(),
        };

        match self.shared.pending.start(self.key(), self.status.clone(), handle) {
            Ok(()) => {
                self.admission = Some(Admission {
                    shared: Arc::clone(&self.shared),
                    key:    self.request.key.clone(),
                });
                Step::CheckSticky
            },
            Err(StartError::AlreadyExists(existing)) => {
                self.status = existing;
                Step::Completed(Err(DownloadError::DeploymentInProgress))
            },
            Err(StartError::Closed) => Step::Completed(Err(DownloadError::Canceled)),
        }
    }

    fn check_sticky(&mut self) -> Step {
        match self.shared.sticky.try_get_and_remove(self.key()) {
            Some(failure) => {
                tracing::info!(key = %self.request.key, ?failure, "short-circuited by sticky failure");
                Step::Completed(Err(failure.into()))
            },
            None => Step::Registering,
        }
    }

    fn register(&mut self) -> Step {
        if self.request.kind.capabilities().reports_health
            && let Some(application_id) = &self.request.application_id
        {
            self.health = HealthRegistration::register(
                Arc::clone(&self.shared.health),
                &application_id.to_string(),
                &self.request.application_name,
                &self.request.health_property,
            );
        }
        Step::Retrying
    }

    async fn fetch(&mut self) -> Step {
        tracing::debug!(
            key = %self.request.key,
            failures = self.status.failure_count,
            internal_failures = self.status.internal_failure_count,
            "fetching"
        );

        let token = self.token.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Step::Completed(Err(DownloadError::Canceled)),
            result = attempt(&self.shared, &self.request.plan, self.attempt_timeout()) => result,
        };

        match result {
            Ok(()) if self.request.kind.capabilities().provisions && !self.request.plan.provision.is_empty() => {
                Step::Provisioning
            },
            Ok(()) => Step::Completed(Ok(())),
            Err(error) => Step::Classifying(error),
        }
    }

    fn classify(&mut self, error: FetchError) -> Step {
        match classify_failure(&self.status, &self.shared.config, self.request.kind, &error) {
            Classification::InternalRetry => {
                self.status.internal_failure_count += 1;
                self.status.last_error = Some(error.to_string());
                self.shared.pending.update_status(self.key(), self.status.clone());
                tracing::debug!(
                    key = %self.request.key,
                    internal_failures = self.status.internal_failure_count,
                    error = %error,
                    "contention, retrying"
                );
                Step::Retrying
            },
            Classification::NonRetryable => {
                self.status.last_error = Some(error.to_string());
                if let Err(e) = self
                    .shared
                    .sticky
                    .try_add(self.key(), StickyFailure::Terminal(error.clone()))
                {
                    tracing::debug!(key = %self.request.key, error = %e, "sticky failure not recorded");
                }
                Step::Completed(Err(DownloadError::NonRetryable { cause: error }))
            },
            Classification::QueryDeletion => Step::QueryingDeletion(error),
            Classification::CountFailure => self.record_failure(error),
        }
    }

    fn record_failure(&mut self, error: FetchError) -> Step {
        let verdict = count_failure(&mut self.status, self.max_failure_count, &error);
        self.shared.pending.update_status(self.key(), self.status.clone());

        tracing::warn!(
            key = %self.request.key,
            failures = self.status.failure_count,
            max = self.max_failure_count,
            error = %error,
            "download attempt failed"
        );

        if self.status.failure_count == 1 {
            let code = match self.request.kind {
                ArtifactKind::PlatformUpgrade => HealthCode::PlatformDownloadFailed,
                _ => HealthCode::DownloadFailed,
            };
            self.health.report(HealthReport {
                code,
                description: error.to_string(),
                sequence: self.shared.sequence.fetch_add(1, Ordering::Relaxed),
            });
        }

        match verdict {
            FailureVerdict::Retry => Step::Retrying,
            FailureVerdict::Exhausted => Step::Completed(Err(DownloadError::RetryBudgetExhausted {
                failures: self.status.failure_count,
                last:     error,
            })),
        }
    }

    async fn query_deletion(&mut self, error: FetchError) -> Step {
        let Some(application_id) = self.request.application_id.clone() else {
            return self.record_failure(error);
        };

        let timeout = self.attempt_timeout();
        let token = self.token.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Step::Completed(Err(DownloadError::Canceled)),
            result = tokio::time::timeout(timeout, self.shared.deleted.is_deleted(&application_id, timeout)) => {
                result.unwrap_or(Err(QueryError::Timeout(timeout)))
            },
        };

        match after_deletion_query(&result) {
            DeletionVerdict::Deleted => {
                tracing::info!(key = %self.request.key, application = %application_id, "owner deleted");
                self.status.last_error = Some(error.to_string());
                if let Err(e) = self.shared.sticky.try_add(self.key(), StickyFailure::EntityDeleted) {
                    tracing::debug!(key = %self.request.key, error = %e, "sticky failure not recorded");
                }
                Step::Completed(Err(DownloadError::EntityDeleted))
            },
            DeletionVerdict::NotDeleted => {
                if let Err(e) = &result {
                    tracing::warn!(key = %self.request.key, error = %e, "deletion query failed");
                }
                self.record_failure(error)
            },
        }
    }

    async fn retry(&mut self) -> Step {
        let config = &self.shared.config;
        let delay = retry_delay(
            self.status.failure_count,
            config.backoff_unit(),
            config.max_retry_interval(),
            config.jitter_range(),
            &mut self.rng,
        );
        tracing::debug!(key = %self.request.key, ?delay, failures = self.status.failure_count, "fetch scheduled");

        let (fire, fired) = oneshot::channel();
        let timer = self.shared.scheduler.schedule(delay, move || async move {
            let _ = fire.send(());
        });

        let token = self.token.clone();
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                timer.cancel();
                Step::Completed(Err(DownloadError::Canceled))
            },
            _ = fired => Step::Fetching,
        }
    }

    async fn provision(&mut self) -> Step {
        let timeout = self.attempt_timeout();
        let token = self.token.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Step::Completed(Err(DownloadError::Canceled)),
            result = self.shared.provisioner.provision(&self.request.plan.provision, timeout) => result,
        };

        match result {
            Ok(()) => Step::Completed(Ok(())),
            Err(cause) => Step::Completed(Err(DownloadError::Provisioning { cause })),
        }
    }

    fn complete(mut self, result: Result<(), DownloadError>) -> DownloadReport {
        if self.admission.is_some() {
            if let Err(e) = &result
                && self.status.last_error.is_none()
            {
                self.status.last_error = Some(e.to_string());
            }
            self.status.advance(OperationState::Completed);
            self.shared.pending.complete(self.key(), self.status.clone());
            self.health = HealthRegistration::inert();
            self.admission = None;
        }

        match &result {
            Ok(()) => tracing::info!(key = %self.request.key, "download completed"),
            Err(e) if e.is_benign() => tracing::debug!(key = %self.request.key, "download already in progress"),
            Err(e) => tracing::warn!(key = %self.request.key, error = %e, "download failed"),
        }

        DownloadReport {
            key: self.request.key.clone(),
            status: self.status.clone(),
            result,
        }
    }
}

/// One pass over a plan under a single attempt budget.
async fn attempt(shared: &Shared, plan: &DownloadPlan, budget: Duration) -> Result<(), FetchError> {
    let deadline = Instant::now() + budget;

    for request in &plan.steps {
        let remaining = remaining(deadline, budget)?;
        match tokio::time::timeout(remaining, shared.fetcher.fetch(request, remaining)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout { after: budget }),
        }
    }

    if !plan.images.is_empty() {
        let remaining = remaining(deadline, budget)?;
        match tokio::time::timeout(remaining, shared.images.pull(&plan.images, remaining)).await {
            Ok(result) => result?,
            Err(_) => return Err(FetchError::Timeout { after: budget }),
        }
    }
    Ok(())
}

fn remaining(deadline: Instant, budget: Duration) -> Result<Duration, FetchError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        Err(FetchError::Timeout { after: budget })
    } else {
        Ok(remaining)
    }
}
