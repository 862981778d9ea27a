use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("failed to register health source '{property}' on '{entity}': {message}")]
    Registration {
        entity:   String,
        property: String,
        message:  String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCode {
    DownloadFailed,
    PlatformDownloadFailed,
}

impl fmt::Display for HealthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCode::DownloadFailed => write!(f, "Hosting_DownloadFailed"),
            HealthCode::PlatformDownloadFailed => write!(f, "Hosting_FabricUpgradeDownloadFailed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub code:        HealthCode,
    pub description: String,
    pub sequence:    u64,
}

/// Receives health events. Fire-and-forget: implementations must not block.
pub trait HealthSink: Send + Sync {
    fn register_source(&self, entity: &str, owner: &str, property: &str) -> Result<(), HealthError>;

    fn unregister_source(&self, entity: &str, property: &str);

    fn report_health(&self, entity: &str, property: &str, report: HealthReport);
}

/// Renders health events as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHealthSink;

impl HealthSink for TracingHealthSink {
    fn register_source(&self, entity: &str, owner: &str, property: &str) -> Result<(), HealthError> {
        tracing::debug!(entity, owner, property, "health source registered");
        Ok(())
    }

    fn unregister_source(&self, entity: &str, property: &str) {
        tracing::debug!(entity, property, "health source unregistered");
    }

    fn report_health(&self, entity: &str, property: &str, report: HealthReport) {
        tracing::warn!(
            entity,
            property,
            code = %report.code,
            sequence = report.sequence,
            "{}",
            report.description
        );
    }
}

/// A registered health source, unregistered on drop.
///
/// Anonymous owners and failed registrations yield an inert guard that
/// reports nothing.
pub struct HealthRegistration {
    sink:     Option<Arc<dyn HealthSink>>,
    entity:   String,
    property: String,
}

impl HealthRegistration {
    pub fn register(sink: Arc<dyn HealthSink>, entity: &str, owner: &str, property: &str) -> Self {
        if owner.is_empty() {
            return Self::inert();
        }
        match sink.register_source(entity, owner, property) {
            Ok(()) => Self {
                sink:     Some(sink),
                entity:   entity.to_string(),
                property: property.to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "health registration failed");
                Self::inert()
            },
        }
    }

    pub fn inert() -> Self {
        Self {
            sink:     None,
            entity:   String::new(),
            property: String::new(),
        }
    }

    pub fn is_active(&self) -> bool { self.sink.is_some() }

    pub fn report(&self, report: HealthReport) {
        if let Some(sink) = &self.sink {
            sink.report_health(&self.entity, &self.property, report);
        }
    }
}

impl Drop for HealthRegistration {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.unregister_source(&self.entity, &self.property);
        }
    }
}
