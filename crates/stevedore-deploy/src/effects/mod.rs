//! Collaborators the coordinator talks to.
//!
//! Each seam is a trait so callers can plug in the real cluster services;
//! the concrete types here are enough for a standalone node and for tests.

mod health;
mod image;
mod provision;
mod query;

pub use health::{HealthCode, HealthError, HealthRegistration, HealthReport, HealthSink, TracingHealthSink};
pub use image::{ImagePuller, NoopImagePuller};
pub use provision::{FsProvisioner, ProvisionError, ResourceProvisioner};
pub use query::{DeletedEntityQuery, QueryError, StaticDeletedEntities};
