//! Immutable request types.

mod request;

pub use request::FetchRequest;
