pub mod app;
pub mod download;
pub mod layout;
