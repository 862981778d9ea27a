//! Filesystem primitives for placing downloaded packages into a node's run layout.
//!
//! Everything here is synchronous; async callers are expected to run these
//! functions on a blocking pool.
//!
//! - [`primitives`] - copy, replace and link operations
//! - [`workflow`] - staging workspaces and advisory path locks
//! - [`digest`] - content digests used for checksum verification
//! - [`archive`] - `.tar.gz` package unpacking

pub mod archive;
pub mod digest;
mod error;
pub mod primitives;
pub mod workflow;

pub use archive::{archive_sibling, unpack_tar_gz};
pub use digest::content_digest;
pub use error::{Error, Result};
pub use primitives::{atomic_symlink, copy_all, copy_dir_all, ensure_dir, replace_path};
pub use workflow::{PathLock, Workspace};
