pub mod copy_dir;
pub mod replace;
pub mod symlink;

pub use copy_dir::{copy_all, copy_dir_all};
pub use replace::replace_path;
pub use symlink::atomic_symlink;

use crate::Result;
use crate::error::write_err;
use std::path::Path;

/// Create `path` and all of its parents; succeeds if it already exists.
pub fn ensure_dir(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(write_err(path))
}
