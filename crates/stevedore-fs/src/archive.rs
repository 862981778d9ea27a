//! Packages stored as `.tar.gz` archives next to where a folder would be.

use crate::{Error, Result};
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};

/// The archive that stands in for `source` when `source` itself is absent.
pub fn archive_sibling(source: impl AsRef<Path>) -> PathBuf {
    let source = source.as_ref();
    let mut name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tar.gz");
    source.with_file_name(name)
}

/// Unpack a gzip-compressed tarball into `dest`.
///
/// `tar` refuses entries that would escape `dest`.
pub fn unpack_tar_gz(archive: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();

    let file = std::fs::File::open(archive).map_err(crate::error::read_err(archive))?;
    std::fs::create_dir_all(dest).map_err(crate::error::write_err(dest))?;

    tar::Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .map_err(|source| Error::Archive {
            path: archive.to_path_buf(),
            source,
        })
}
