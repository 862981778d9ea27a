//! Content digests.
//!
//! A file digests to the SHA-256 of its bytes. A directory digests to the
//! SHA-256 over every regular file beneath it, visited in sorted relative-path
//! order, each contributing its `/`-separated relative path, a NUL byte and
//! its bytes. Digests are rendered as lowercase hex.

use crate::error::read_err;
use crate::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};

pub fn content_digest(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(read_err(path))?;

    let mut hasher = Sha256::new();
    if metadata.is_dir() {
        let mut files = Vec::new();
        collect_files(path, path, &mut files)?;
        files.sort();
        for relative in files {
            let rendered = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            hasher.update(rendered.as_bytes());
            hasher.update([0u8]);
            hash_file(&path.join(&relative), &mut hasher)?;
        }
    } else {
        hash_file(path, &mut hasher)?;
    }
    Ok(hex::encode(hasher.finalize()))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(read_err(dir))? {
        let entry = entry.map_err(read_err(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(read_err(&path))?;
        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file()
            && let Ok(relative) = path.strip_prefix(root)
        {
            out.push(relative.to_path_buf());
        }
    }
    Ok(())
}

fn hash_file(path: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut file = std::fs::File::open(path).map_err(read_err(path))?;
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buffer).map_err(read_err(path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(())
}
