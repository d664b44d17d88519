//! Hash command

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use brewlet_core::verify::Hasher;
use brewlet_schema::DigestAlgorithm;

/// Print `<algorithm>:<hex>  <file>` for each file.
pub fn hash(files: &[PathBuf], algorithm: DigestAlgorithm) -> Result<()> {
    for file in files {
        let digest = compute_file_hash(file, algorithm)
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{algorithm}:{digest}  {}", file.display());
    }
    Ok(())
}

/// Hash a file in 64 KiB chunks.
pub fn compute_file_hash(path: &Path, algorithm: DigestAlgorithm) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize_hex())
}
