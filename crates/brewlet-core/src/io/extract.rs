//! Archive extraction module
//!
//! Unpacks zip, tar, tar.gz and tar.zst artifacts entirely in memory. Nothing
//! touches the filesystem here; the installer decides what gets written.
//! Every entry path is checked before its contents are read, and a single
//! entry that would escape the extraction root rejects the whole archive.

use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};

use brewlet_schema::ArtifactFormat;
use thiserror::Error;
use zip::ZipArchive;

/// The archive cannot yield the binary safely.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// An entry path is absolute or climbs out of the root.
    #[error("Unsafe archive entry '{entry}': path escapes the extraction root")]
    UnsafeEntry {
        /// Raw entry name as stored in the archive.
        entry: String,
    },

    /// The bytes are not a readable archive of the declared format.
    #[error("Malformed {format} archive: {message}")]
    Malformed {
        /// Declared format.
        format: ArtifactFormat,
        /// Decoder error.
        message: String,
    },

    /// No entry is named after the binary.
    #[error("Binary '{bin}' not found in archive")]
    MissingBinary {
        /// Binary name searched for.
        bin: String,
    },

    /// Several entries share the binary's file name.
    #[error("Binary '{bin}' is ambiguous in archive: {}", .candidates.join(", "))]
    AmbiguousBinary {
        /// Binary name searched for.
        bin: String,
        /// Paths of the matching entries.
        candidates: Vec<String>,
    },
}

impl ExtractError {
    fn malformed(format: ArtifactFormat, err: impl std::fmt::Display) -> Self {
        Self::Malformed {
            format,
            message: err.to_string(),
        }
    }
}

/// A regular file read out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized path relative to the extraction root
    pub relative_path: PathBuf,
    /// File contents
    pub contents: Vec<u8>,
    /// Whether any execute bit is set in the archived mode
    pub is_executable: bool,
}

/// Unpack `bytes` as `format`, returning regular files in archive order.
///
/// For [`ArtifactFormat::Binary`] the artifact itself is the single entry,
/// named `fallback_name`.
pub fn extract(
    bytes: &[u8],
    format: ArtifactFormat,
    fallback_name: &str,
) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let entries = match format {
        ArtifactFormat::Zip => extract_zip(bytes)?,
        ArtifactFormat::Tar => extract_tar(Cursor::new(bytes), format)?,
        ArtifactFormat::TarGz => {
            extract_tar(flate2::read::GzDecoder::new(Cursor::new(bytes)), format)?
        }
        ArtifactFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(Cursor::new(bytes))
                .map_err(|e| ExtractError::malformed(format, e))?;
            extract_tar(decoder, format)?
        }
        ArtifactFormat::Binary => vec![ArchiveEntry {
            relative_path: safe_relative_path(fallback_name)?,
            contents: bytes.to_vec(),
            is_executable: true,
        }],
    };

    tracing::debug!(%format, entries = entries.len(), "archive extracted");
    Ok(entries)
}

/// Index of the executable named `bin` among extracted entries.
///
/// An entry whose whole relative path equals `bin` wins. Otherwise exactly
/// one entry must have `bin` as its file name (archives that wrap their
/// contents in a top-level directory).
pub fn locate(entries: &[ArchiveEntry], bin: &str) -> Result<usize, ExtractError> {
    if let Some(index) = entries
        .iter()
        .position(|e| e.relative_path == Path::new(bin))
    {
        return Ok(index);
    }

    let matches: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.relative_path.file_name().is_some_and(|n| n == bin))
        .map(|(i, _)| i)
        .collect();

    match matches.as_slice() {
        [] => Err(ExtractError::MissingBinary {
            bin: bin.to_string(),
        }),
        [single] => Ok(*single),
        many => Err(ExtractError::AmbiguousBinary {
            bin: bin.to_string(),
            candidates: many
                .iter()
                .map(|&i| entries[i].relative_path.display().to_string())
                .collect(),
        }),
    }
}

/// Validate a raw archive path and normalize it to a relative path.
///
/// Rejects absolute paths, Windows prefixes, `..` components and backslash
/// traversal; `.` components are dropped.
pub fn safe_relative_path(raw: &str) -> Result<PathBuf, ExtractError> {
    let unsafe_entry = || ExtractError::UnsafeEntry {
        entry: raw.to_string(),
    };

    if raw.contains('\0') || raw.split('\\').any(|part| part == "..") {
        return Err(unsafe_entry());
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_entry());
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(unsafe_entry());
    }
    Ok(normalized)
}

fn extract_zip(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let format = ArtifactFormat::Zip;
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::malformed(format, e))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ExtractError::malformed(format, e))?;
        let raw_name = file.name().to_string();
        let relative_path = safe_relative_path(&raw_name)?;

        if file.is_dir() {
            continue;
        }
        if file.is_symlink() {
            tracing::debug!(entry = %raw_name, "skipping link entry");
            continue;
        }

        let mut contents = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut contents)
            .map_err(|e| ExtractError::malformed(format, e))?;

        let is_executable = file.unix_mode().is_some_and(|mode| mode & 0o111 != 0);

        entries.push(ArchiveEntry {
            relative_path,
            contents,
            is_executable,
        });
    }

    Ok(entries)
}

fn extract_tar<R: Read>(reader: R, format: ArtifactFormat) -> Result<Vec<ArchiveEntry>, ExtractError> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = Vec::new();

    let iter = archive
        .entries()
        .map_err(|e| ExtractError::malformed(format, e))?;

    for entry in iter {
        let mut entry = entry.map_err(|e| ExtractError::malformed(format, e))?;
        let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let relative_path = safe_relative_path(&raw_name)?;

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            continue;
        }
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::debug!(entry = %raw_name, "skipping link entry");
            continue;
        }
        if !entry_type.is_file() {
            continue;
        }

        let is_executable = entry
            .header()
            .mode()
            .map(|m| m & 0o111 != 0)
            .unwrap_or(false);

        let mut contents = Vec::new();
        entry
            .read_to_end(&mut contents)
            .map_err(|e: io::Error| ExtractError::malformed(format, e))?;

        entries.push(ArchiveEntry {
            relative_path,
            contents,
            is_executable,
        });
    }

    Ok(entries)
}
