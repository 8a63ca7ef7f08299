//! Zip packaging of project directories.
//!
//! Archives are deterministic: entries are stored in file-name order with a
//! fixed modification time, and every entry path starts with `<root_name>/`.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::ArchiveError;
use crate::scaffold::ENTRY_POINT;

type Result<T> = std::result::Result<T, ArchiveError>;

/// Packs project directories into zip archives and validates them on the way back.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchiveCodec;

impl ArchiveCodec {
    /// Pack `source_dir` into a zip file at `dest`, rooted at `root_name/`.
    ///
    /// The archive is written to a temporary file next to `dest` and renamed
    /// into place, so `dest` is never left half-written. When `dest` lies inside
    /// `source_dir`, that temporary file is not packed.
    pub fn pack(source_dir: &Path, root_name: &str, dest: &Path) -> Result<()> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(io_at(&parent))?;

        let tmp = tempfile::NamedTempFile::new_in(&parent).map_err(io_at(&parent))?;
        let (file, tmp_path) = tmp.into_parts();
        let staging = std::fs::canonicalize(&tmp_path).map_err(io_at(&tmp_path))?;
        let file = write_tree(source_dir, root_name, file, Some(staging.as_path()))?;
        file.sync_all().map_err(io_at(dest))?;
        drop(file);
        tmp_path.persist(dest).map_err(|e| ArchiveError::Io {
            path: dest.to_path_buf(),
            source: e.error,
        })?;
        debug!(source = %source_dir.display(), dest = %dest.display(), "archive written");
        Ok(())
    }

    /// Pack `source_dir` into `writer`, returning the writer once finished.
    pub fn pack_to<W: Write + Seek>(source_dir: &Path, root_name: &str, writer: W) -> Result<W> {
        write_tree(source_dir, root_name, writer, None)
    }

    /// Extract `archive` into `dest_dir` and return the validated project root.
    ///
    /// The root is the single top-level directory when the archive has exactly
    /// one top-level entry and it is a directory; otherwise `dest_dir` itself.
    /// Fails when the root has no entry point or the file is not a zip.
    pub fn unpack(archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
        let file = File::open(archive).map_err(io_at(archive))?;
        let mut zip = ZipArchive::new(file)?;
        std::fs::create_dir_all(dest_dir).map_err(io_at(dest_dir))?;
        zip.extract(dest_dir)?;

        let root = Self::project_root(dest_dir)?;
        if !root.join(ENTRY_POINT).is_file() {
            return Err(ArchiveError::MissingEntryPoint { root });
        }
        debug!(archive = %archive.display(), root = %root.display(), "archive extracted");
        Ok(root)
    }

    fn project_root(dest_dir: &Path) -> Result<PathBuf> {
        let mut entries = std::fs::read_dir(dest_dir)
            .map_err(io_at(dest_dir))?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(io_at(dest_dir))?;

        if entries.len() == 1 {
            let only = entries.remove(0);
            if only.file_type().map_err(io_at(only.path()))?.is_dir() {
                return Ok(only.path());
            }
        }
        Ok(dest_dir.to_path_buf())
    }
}

/// Zip every entry under `source_dir`, leaving out the file at `skip`
/// (a canonical path).
fn write_tree<W: Write + Seek>(source_dir: &Path, root_name: &str, writer: W, skip: Option<&Path>) -> Result<W> {
    let mut zip = ZipWriter::new(writer);
    zip.add_directory(format!("{root_name}/"), entry_options(0o755))?;

    for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let name = format!("{root_name}/{}", zip_path(rel));
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(format!("{name}/"), entry_options(0o755))?;
        } else if file_type.is_file() {
            if is_skipped(entry.path(), skip) {
                debug!(path = %entry.path().display(), "not packing the archive being written");
                continue;
            }
            let mode = file_mode(entry.path());
            zip.start_file(name, entry_options(mode))?;
            let mut src = File::open(entry.path()).map_err(io_at(entry.path()))?;
            let _ = std::io::copy(&mut src, &mut zip).map_err(io_at(entry.path()))?;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular file while packing");
        }
    }

    Ok(zip.finish()?)
}

// File names are compared first so only a likely match gets canonicalized.
fn is_skipped(path: &Path, skip: Option<&Path>) -> bool {
    let Some(skip) = skip else {
        return false;
    };
    path.file_name() == skip.file_name()
        && std::fs::canonicalize(path).is_ok_and(|p| p == skip)
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(mode)
}

fn io_at(path: impl AsRef<Path>) -> impl FnOnce(std::io::Error) -> ArchiveError {
    let path = path.as_ref().to_path_buf();
    move |source| ArchiveError::Io { path, source }
}

fn zip_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).map_or(0o644, |m| m.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    0o644
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
