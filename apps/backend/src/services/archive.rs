//! Zip snapshots of the image directory.
//!
//! Exports never touch the database. Each archive is written into its own
//! temporary directory under a scratch directory, which is removed when the
//! returned [`ArchiveFile`] is dropped.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ApiError, Result};

/// A finished archive on disk.
#[derive(Debug)]
pub struct ArchiveFile {
    _dir: TempDir,
    path: PathBuf,
    name: String,
    entries: usize,
}

impl ArchiveFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    /// Number of files in the archive.
    pub fn entries(&self) -> usize {
        self.entries
    }
}

pub struct ArchiveExporter {
    source: PathBuf,
    scratch: PathBuf,
}

impl ArchiveExporter {
    /// Archives `source`, staging each archive under `scratch`.
    pub fn new(source: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            scratch: scratch.into(),
        }
    }

    /// Zip every file under the source directory.
    pub async fn export_zip(&self) -> Result<ArchiveFile> {
        let source = self.source.clone();
        let scratch = self.scratch.clone();
        let name = archive_name(Utc::now());

        let archive = tokio::task::spawn_blocking(move || write_archive(&source, &scratch, name))
            .await
            .map_err(|e| ApiError::storage("archive worker", e))??;

        tracing::info!(
            "Exported {} files to {}",
            archive.entries,
            archive.path.display()
        );
        Ok(archive)
    }
}

pub fn archive_name(at: DateTime<Utc>) -> String {
    format!("storage-{}.zip", at.format("%Y%m%d-%H%M%S-UTC"))
}

fn write_archive(source: &Path, scratch: &Path, name: String) -> Result<ArchiveFile> {
    let dir = tempfile::Builder::new()
        .prefix(".card-export-")
        .tempdir_in(scratch)
        .map_err(|e| ApiError::storage(format!("creating export directory in {}", scratch.display()), e))?;
    let path = dir.path().join(&name);

    let file = File::create(&path)
        .map_err(|e| ApiError::storage(format!("creating {}", path.display()), e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0;
    if source.is_dir() {
        let mut walk = Walk {
            zip: &mut zip,
            root: source,
            skip: dir.path(),
            options,
            entries: &mut entries,
        };
        walk.add_dir(source)?;
    }
    zip.finish()
        .map_err(|e| ApiError::storage(format!("finishing {}", name), e))?;

    Ok(ArchiveFile {
        _dir: dir,
        path,
        name,
        entries,
    })
}

/// Recursive directory walk feeding one archive.
struct Walk<'a> {
    zip: &'a mut ZipWriter<File>,
    root: &'a Path,
    /// The archive's own staging directory, in case it sits under `root`.
    skip: &'a Path,
    options: SimpleFileOptions,
    entries: &'a mut usize,
}

impl Walk<'_> {
    fn add_dir(&mut self, dir: &Path) -> Result<()> {
        let read_err = |e: io::Error| ApiError::storage(format!("reading {}", dir.display()), e);

        let mut children = fs::read_dir(dir)
            .map_err(read_err)?
            .collect::<io::Result<Vec<_>>>()
            .map_err(read_err)?;
        children.sort_by_key(|entry| entry.file_name());

        for child in children {
            let path = child.path();
            if path == self.skip {
                continue;
            }
            let name = entry_name(self.root, &path);
            let file_type = child.file_type().map_err(read_err)?;

            if file_type.is_dir() {
                self.zip
                    .add_directory(format!("{}/", name), self.options)
                    .map_err(|e| ApiError::storage(format!("adding {}", name), e))?;
                self.add_dir(&path)?;
            } else if file_type.is_file() {
                self.zip
                    .start_file(name.as_str(), self.options)
                    .map_err(|e| ApiError::storage(format!("adding {}", name), e))?;
                let mut input = File::open(&path)
                    .map_err(|e| ApiError::storage(format!("opening {}", path.display()), e))?;
                io::copy(&mut input, &mut *self.zip)
                    .map_err(|e| ApiError::storage(format!("compressing {}", name), e))?;
                *self.entries += 1;
            }
        }

        Ok(())
    }
}

/// Archive entry name: path relative to the root, `/`-separated.
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
