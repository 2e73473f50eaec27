//! Archive extraction into a source directory.
//!
//! Gzip tarballs, plain tarballs and zip files are unpacked in-process; other
//! compressions become a host `tar` command run by the engine. Extraction happens in a
//! temporary directory next to the destination, and the archive's top
//! directory is then renamed to the destination.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::execute::command::CommandSpec;
use crate::execute::env::EnvBuilder;
use crate::execute::types::StepError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
  TarGz,
  Tar,
  Zip,
  /// Compressions read by the host tar (`.tar.xz`, `.tar.bz2`).
  External,
}

impl Format {
  fn detect(archive: &Path) -> Self {
    let name = archive
      .file_name()
      .map(|n| n.to_string_lossy().to_lowercase())
      .unwrap_or_default();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
      Self::TarGz
    } else if name.ends_with(".tar") {
      Self::Tar
    } else if name.ends_with(".zip") {
      Self::Zip
    } else {
      Self::External
    }
  }
}

/// Replacement of `dest` by the content of `archive`.
///
/// With `top_dir` set, that directory of the archive becomes `dest`. Without
/// it, a single top-level directory is stripped; several top-level entries
/// are moved into `dest` as they are.
pub struct Extraction<'a> {
  archive: &'a Path,
  dest: &'a Path,
  top_dir: Option<&'a str>,
  staging: TempDir,
}

impl<'a> Extraction<'a> {
  /// Remove the previous extraction and create the staging directory.
  pub fn begin(archive: &'a Path, dest: &'a Path, top_dir: Option<&'a str>) -> Result<Self, StepError> {
    info!(archive = %archive.display(), dest = %dest.display(), "extracting");
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent).map_err(|e| StepError::io(parent, e))?;

    if dest.exists() {
      debug!(dest = %dest.display(), "removing previous extraction");
      fs::remove_dir_all(dest).map_err(|e| StepError::io(dest, e))?;
    }

    let staging = tempfile::Builder::new()
      .prefix(".extract")
      .tempdir_in(parent)
      .map_err(|e| StepError::io(parent, e))?;
    Ok(Self {
      archive,
      dest,
      top_dir,
      staging,
    })
  }

  fn failed(&self, message: String) -> StepError {
    StepError::Extract {
      archive: self.archive.to_path_buf(),
      message,
    }
  }

  /// Unpack into the staging directory.
  ///
  /// Formats read by the host `tar` are not unpacked here; the returned
  /// command does it and must succeed before [`Extraction::finish`].
  pub fn unpack(&self, tar: &str) -> Result<Option<CommandSpec>, StepError> {
    let archive = self.archive;
    let into = self.staging.path();
    match Format::detect(archive) {
      Format::TarGz => {
        let file = File::open(archive).map_err(|e| StepError::io(archive, e))?;
        unpack_tar(Archive::new(GzDecoder::new(BufReader::new(file))), into).map_err(|e| self.failed(e.to_string()))?;
      }
      Format::Tar => {
        let file = File::open(archive).map_err(|e| StepError::io(archive, e))?;
        unpack_tar(Archive::new(BufReader::new(file)), into).map_err(|e| self.failed(e.to_string()))?;
      }
      Format::Zip => {
        let file = File::open(archive).map_err(|e| StepError::io(archive, e))?;
        let mut zip = zip::ZipArchive::new(BufReader::new(file)).map_err(|e| self.failed(e.to_string()))?;
        zip.extract(into).map_err(|e| self.failed(e.to_string()))?;
      }
      Format::External => {
        let cwd = self.dest.parent().unwrap_or(Path::new("."));
        let spec = CommandSpec::new(tar, cwd)
          .arg("-xf")
          .arg(archive.to_string_lossy())
          .arg("-C")
          .arg(into.to_string_lossy())
          .env(EnvBuilder::inherit());
        return Ok(Some(spec));
      }
    }
    Ok(None)
  }

  /// Move the unpacked tree to the destination.
  pub fn finish(self) -> Result<(), StepError> {
    let staging = self.staging.path();
    let content = match self.top_dir {
      Some(top) => {
        let dir = staging.join(top);
        if !dir.is_dir() {
          return Err(self.failed(format!("archive has no directory '{top}'")));
        }
        dir
      }
      None => single_top_dir(staging).map_err(|e| StepError::io(staging, e))?,
    };

    let dest = self.dest;
    if content == staging {
      fs::create_dir_all(dest).map_err(|e| StepError::io(dest, e))?;
      for entry in fs::read_dir(staging).map_err(|e| StepError::io(staging, e))? {
        let entry = entry.map_err(|e| StepError::io(staging, e))?;
        let target = dest.join(entry.file_name());
        fs::rename(entry.path(), &target).map_err(|e| StepError::io(&target, e))?;
      }
    } else {
      fs::rename(&content, dest).map_err(|e| StepError::io(dest, e))?;
    }

    debug!(dest = %dest.display(), "extraction complete");
    Ok(())
  }
}

fn unpack_tar<R: io::Read>(mut archive: Archive<R>, into: &Path) -> io::Result<()> {
  archive.set_preserve_permissions(true);
  archive.unpack(into)
}

/// The only entry of `dir` when it is a directory, else `dir` itself.
fn single_top_dir(dir: &Path) -> io::Result<PathBuf> {
  let entries: Vec<PathBuf> = fs::read_dir(dir)?
    .map(|entry| entry.map(|e| e.path()))
    .collect::<io::Result<_>>()?;
  match entries.as_slice() {
    [only] if only.is_dir() => Ok(only.clone()),
    _ => Ok(dir.to_path_buf()),
  }
}
