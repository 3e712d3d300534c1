//! Builds the per-family tar.gz archive and retires what it replaced.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};

use crate::classify::FamilyId;
use crate::error::RotatorError;
use crate::util;

use super::shared::Shared;

/// Bundles the existing generations `1..=max_files` of `family` into a new
/// timestamped `<family>_<stamp>.tar.gz` in the watch directory.
///
/// The archive is written to a `.partial` sibling first and renamed into
/// place only once fully flushed, so readers never observe a torn archive.
/// Returns the archive path, or `None` when no generation exists to archive.
/// On any error the partial output is removed and the originals are left
/// untouched.
pub(crate) fn archive_generations(
    shared: &Shared,
    family: FamilyId,
) -> Result<Option<PathBuf>, RotatorError> {
    let name = shared.family_name(family);

    let mut members = Vec::new();
    for idx in 1..=shared.settings.max_files {
        let path = shared.generation_path(family, idx);
        if path.exists() {
            // Member names are relative to the watch directory.
            members.push((path, format!("{}.log.{}", name, idx)));
        }
    }
    if members.is_empty() {
        info!("nothing to archive for {}", name);
        return Ok(None);
    }

    let stamp = util::archive_stamp()?;
    let archive = shared
        .settings
        .watch_dir
        .join(format!("{}_{}.tar.gz", name, stamp));
    let staging = shared
        .settings
        .watch_dir
        .join(format!("{}_{}.tar.gz.partial", name, stamp));

    if let Err(e) = build_tarball(&staging, &members) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, &archive) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }

    info!("archive created: {:?} ({} generations)", archive, members.len());
    Ok(Some(archive))
}

fn build_tarball(out: &Path, members: &[(PathBuf, String)]) -> std::io::Result<()> {
    let encoder = GzEncoder::new(BufWriter::new(File::create(out)?), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, member_name) in members {
        debug!("archiving {:?} as {}", path, member_name);
        builder.append_path_with_name(path, member_name)?;
    }
    let file = builder
        .into_inner()?
        .finish()?
        .into_inner()
        .map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Removes the archive a fresh one has just replaced.
pub(crate) fn retire_prior_archive(prior: &Path) {
    match fs::remove_file(prior) {
        Ok(()) => info!("obsolete archive {:?} removed", prior),
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("cannot remove obsolete archive {:?}: {}", prior, e),
    }
}

/// Removes the generation files `1..=max_files` that were just archived.
pub(crate) fn retire_generations(shared: &Shared, family: FamilyId) {
    for idx in 1..=shared.settings.max_files {
        let path = shared.generation_path(family, idx);
        match fs::remove_file(&path) {
            Ok(()) => debug!("deleted {:?}", path),
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("cannot delete {:?}: {}", path, e),
        }
    }
}
