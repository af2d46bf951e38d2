//! Bundle the collected outputs into a gzipped tarball

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// File name of the bundle inside `archive_dir`
pub const ARCHIVE_NAME: &str = "fleetdiag-general.tar.gz";

/// Pack `outdir` into `<archive_dir>/fleetdiag-general.tar.gz`.
///
/// Entries are stored under the name of `outdir`. Returns the bundle path.
pub fn create_archive(outdir: &Path, archive_dir: &Path) -> Result<PathBuf> {
    if !outdir.is_dir() {
        bail!("Nothing to archive: {} does not exist", outdir.display());
    }
    fs::create_dir_all(archive_dir)
        .with_context(|| format!("Could not create {}", archive_dir.display()))?;

    let path = archive_dir.join(ARCHIVE_NAME);
    let file =
        File::create(&path).with_context(|| format!("Could not create {}", path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let root = outdir
        .file_name()
        .map_or_else(|| PathBuf::from("info"), PathBuf::from);
    builder
        .append_dir_all(&root, outdir)
        .with_context(|| format!("Could not archive {}", outdir.display()))?;
    builder.into_inner()?.finish()?;

    log::info!("wrote {}", path.display());
    Ok(path)
}
