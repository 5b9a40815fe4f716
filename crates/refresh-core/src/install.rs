use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallMode {
    /// Extract only the first entry. A repository archive wraps everything
    /// in one folder; its contents land directly in the destination.
    #[default]
    SingleRootEntry,
    /// Extract every entry with its archive path.
    WholeTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    pub files_written: usize,
}

/// Extract `archive` into `dest`, overwriting existing files, then delete
/// the archive. Extraction runs on the blocking pool.
///
/// # Errors
/// Returns an archive-format error when the archive cannot be opened or
/// parsed, or when its root entry has an unsafe path in single-root-entry
/// mode, and a filesystem error when an entry cannot be written or the
/// archive cannot be removed. The archive is kept when extraction fails.
pub async fn install(
    archive: &Path,
    dest: &Path,
    mode: InstallMode,
) -> Result<InstallReport, UpdateError> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || install_blocking(&archive, &dest, mode))
        .await
        .map_err(|error| UpdateError::Filesystem {
            context: "extraction task failed",
            source: std::io::Error::other(error.to_string()),
        })?
}

fn install_blocking(
    archive_path: &Path,
    dest: &Path,
    mode: InstallMode,
) -> Result<InstallReport, UpdateError> {
    let files_written = match mode {
        InstallMode::WholeTree => extract_whole_tree(archive_path, dest)?,
        InstallMode::SingleRootEntry => extract_root_entry(archive_path, dest)?,
    };

    std::fs::remove_file(archive_path).map_err(|error| {
        UpdateError::filesystem("failed to remove installed archive", archive_path, &error)
    })?;

    info!(
        "Installed {files_written} files from {} into {}",
        archive_path.display(),
        dest.display()
    );
    Ok(InstallReport { files_written })
}

fn open_archive(archive_path: &Path) -> Result<zip::ZipArchive<std::fs::File>, UpdateError> {
    let file = std::fs::File::open(archive_path).map_err(|error| {
        UpdateError::archive(
            "failed to open archive",
            zip::result::ZipError::Io(std::io::Error::new(
                error.kind(),
                format!("{}: {error}", archive_path.display()),
            )),
        )
    })?;
    zip::ZipArchive::new(file)
        .map_err(|error| UpdateError::archive("failed to read zip archive", error))
}

fn extract_whole_tree(archive_path: &Path, dest: &Path) -> Result<usize, UpdateError> {
    let mut archive = open_archive(archive_path)?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| UpdateError::archive("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path: {}", entry.name());
            continue;
        };
        let out_path = dest.join(name);
        let is_dir = entry.is_dir();
        let mode = entry.unix_mode();
        if write_entry(&mut entry, is_dir, mode, &out_path)? {
            written += 1;
        }
    }

    Ok(written)
}

fn extract_root_entry(archive_path: &Path, dest: &Path) -> Result<usize, UpdateError> {
    let mut archive = open_archive(archive_path)?;
    if archive.is_empty() {
        return Err(UpdateError::archive(
            "archive has no entries",
            zip::result::ZipError::FileNotFound,
        ));
    }

    let (root, root_is_dir) = {
        let entry = archive
            .by_index(0)
            .map_err(|error| UpdateError::archive("failed to read zip entry", error))?;
        let Some(root) = entry.enclosed_name() else {
            return Err(unsafe_root(entry.name()));
        };
        (root.to_path_buf(), entry.is_dir())
    };

    if !root_is_dir {
        let Some(file_name) = root.file_name() else {
            return Err(unsafe_root(&root.to_string_lossy()));
        };
        let out_path = dest.join(file_name);
        let mut entry = archive
            .by_index(0)
            .map_err(|error| UpdateError::archive("failed to read zip entry", error))?;
        let mode = entry.unix_mode();
        write_entry(&mut entry, false, mode, &out_path)?;
        return Ok(1);
    }

    debug!("Extracting contents of {} into {}", root.display(), dest.display());
    let mut written = 0;
    for i in 1..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|error| UpdateError::archive("failed to read zip entry", error))?;
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path: {}", entry.name());
            continue;
        };
        let Some(relative) = strip_root(&name, &root) else {
            continue;
        };
        let out_path = dest.join(relative);
        let is_dir = entry.is_dir();
        let mode = entry.unix_mode();
        if write_entry(&mut entry, is_dir, mode, &out_path)? {
            written += 1;
        }
    }

    Ok(written)
}

fn unsafe_root(name: &str) -> UpdateError {
    UpdateError::archive(
        "archive root entry has an unsafe path",
        zip::result::ZipError::InvalidArchive(format!("root entry {name}").into()),
    )
}

/// Path of `name` below `root`, or `None` when it lies elsewhere or is the
/// root itself.
fn strip_root(name: &Path, root: &Path) -> Option<PathBuf> {
    name.strip_prefix(root)
        .ok()
        .filter(|relative| !relative.as_os_str().is_empty())
        .map(Path::to_path_buf)
}

/// Returns whether a file (as opposed to a directory) was written.
fn write_entry(
    reader: &mut impl Read,
    is_dir: bool,
    unix_mode: Option<u32>,
    out_path: &Path,
) -> Result<bool, UpdateError> {
    if is_dir {
        std::fs::create_dir_all(out_path).map_err(|error| {
            UpdateError::filesystem("failed to create extraction directory", out_path, &error)
        })?;
        return Ok(false);
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| {
            UpdateError::filesystem("failed to create extraction parent directory", parent, &error)
        })?;
    }
    let mut outfile = std::fs::File::create(out_path).map_err(|error| {
        UpdateError::filesystem("failed to create extracted file", out_path, &error)
    })?;
    std::io::copy(reader, &mut outfile).map_err(|error| {
        UpdateError::filesystem("failed to extract archive entry", out_path, &error)
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = unix_mode {
            let _ = std::fs::set_permissions(out_path, std::fs::Permissions::from_mode(mode));
        }
    }
    #[cfg(not(unix))]
    let _ = unix_mode;

    Ok(true)
}
