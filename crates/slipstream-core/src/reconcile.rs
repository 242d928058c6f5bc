use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use crate::checksum;
use crate::error::SyncError;
use crate::session::EventSink;

/// Make the target directory's file contents match the archive's,
/// skipping members whose on-disk counterpart already has the same
/// digest. Returns the expected-path set: every member's relative path
/// plus every ancestor prefix, which the pruner later uses to decide what
/// is stale.
///
/// Cancellation is polled before each member; on cancellation this
/// returns whatever set has been built so far and the session discards
/// it.
///
/// # Errors
/// `CorruptArchive` when the archive cannot be parsed, `PermissionDenied`
/// when a directory cannot be created, `LockedFile` when a conflicting
/// file survives the force-writable retry, and a per-member wrap for
/// anything else.
pub fn reconcile(
    archive_path: &Path,
    target_dir: &Path,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<HashSet<String>, SyncError> {
    let file = std::fs::File::open(archive_path)
        .map_err(|error| SyncError::io("failed to open downloaded archive", error))?;
    let mut archive = ZipArchive::new(file).map_err(SyncError::CorruptArchive)?;

    let total = archive.len();
    let mut expected = HashSet::new();

    for index in 0..total {
        if cancel.is_cancelled() {
            info!("reconciliation cancelled at member {index} of {total}");
            return Ok(expected);
        }

        reconcile_member(&mut archive, index, target_dir, &mut expected)?;

        events.progress(member_percent(index, total));
        events.status(format!("Extracting: {} / {total} files", index + 1));
    }

    debug!(
        "reconciliation complete: {total} members, {} expected paths",
        expected.len()
    );
    Ok(expected)
}

fn reconcile_member(
    archive: &mut ZipArchive<std::fs::File>,
    index: usize,
    target_dir: &Path,
    expected: &mut HashSet<String>,
) -> Result<(), SyncError> {
    let (rel, is_dir) = {
        let entry = archive.by_index(index).map_err(SyncError::CorruptArchive)?;
        let Some(rel) = entry.enclosed_name() else {
            warn!("skipping archive entry with unsafe path: {}", entry.name());
            return Ok(());
        };
        (rel, entry.is_dir())
    };

    let rel_text = slash_path(&rel);
    if rel_text.is_empty() {
        return Ok(());
    }
    record_with_ancestors(expected, &rel_text);

    let out_path = target_dir.join(&rel);

    if is_dir {
        return std::fs::create_dir_all(&out_path)
            .map_err(|error| directory_error(&rel_text, error));
    }

    if out_path.exists() {
        let local = checksum::digest_file(&out_path);
        let member = archive
            .by_index(index)
            .ok()
            .and_then(checksum::digest_reader);

        if let (Some(local), Some(member)) = (local, member)
            && local == member
        {
            debug!("unchanged, skipping {rel_text}");
            return Ok(());
        }

        remove_conflicting(&out_path, &rel_text)?;
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|error| directory_error(&rel_text, error))?;
    }

    let mut entry = archive.by_index(index).map_err(SyncError::CorruptArchive)?;
    let mut outfile = std::fs::File::create(&out_path).map_err(|error| {
        if error.kind() == ErrorKind::PermissionDenied {
            SyncError::LockedFile {
                name: rel_text.clone(),
            }
        } else {
            SyncError::member(&rel_text, error)
        }
    })?;
    std::io::copy(&mut entry, &mut outfile).map_err(|error| SyncError::member(&rel_text, error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Some(mode) = entry.unix_mode() {
            let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
        }
    }

    Ok(())
}

/// Delete a file that conflicts with a member about to be extracted. A
/// permission failure gets exactly one retry after forcing the file
/// writable; a second failure is fatal and names the member.
fn remove_conflicting(path: &Path, name: &str) -> Result<(), SyncError> {
    remove_conflicting_with(path, name, |path| std::fs::remove_file(path))
}

/// Removal seam: whether `remove_file` reports a permission error depends
/// on the platform and on the caller's privileges, so the retry logic is
/// factored over the removal primitive.
fn remove_conflicting_with<F>(path: &Path, name: &str, mut remove: F) -> Result<(), SyncError>
where
    F: FnMut(&Path) -> std::io::Result<()>,
{
    match remove(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::PermissionDenied => {
            force_writable(path);
            remove(path).map_err(|_| SyncError::LockedFile {
                name: name.to_string(),
            })
        }
        Err(error) => Err(SyncError::member(name, error)),
    }
}

fn force_writable(path: &Path) {
    if let Ok(metadata) = std::fs::metadata(path) {
        let mut permissions = metadata.permissions();
        #[allow(clippy::permissions_set_readonly_false)]
        permissions.set_readonly(false);
        let _ = std::fs::set_permissions(path, permissions);
    }
}

fn directory_error(name: &str, error: std::io::Error) -> SyncError {
    if error.kind() == ErrorKind::PermissionDenied {
        SyncError::PermissionDenied(error)
    } else {
        SyncError::member(name, error)
    }
}

/// Record a member path and every ancestor prefix, forward-slash
/// normalized.
fn record_with_ancestors(expected: &mut HashSet<String>, rel: &str) {
    let mut prefix = String::with_capacity(rel.len());
    for part in rel.split('/') {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(part);
        expected.insert(prefix.clone());
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn member_percent(index: usize, total: usize) -> u8 {
    u8::try_from((index + 1) * 100 / total).unwrap_or(100)
}
