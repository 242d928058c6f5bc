use std::collections::HashSet;
use std::path::Path;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

/// Delete everything under `target_dir` that the just-applied archive did
/// not produce, except entries under a preserved root. The walk is
/// depth-first and leaves-first so a directory is only considered after
/// its contents.
///
/// Pruning is best-effort: individual deletion failures are swallowed (a
/// locked stray file must not abort the update). Cancellation is polled
/// before each visit; stopping mid-walk is fine because the next run
/// re-evaluates from scratch.
pub fn prune(
    target_dir: &Path,
    expected: &HashSet<String>,
    preserved_roots: &[String],
    cancel: &CancellationToken,
) {
    prune_dir(target_dir, target_dir, expected, preserved_roots, cancel);
}

fn prune_dir(
    dir: &Path,
    root: &Path,
    expected: &HashSet<String>,
    preserved_roots: &[String],
    cancel: &CancellationToken,
) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        if cancel.is_cancelled() {
            info!("pruning cancelled, leaving remainder unvisited");
            return;
        }

        let path = entry.path();
        let is_dir = entry.file_type().is_ok_and(|kind| kind.is_dir());

        if is_dir {
            prune_dir(&path, root, expected, preserved_roots, cancel);
            if cancel.is_cancelled() {
                return;
            }
        }

        let Some(rel) = relative_slash_path(root, &path) else {
            continue;
        };
        if expected.contains(&rel) || is_preserved(&rel, preserved_roots) {
            continue;
        }

        debug!("pruning stale entry {rel}");
        let result = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(error) = result {
            debug!("ignoring failed deletion of {rel}: {error}");
        }
    }
}

fn is_preserved(rel: &str, preserved_roots: &[String]) -> bool {
    preserved_roots.iter().any(|root| {
        rel == root
            || rel
                .strip_prefix(root.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    })
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio_util::sync::CancellationToken;

    use super::{is_preserved, prune};

    fn expected(paths: &[&str]) -> HashSet<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    fn preserved(roots: &[&str]) -> Vec<String> {
        roots.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn deletes_stray_files_and_keeps_expected_ones() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join("app.exe"), b"keep").expect("file should be written");
        std::fs::write(temp.path().join("old.log"), b"stray").expect("file should be written");

        prune(
            temp.path(),
            &expected(&["app.exe"]),
            &[],
            &CancellationToken::new(),
        );

        assert!(temp.path().join("app.exe").exists());
        assert!(!temp.path().join("old.log").exists());
    }

    #[test]
    fn deletes_directories_no_longer_in_the_release() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let stale = temp.path().join("plugins/legacy");
        std::fs::create_dir_all(&stale).expect("stale tree should be created");
        std::fs::write(stale.join("old.dll"), b"stray").expect("file should be written");
        let kept = temp.path().join("assets");
        std::fs::create_dir_all(&kept).expect("kept dir should be created");
        std::fs::write(kept.join("logo.png"), b"keep").expect("file should be written");

        prune(
            temp.path(),
            &expected(&["assets", "assets/logo.png"]),
            &[],
            &CancellationToken::new(),
        );

        assert!(!temp.path().join("plugins").exists());
        assert!(kept.join("logo.png").exists());
    }

    #[test]
    fn preserved_roots_survive_even_when_absent_from_archive() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let data = temp.path().join("Data");
        std::fs::create_dir_all(&data).expect("preserved dir should be created");
        std::fs::write(data.join("save.bin"), b"precious").expect("file should be written");

        prune(
            temp.path(),
            &expected(&[]),
            &preserved(&["Data"]),
            &CancellationToken::new(),
        );

        assert!(data.join("save.bin").exists());
    }

    #[test]
    fn preserved_root_matching_requires_a_path_boundary() {
        assert!(is_preserved("Data", &preserved(&["Data"])));
        assert!(is_preserved("Data/save.bin", &preserved(&["Data"])));
        assert!(!is_preserved("DataBackup", &preserved(&["Data"])));
        assert!(!is_preserved("DataBackup/save.bin", &preserved(&["Data"])));
    }

    #[test]
    fn cancellation_leaves_remaining_entries_in_place() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join("stray-1.log"), b"stray")
            .expect("file should be written");
        std::fs::write(temp.path().join("stray-2.log"), b"stray")
            .expect("file should be written");

        let cancel = CancellationToken::new();
        cancel.cancel();
        prune(temp.path(), &expected(&[]), &[], &cancel);

        assert!(temp.path().join("stray-1.log").exists());
        assert!(temp.path().join("stray-2.log").exists());
    }
}
