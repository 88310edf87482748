//! Scoped placeholder substitution in configuration artifacts
//!
//! [`with_mutation`] backs an artifact up, substitutes its placeholders, runs an
//! action against the mutated file and puts the original bytes back afterwards.
//! Restoration also runs from [`TemplateGuard`]'s `Drop`, which covers early
//! returns, `?` propagation, operator aborts and panics inside the action.
//! Drop never runs when the process is interrupted, so every open guard is also
//! listed in a process-wide registry that [`restore_pending`] drains from a
//! signal handler.

use crate::error::Result;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// `(artifact, backup)` for every guard that has not been restored yet
static PENDING: Mutex<Vec<(PathBuf, PathBuf)>> = Mutex::new(Vec::new());

fn pending() -> std::sync::MutexGuard<'static, Vec<(PathBuf, PathBuf)>> {
    PENDING.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Put every mutated artifact back and delete its backup.
///
/// For the interrupt path, where `Drop` will not run. Guards drained here turn
/// their own restore into a no-op. Returns the artifacts restored.
pub fn restore_pending() -> Vec<PathBuf> {
    let entries: Vec<_> = pending().drain(..).collect();
    let mut restored = Vec::with_capacity(entries.len());
    for (path, backup) in entries {
        match fs::copy(&backup, &path) {
            Ok(_) => restored.push(path),
            Err(e) => tracing::error!(
                "Failed to restore {} from {}: {}",
                path.display(),
                backup.display(),
                e
            ),
        }
        if let Err(e) = fs::remove_file(&backup) {
            tracing::debug!("Could not remove {}: {}", backup.display(), e);
        }
    }
    restored
}

/// Holds a backup of an artifact and restores it when released
#[derive(Debug)]
pub struct TemplateGuard {
    path: PathBuf,
    backup: NamedTempFile,
    restored: bool,
}

impl TemplateGuard {
    /// Copy `path` to a backup next to it
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let backup = tempfile::Builder::new()
            .prefix(".provflow-")
            .suffix(".bak")
            .tempfile_in(dir)?;
        fs::copy(&path, backup.path())?;
        pending().push((path.clone(), backup.path().to_path_buf()));

        tracing::debug!("Backed up {} to {}", path.display(), backup.path().display());

        Ok(Self {
            path,
            backup,
            restored: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace every occurrence of each placeholder, in the order given
    pub fn apply(&self, substitutions: &[(&str, &str)]) -> Result<()> {
        let mut content = fs::read_to_string(&self.path)?;
        for (placeholder, value) in substitutions {
            if !content.contains(placeholder) {
                tracing::warn!(
                    "Placeholder {} not found in {}",
                    placeholder,
                    self.path.display()
                );
            }
            content = content.replace(placeholder, value);
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Put the original content back and drop the backup
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        if !self.unregister() {
            return Ok(());
        }
        fs::copy(self.backup.path(), &self.path)?;
        tracing::debug!("Restored {}", self.path.display());
        Ok(())
    }

    /// Remove this guard from the registry; false when it was already drained
    fn unregister(&self) -> bool {
        let mut pending = pending();
        match pending
            .iter()
            .position(|(_, backup)| backup.as_path() == self.backup.path())
        {
            Some(i) => {
                pending.remove(i);
                true
            }
            None => false,
        }
    }
}

impl Drop for TemplateGuard {
    fn drop(&mut self) {
        if self.restored || !self.unregister() {
            return;
        }
        if let Err(e) = fs::copy(self.backup.path(), &self.path) {
            tracing::error!(
                "Failed to restore {} from {}: {}",
                self.path.display(),
                self.backup.path().display(),
                e
            );
        } else {
            tracing::debug!("Restored {} on early exit", self.path.display());
        }
    }
}

/// Run `action` while `path` holds the substituted content.
///
/// The artifact is restored on every way out. When both the action and the
/// restore fail, the action's error is returned and the restore error is logged.
pub async fn with_mutation<F, Fut, T, E>(
    path: impl AsRef<Path>,
    substitutions: &[(&str, &str)],
    action: F,
) -> std::result::Result<T, E>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: From<crate::error::ProvisionError>,
{
    let guard = TemplateGuard::acquire(path)?;
    guard.apply(substitutions)?;

    let result = action(guard.path().to_path_buf()).await;

    match (result, guard.restore()) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            tracing::error!("Failed to restore template: {}", restore_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;

    const POLICY: &str = "bindings:\n\
        - members:\n  - serviceAccount:@SERVICE_ACCOUNT@\n  role: roles/container.admin\n\
        - members: @OWNERS@\n  role: roles/owner\n";

    fn write_policy(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("iam-policy.yaml");
        fs::write(&path, POLICY).unwrap();
        path
    }

    #[tokio::test]
    async fn test_restored_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_policy(&dir);

        let seen = with_mutation(
            &path,
            &[
                ("@SERVICE_ACCOUNT@", "deployer@base-dev.iam.gserviceaccount.com"),
                ("@OWNERS@", "[\"user:a@example.com\"]"),
            ],
            |mutated| async move { Ok::<_, ProvisionError>(fs::read_to_string(mutated)?) },
        )
        .await
        .unwrap();

        assert!(seen.contains("serviceAccount:deployer@base-dev.iam.gserviceaccount.com"));
        assert!(seen.contains("members: [\"user:a@example.com\"]"));
        assert!(!seen.contains("@SERVICE_ACCOUNT@"));
        assert_eq!(fs::read_to_string(&path).unwrap(), POLICY);
    }

    #[tokio::test]
    async fn test_restored_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_policy(&dir);

        let result: std::result::Result<(), ProvisionError> =
            with_mutation(&path, &[("@OWNERS@", "[]")], |_| async {
                Err(ProvisionError::UserAbort {
                    step: 5,
                    reason: "declined".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(ProvisionError::UserAbort { step: 5, .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), POLICY);
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_policy(&dir);

        {
            let guard = TemplateGuard::acquire(&path).unwrap();
            guard.apply(&[("@OWNERS@", "[]")]).unwrap();
            assert!(fs::read_to_string(&path).unwrap().contains("members: []"));
        }

        assert_eq!(fs::read_to_string(&path).unwrap(), POLICY);
    }

    #[test]
    fn test_guard_restores_on_panic() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_policy(&dir);
        let inner = path.clone();

        let outcome = std::panic::catch_unwind(move || {
            let guard = TemplateGuard::acquire(&inner).unwrap();
            guard.apply(&[("@OWNERS@", "[]")]).unwrap();
            panic!("action blew up");
        });

        assert!(outcome.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), POLICY);
    }

    #[test]
    fn test_substitutions_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workload.yaml");
        fs::write(&path, "image: @IMAGE@\n").unwrap();

        let guard = TemplateGuard::acquire(&path).unwrap();
        guard
            .apply(&[
                ("@IMAGE@", "gcr.io/@PROJECT_ID@/app:latest"),
                ("@PROJECT_ID@", "base-dev"),
            ])
            .unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "image: gcr.io/base-dev/app:latest\n"
        );
        guard.restore().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "image: @IMAGE@\n");
    }

    #[test]
    fn test_backup_is_removed_after_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_policy(&dir);

        let guard = TemplateGuard::acquire(&path).unwrap();
        guard.restore().unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".bak"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateGuard::acquire(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ProvisionError::Io(_)));
    }
}
