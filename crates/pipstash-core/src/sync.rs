//! Manifest upload and replay.
//!
//! Uploads overwrite the account's stored manifest wholesale. Replay walks
//! the selection strictly in order, one `pip install` at a time, and tells
//! the progress sink twice per entry. The progress wording is stable
//! user-facing output; exit codes are additionally collected so shells can
//! report which installs actually failed.

use pipstash_domain::Manifest;
use tracing::{debug, warn};

use crate::account::Identity;
use crate::config::ToolConfig;
use crate::inventory::{self, InventorySource};
use crate::process;
use crate::store::{CredentialStore, StoreError};

/// Receives human-readable status lines during replay.
pub trait ProgressSink {
    fn update(&mut self, message: &str);
}

impl<F: FnMut(&str)> ProgressSink for F {
    fn update(&mut self, message: &str) {
        self(message);
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Stored { count: usize },
    /// Nothing chosen; the store was not contacted.
    EmptySelection,
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Completed(InstallReport),
    EmptySelection,
    /// No manifest has ever been uploaded for this account.
    NotFound,
}

/// One attempted install. `code` is the package manager's exit status,
/// or -1 when it could not be launched at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallResult {
    pub name: String,
    pub code: i32,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub results: Vec<InstallResult>,
}

impl InstallReport {
    pub fn failed(&self) -> impl Iterator<Item = &InstallResult> {
        self.results.iter().filter(|result| result.code != 0)
    }
}

/// Stores `manifest` under the account key, overwriting any prior value.
/// An empty manifest is rejected without touching the store.
pub fn upload(
    creds: &mut CredentialStore,
    identity: &Identity,
    manifest: &Manifest,
) -> Result<UploadOutcome, StoreError> {
    if manifest.is_empty() {
        return Ok(UploadOutcome::EmptySelection);
    }
    creds.store_manifest(&identity.username, &manifest.render())?;
    debug!(
        username = %identity.username,
        count = manifest.len(),
        "uploaded manifest"
    );
    Ok(UploadOutcome::Stored {
        count: manifest.len(),
    })
}

/// Captures the full local inventory and uploads it.
pub fn upload_all(
    creds: &mut CredentialStore,
    identity: &Identity,
    tools: &ToolConfig,
    source: InventorySource,
) -> Result<UploadOutcome, StoreError> {
    let manifest = inventory::list_installed(tools, source);
    upload(creds, identity, &manifest)
}

/// Installs the chosen entries in order. No store contact.
pub fn download(
    tools: &ToolConfig,
    selection: &Manifest,
    progress: &mut dyn ProgressSink,
) -> DownloadOutcome {
    if selection.is_empty() {
        return DownloadOutcome::EmptySelection;
    }
    DownloadOutcome::Completed(install_each(tools, selection, progress))
}

/// Fetches the account's stored manifest and installs every entry.
pub fn download_all(
    creds: &mut CredentialStore,
    identity: &Identity,
    tools: &ToolConfig,
    progress: &mut dyn ProgressSink,
) -> Result<DownloadOutcome, StoreError> {
    let Some(text) = creds.manifest_for(&identity.username)? else {
        return Ok(DownloadOutcome::NotFound);
    };
    let manifest = Manifest::parse(&text);
    Ok(DownloadOutcome::Completed(install_each(
        tools, &manifest, progress,
    )))
}

fn install_each(
    tools: &ToolConfig,
    manifest: &Manifest,
    progress: &mut dyn ProgressSink,
) -> InstallReport {
    let mut report = InstallReport::default();
    for entry in manifest {
        progress.update(&format!("Downloading and installing {}...", entry.name));
        let args = ["install".to_string(), entry.name.clone()];
        let code = match process::run_command(&tools.pip, &args) {
            Ok(output) => {
                if output.code != 0 {
                    warn!(
                        package = %entry.name,
                        code = output.code,
                        "install exited non-zero: {}",
                        output.stderr.trim()
                    );
                }
                output.code
            }
            Err(err) => {
                warn!(package = %entry.name, "failed to launch {}: {err:#}", tools.pip);
                -1
            }
        };
        progress.update(&format!("{} has been downloaded and installed.", entry.name));
        report.results.push(InstallResult {
            name: entry.name.clone(),
            code,
        });
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::memory_credentials;

    fn alice() -> Identity {
        Identity {
            username: "alice".to_string(),
        }
    }

    fn tools(pip: &str) -> ToolConfig {
        ToolConfig {
            pip: pip.to_string(),
            python: "python3".to_string(),
        }
    }

    #[test]
    fn empty_upload_is_rejected_without_a_store_write() {
        let mut creds = memory_credentials();
        creds.store_manifest("alice", "requests==2.31.0").unwrap();

        let outcome = upload(&mut creds, &alice(), &Manifest::default()).unwrap();
        assert_eq!(outcome, UploadOutcome::EmptySelection);
        assert_eq!(
            creds.manifest_for("alice").unwrap().unwrap(),
            "requests==2.31.0"
        );
    }

    #[test]
    fn upload_overwrites_the_stored_manifest_wholesale() {
        let mut creds = memory_credentials();
        creds.store_manifest("alice", "old==1").unwrap();

        let manifest = Manifest::parse("requests==2.31.0\nflask==3.0.0");
        let outcome = upload(&mut creds, &alice(), &manifest).unwrap();
        assert_eq!(outcome, UploadOutcome::Stored { count: 2 });
        assert_eq!(
            creds.manifest_for("alice").unwrap().unwrap(),
            "requests==2.31.0\nflask==3.0.0"
        );
    }

    #[cfg(unix)]
    #[test]
    fn upload_all_stores_the_full_captured_inventory() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let pip = temp.path().join("pip");
        fs::write(
            &pip,
            "#!/bin/sh\nprintf 'requests==2.31.0\\nflask==3.0.0\\n'\n",
        )
        .unwrap();
        fs::set_permissions(&pip, fs::Permissions::from_mode(0o755)).unwrap();
        let pip = pip.to_string_lossy().to_string();

        let mut creds = memory_credentials();
        let outcome = upload_all(
            &mut creds,
            &alice(),
            &tools(&pip),
            InventorySource::PipFreeze,
        )
        .unwrap();
        assert_eq!(outcome, UploadOutcome::Stored { count: 2 });
        assert_eq!(
            creds.manifest_for("alice").unwrap().unwrap(),
            "requests==2.31.0\nflask==3.0.0"
        );
    }

    #[test]
    fn download_all_without_an_upload_is_not_found() {
        let mut creds = memory_credentials();
        let mut calls = 0usize;
        let mut sink = |_: &str| calls += 1;

        let outcome = download_all(&mut creds, &alice(), &tools("pip3"), &mut sink).unwrap();
        assert!(matches!(outcome, DownloadOutcome::NotFound));
        assert_eq!(calls, 0);
    }

    #[test]
    fn empty_selection_download_attempts_nothing() {
        let mut calls = 0usize;
        let mut sink = |_: &str| calls += 1;
        let outcome = download(&tools("pip3"), &Manifest::default(), &mut sink);
        assert!(matches!(outcome, DownloadOutcome::EmptySelection));
        assert_eq!(calls, 0);
    }

    #[cfg(unix)]
    #[test]
    fn download_all_replays_entries_in_upload_order() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("install.log");
        let pip = temp.path().join("pip");
        fs::write(
            &pip,
            format!("#!/bin/sh\necho \"$2\" >> {}\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&pip, fs::Permissions::from_mode(0o755)).unwrap();
        let pip = pip.to_string_lossy().to_string();

        let mut creds = memory_credentials();
        let manifest = Manifest::parse("requests==2.31.0\nflask==3.0.0");
        upload(&mut creds, &alice(), &manifest).unwrap();

        let mut messages = Vec::new();
        let mut sink = |message: &str| messages.push(message.to_string());
        let outcome = download_all(&mut creds, &alice(), &tools(&pip), &mut sink).unwrap();

        let DownloadOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|result| result.code == 0));
        assert_eq!(fs::read_to_string(&log).unwrap(), "requests\nflask\n");
        assert_eq!(
            messages,
            vec![
                "Downloading and installing requests...",
                "requests has been downloaded and installed.",
                "Downloading and installing flask...",
                "flask has been downloaded and installed.",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn per_entry_exit_codes_are_captured() {
        let manifest = Manifest::parse("doomed==1.0");
        let mut sink = |_: &str| {};
        let outcome = download(&tools("/bin/false"), &manifest, &mut sink);

        let DownloadOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.results.len(), 1);
        assert_ne!(report.results[0].code, 0);
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn unlaunchable_installer_is_recorded_not_propagated() {
        let manifest = Manifest::parse("requests==2.31.0");
        let mut messages = Vec::new();
        let mut sink = |message: &str| messages.push(message.to_string());
        let outcome = download(&tools("/nonexistent/pipstash-pip"), &manifest, &mut sink);

        let DownloadOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.results[0].code, -1);
        // Completion is still reported per entry, matching the legacy flow.
        assert_eq!(messages.len(), 2);
    }
}
