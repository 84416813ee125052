//! Top-level operations behind the presentation shells.
//!
//! A `Workflow` owns one store connection and one session. Shells call the
//! typed operations and render the returned outcome; nothing here prints.

use serde_json::json;

use crate::account::{self, AccountError, Identity, LoginOutcome, SignupOutcome};
use crate::config::ToolConfig;
use crate::inventory::{self, InventorySource};
use crate::outcome::ExecutionOutcome;
use crate::session::Session;
use crate::store::{CredentialStore, KvStore, StoreError};
use crate::sync::{self, DownloadOutcome, InstallReport, ProgressSink, UploadOutcome};
use pipstash_domain::Manifest;

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub source: InventorySource,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Package names to keep from the local inventory; empty means all.
    pub packages: Vec<String>,
    pub source: InventorySource,
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// Package names to keep from the stored manifest; empty means all.
    pub packages: Vec<String>,
}

pub struct Workflow {
    creds: CredentialStore,
    session: Session,
    tools: ToolConfig,
}

impl Workflow {
    pub fn new(store: Box<dyn KvStore>, tools: ToolConfig) -> Self {
        Self {
            creds: CredentialStore::new(store),
            session: Session::new(),
            tools,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn signup(&mut self, request: &SignupRequest) -> ExecutionOutcome {
        match self.try_signup(request) {
            Ok(outcome) => outcome,
            Err(err) => account_failure(&err),
        }
    }

    fn try_signup(&mut self, request: &SignupRequest) -> Result<ExecutionOutcome, AccountError> {
        if request.username.trim().is_empty() {
            return Ok(ExecutionOutcome::user_error(
                "Username must not be empty.",
                json!({ "reason": "empty_username" }),
            ));
        }
        if request.password.is_empty() {
            return Ok(ExecutionOutcome::user_error(
                "Password must not be empty.",
                json!({ "reason": "empty_password" }),
            ));
        }
        let outcome = account::signup(
            &mut self.creds,
            &mut self.session,
            &request.username,
            &request.password,
        )?;
        Ok(match outcome {
            SignupOutcome::Created(identity) => ExecutionOutcome::success(
                format!("Signed up as {}.", identity.username),
                json!({ "username": identity.username }),
            ),
            SignupOutcome::AlreadyExists => ExecutionOutcome::user_error(
                format!("Username '{}' already exists.", request.username),
                json!({ "reason": "already_exists" }),
            ),
        })
    }

    pub fn login(&mut self, username: &str, password: &str) -> ExecutionOutcome {
        match account::login(&mut self.creds, &mut self.session, username, password) {
            Ok(LoginOutcome::Authenticated(identity)) => ExecutionOutcome::success(
                format!("Logged in as {}.", identity.username),
                json!({ "username": identity.username }),
            ),
            Ok(LoginOutcome::InvalidCredentials) => ExecutionOutcome::user_error(
                "Invalid username or password.",
                json!({ "reason": "invalid_credentials" }),
            ),
            Err(err) => account_failure(&err),
        }
    }

    pub fn logout(&mut self) -> ExecutionOutcome {
        account::logout(&mut self.session);
        ExecutionOutcome::success("Signed out.", json!({}))
    }

    /// Enumerates the local inventory. Needs neither store nor session.
    pub fn list_installed(&self, request: &ListRequest) -> ExecutionOutcome {
        list_installed_outcome(&self.tools, request)
    }

    pub fn upload(&mut self, request: &UploadRequest) -> ExecutionOutcome {
        match self.try_upload(request) {
            Ok(outcome) => outcome,
            Err(err) => failure(&err, "store"),
        }
    }

    fn try_upload(&mut self, request: &UploadRequest) -> Result<ExecutionOutcome, StoreError> {
        let identity = match self.session.require() {
            Ok(identity) => identity.clone(),
            Err(_) => return Ok(not_authenticated()),
        };
        let inventory = inventory::list_installed(&self.tools, request.source);
        let chosen = if request.packages.is_empty() {
            inventory
        } else {
            inventory.select(&request.packages)
        };
        Ok(
            match sync::upload(&mut self.creds, &identity, &chosen)? {
                UploadOutcome::Stored { count } => ExecutionOutcome::success(
                    format!("Uploaded {count} packages for {}.", identity.username),
                    json!({
                        "username": identity.username,
                        "count": count,
                        "packages": chosen.entries(),
                    }),
                ),
                UploadOutcome::EmptySelection => empty_selection("upload"),
            },
        )
    }

    pub fn restore(
        &mut self,
        request: &RestoreRequest,
        progress: &mut dyn ProgressSink,
    ) -> ExecutionOutcome {
        match self.try_restore(request, progress) {
            Ok(outcome) => outcome,
            Err(err) => failure(&err, "store"),
        }
    }

    fn try_restore(
        &mut self,
        request: &RestoreRequest,
        progress: &mut dyn ProgressSink,
    ) -> Result<ExecutionOutcome, StoreError> {
        let identity = match self.session.require() {
            Ok(identity) => identity.clone(),
            Err(_) => return Ok(not_authenticated()),
        };
        let outcome = if request.packages.is_empty() {
            sync::download_all(&mut self.creds, &identity, &self.tools, progress)?
        } else {
            match self.creds.manifest_for(&identity.username)? {
                Some(text) => {
                    let selection = Manifest::parse(&text).select(&request.packages);
                    sync::download(&self.tools, &selection, progress)
                }
                None => DownloadOutcome::NotFound,
            }
        };
        Ok(match outcome {
            DownloadOutcome::Completed(report) => install_outcome(&identity, &report),
            DownloadOutcome::EmptySelection => empty_selection("restore"),
            DownloadOutcome::NotFound => not_found(&identity),
        })
    }

    pub fn show(&mut self) -> ExecutionOutcome {
        match self.try_show() {
            Ok(outcome) => outcome,
            Err(err) => failure(&err, "store"),
        }
    }

    fn try_show(&mut self) -> Result<ExecutionOutcome, StoreError> {
        let identity = match self.session.require() {
            Ok(identity) => identity.clone(),
            Err(_) => return Ok(not_authenticated()),
        };
        Ok(match self.creds.manifest_for(&identity.username)? {
            Some(text) => {
                let manifest = Manifest::parse(&text);
                ExecutionOutcome::success(
                    format!(
                        "{} packages stored for {}.",
                        manifest.len(),
                        identity.username
                    ),
                    json!({
                        "username": identity.username,
                        "count": manifest.len(),
                        "packages": manifest.entries(),
                    }),
                )
            }
            None => not_found(&identity),
        })
    }
}

/// Standalone inventory listing; the only operation with no store behind it.
#[must_use]
pub fn list_installed_outcome(tools: &ToolConfig, request: &ListRequest) -> ExecutionOutcome {
    let manifest = inventory::list_installed(tools, request.source);
    ExecutionOutcome::success(
        format!("{} packages installed locally.", manifest.len()),
        json!({
            "source": request.source.as_str(),
            "count": manifest.len(),
            "packages": manifest.entries(),
        }),
    )
}

fn install_outcome(identity: &Identity, report: &InstallReport) -> ExecutionOutcome {
    let failed: Vec<&str> = report
        .failed()
        .map(|result| result.name.as_str())
        .collect();
    let message = if failed.is_empty() {
        format!(
            "Installed {} packages for {}.",
            report.results.len(),
            identity.username
        )
    } else {
        format!(
            "Installed {} packages for {}; {} reported a non-zero exit.",
            report.results.len(),
            identity.username,
            failed.len()
        )
    };
    ExecutionOutcome::success(
        message,
        json!({
            "username": identity.username,
            "attempted": report.results.len(),
            "results": report
                .results
                .iter()
                .map(|result| json!({ "name": result.name, "code": result.code }))
                .collect::<Vec<_>>(),
            "failed": failed,
        }),
    )
}

fn not_authenticated() -> ExecutionOutcome {
    ExecutionOutcome::user_error("Please log in first.", json!({ "reason": "not_authenticated" }))
}

fn not_found(identity: &Identity) -> ExecutionOutcome {
    ExecutionOutcome::user_error(
        format!("No stored package list found for {}.", identity.username),
        json!({ "reason": "not_found" }),
    )
}

fn empty_selection(operation: &str) -> ExecutionOutcome {
    ExecutionOutcome::user_error(
        format!("Nothing selected to {operation}."),
        json!({ "reason": "empty_selection" }),
    )
}

fn failure(err: &dyn std::error::Error, reason: &'static str) -> ExecutionOutcome {
    ExecutionOutcome::failure(err.to_string(), json!({ "reason": reason }))
}

fn account_failure(err: &AccountError) -> ExecutionOutcome {
    let reason = match err {
        AccountError::Store(_) => "store",
        AccountError::Credential(_) => "credential",
    };
    failure(err, reason)
}
