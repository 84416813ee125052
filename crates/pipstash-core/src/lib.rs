#![deny(clippy::all, warnings)]

mod account;
mod config;
mod inventory;
mod outcome;
mod process;
mod session;
mod store;
mod sync;
mod workflow;

pub use account::{login, logout, signup, AccountError, Identity, LoginOutcome, SignupOutcome};
pub use config::{Config, StoreConfig, ToolConfig};
pub use inventory::{list_installed, InventorySource};
pub use outcome::{to_json_response, CommandStatus, ExecutionOutcome};
pub use process::{run_command, RunOutput};
pub use session::{NotAuthenticated, Session};
pub use store::{CredentialStore, KvStore, RedisStore, StoreError, USERS_COLLECTION};
pub use sync::{
    download, download_all, upload, upload_all, DownloadOutcome, InstallReport, InstallResult,
    ProgressSink, UploadOutcome,
};
pub use workflow::{
    list_installed_outcome, ListRequest, RestoreRequest, SignupRequest, UploadRequest, Workflow,
};
