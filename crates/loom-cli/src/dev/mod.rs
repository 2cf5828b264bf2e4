//! The development loop.
//!
//! [`DevCoordinator`] starts a session from an [`AppConfig`](crate::config::AppConfig):
//! - backend build and deploy, locally or against the remote target
//! - automatic redeploys when backend sources change
//! - frontend bundling and serving with endpoint URLs injected
//! - optional log polling
//!
//! Everything a session acquires is released through its [`ResourceLedger`].

pub mod bundler;
pub mod coordinator;
pub mod emulator;
pub mod hooks;
pub mod ledger;
pub mod logs;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod watcher;

pub use bundler::{Bundler, StaticBundler};
pub use coordinator::{DevCoordinator, DevOptions, DevSession};
pub use emulator::{EmulatorHandle, LocalEmulator, LocalRuntime};
pub use hooks::{HookRunner, ScriptHooks};
pub use ledger::{ResourceLedger, ShutdownHandle, ShutdownOutcome};
pub use logs::LogPoller;
pub use scheduler::{ChangeHandler, ChangeScheduler};
pub use server::{FrontendServer, ServeOptions, TlsFiles};
pub use service::{ActionService, CommandService, DeployOptions, DeployReport};
pub use watcher::{FileWatcher, WatchEvent};
