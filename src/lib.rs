pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{StorageSettings, StorageType, SyncSettings};
pub use crate::core::{IgnoreMatcher, SyncReport, TreeWalker, WalkOptions};
pub use error::SyncError;
pub use storage::{OperatorClient, RemoteClient, RemoteError};
