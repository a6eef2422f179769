//! 同步过程中的致命错误
//!
//! 元数据（时间表）读取失败不在这里，它在 `core::timetable::RecordLoad` 中就地恢复。

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::storage::RemoteError;

/// 失败的远程操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    List,
    Delete,
    Upload,
    SaveTimetable,
    CreateDir,
}

impl fmt::Display for RemoteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteAction::List => "list",
            RemoteAction::Delete => "delete",
            RemoteAction::Upload => "upload",
            RemoteAction::SaveTimetable => "save timetable",
            RemoteAction::CreateDir => "mkdir",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("无法连接远程存储 {target}")]
    Connection {
        target: String,
        #[source]
        source: RemoteError,
    },

    #[error("无法进入远程目录 {path}")]
    Navigation {
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("远程操作 {action} 失败: {path}")]
    Transfer {
        action: RemoteAction,
        path: String,
        #[source]
        source: RemoteError,
    },

    #[error("访问本地路径失败: {}", .path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    pub fn transfer(action: RemoteAction, path: impl Into<String>, source: RemoteError) -> Self {
        Self::Transfer {
            action,
            path: path.into(),
            source,
        }
    }

    pub fn local(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Local {
            path: path.into(),
            source,
        }
    }
}
