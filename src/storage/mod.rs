pub mod operator;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::config::{StorageSettings, StorageType};
use crate::error::SyncError;

pub use operator::OperatorClient;

// ============ 公共常量 ============

/// 非 IO 操作超时（秒）- stat, delete, list 等
pub const OP_TIMEOUT_SECS: u64 = 60;
/// IO 操作超时（秒）- read, write 等
pub const IO_TIMEOUT_SECS: u64 = 300;

/// 列目录时可能出现的自身/父目录伪条目
pub const PSEUDO_ENTRIES: [&str; 2] = [".", ".."];

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 远程存储错误
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("远程路径不存在: {0}")]
    NotFound(String),
    #[error("远程操作失败: {path}")]
    Transport {
        path: String,
        #[source]
        source: BoxError,
    },
}

impl RemoteError {
    pub fn transport(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            path: path.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// 远程目录会话接口
///
/// 会话维护一个"当前目录"，除 `change_directory` 外的所有操作都以
/// 当前目录为基准，参数只是条目名称。调用方在每次访问目录前都会用绝对路径
/// 重新定位，不依赖之前留下的当前目录。
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// 切换当前目录（绝对路径），目录不存在时返回 `RemoteError::NotFound`
    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError>;

    /// 列出当前目录下的条目名称（可能包含 `.` 和 `..`）
    async fn list_entries(&self) -> Result<BTreeSet<String>, RemoteError>;

    /// 读取当前目录下的文件
    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, RemoteError>;

    /// 写入当前目录下的文件（覆盖）
    async fn store(&self, name: &str, data: Vec<u8>) -> Result<(), RemoteError>;

    /// 删除当前目录下的文件或目录
    async fn delete(&self, name: &str) -> Result<(), RemoteError>;

    /// 在当前目录下创建子目录，已存在时不报错
    async fn create_directory(&self, name: &str) -> Result<(), RemoteError>;

    /// 当前目录（绝对路径）
    fn current_dir(&self) -> &str;

    /// 获取存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 规范化远程目录路径：以 `/` 开头，不以 `/` 结尾（根目录除外），
/// 折叠重复分隔符
pub fn normalize_dir(path: &str) -> String {
    let parts: Vec<&str> = path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    format!("/{}", parts.join("/"))
}

/// 在远程目录下拼接条目名
pub fn join_remote(dir: &str, name: &str) -> String {
    if dir == "/" || dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }
}

/// 根据配置连接远程存储
///
/// 建立会话后立即发出一次列目录请求校验凭证，失败即为连接错误，
/// 此时不会访问任何目录。
pub async fn connect(settings: &StorageSettings) -> Result<OperatorClient, SyncError> {
    let target = settings.display_target();
    tracing::info!("连接远程存储: {}", target);

    let client = match settings.typ {
        StorageType::Ftp => {
            let host = settings.require_host()?;
            OperatorClient::ftp(
                host,
                settings.username.as_deref().unwrap_or("anonymous"),
                settings.password.as_deref().unwrap_or(""),
            )
        }
        StorageType::WebDav => {
            let endpoint = settings.require_host()?;
            OperatorClient::webdav(
                endpoint,
                settings.username.as_deref(),
                settings.password.as_deref(),
            )
        }
        StorageType::S3 => {
            let bucket = settings
                .bucket
                .as_deref()
                .ok_or_else(|| SyncError::Config("S3 存储需要 bucket".to_string()))?;
            OperatorClient::s3(
                bucket,
                settings.region.as_deref().unwrap_or("us-east-1"),
                settings.username.as_deref(),
                settings.password.as_deref(),
                settings.endpoint.as_deref(),
            )
        }
        StorageType::Local => {
            let root = settings
                .root
                .as_deref()
                .ok_or_else(|| SyncError::Config("本地存储需要 root 路径".to_string()))?;
            OperatorClient::local(root)
        }
    }
    .map_err(|source| SyncError::Connection {
        target: target.clone(),
        source,
    })?;

    client
        .check()
        .await
        .map_err(|source| SyncError::Connection { target, source })?;

    tracing::debug!("远程存储可访问: {}", client.name());
    Ok(client)
}
