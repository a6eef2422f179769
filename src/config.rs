//! 同步配置模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

/// 存储类型
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Ftp,
    #[value(name = "webdav")]
    WebDav,
    S3,
    Local,
}

/// 远程存储连接参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(rename = "type", default)]
    pub typ: StorageType,
    /// FTP 主机（host[:port]）或 WebDAV endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// 用户名；S3 时作为 access key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// 密码；S3 时作为 secret key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// S3 兼容服务的 endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// 本地存储的根目录
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl StorageSettings {
    pub fn require_host(&self) -> Result<&str, SyncError> {
        self.host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| SyncError::Config("需要指定远程主机".to_string()))
    }

    /// 用于日志的目标描述，不包含密码
    pub fn display_target(&self) -> String {
        match self.typ {
            StorageType::Ftp => format!(
                "ftp://{}@{}",
                self.username.as_deref().unwrap_or("anonymous"),
                self.host.as_deref().unwrap_or("")
            ),
            StorageType::WebDav => format!("webdav:{}", self.host.as_deref().unwrap_or("")),
            StorageType::S3 => format!("s3://{}", self.bucket.as_deref().unwrap_or("")),
            StorageType::Local => format!("local:{}", self.root.as_deref().unwrap_or("")),
        }
    }
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default)]
    pub storage: StorageSettings,
    /// 远程基准目录，本地源目录映射到这里
    #[serde(default = "default_base_remote_dir")]
    pub base_remote_dir: String,
    /// 是否删除本地不存在的远程条目
    #[serde(default)]
    pub delete_enabled: bool,
    /// 安静模式，不输出逐条操作
    #[serde(default)]
    pub quiet: bool,
    /// 忽略规则文件
    #[serde(default = "default_ignore_file")]
    pub ignore_file: PathBuf,
}

fn default_base_remote_dir() -> String {
    "/".to_string()
}

fn default_ignore_file() -> PathBuf {
    PathBuf::from(".syncignore")
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            storage: StorageSettings::default(),
            base_remote_dir: default_base_remote_dir(),
            delete_enabled: false,
            quiet: false,
            ignore_file: default_ignore_file(),
        }
    }
}

impl SyncSettings {
    /// 从 JSON 配置文件加载，未出现的字段取默认值
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| SyncError::Config(format!("配置文件格式错误 {}: {}", path.display(), e)))
    }

    /// 检查所选存储类型需要的字段
    pub fn validate(&self) -> Result<(), SyncError> {
        match self.storage.typ {
            StorageType::Ftp | StorageType::WebDav => {
                self.storage.require_host()?;
            }
            StorageType::S3 => {
                if self.storage.bucket.as_deref().map_or(true, str::is_empty) {
                    return Err(SyncError::Config("S3 存储需要 bucket".to_string()));
                }
            }
            StorageType::Local => {
                if self.storage.root.as_deref().map_or(true, str::is_empty) {
                    return Err(SyncError::Config("本地存储需要 root 路径".to_string()));
                }
            }
        }
        Ok(())
    }
}
