//! 命令行参数

use clap::Parser;
use std::path::PathBuf;

use crate::config::{StorageType, SyncSettings};
use crate::error::SyncError;
use crate::logging::LogConfig;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mirrorsync",
    version,
    about = "把本地目录树镜像到远程存储（FTP / WebDAV / S3 / 本地目录）",
    long_about = "把本地目录树镜像到远程存储。

每个远程目录里保存一份时间表（.mirrorsync.timetable），记录上次上传时各文件的
修改时间，再次运行时只上传修改时间变化过的文件。

示例:
    mirrorsync -H ftp.example.com -u web -r /www ./site
    mirrorsync -c mirrorsync.json --delete ./site"
)]
pub struct Cli {
    /// 本地源目录，可指定多个，全部映射到远程基准目录
    #[arg(value_name = "SOURCE", required_unless_present = "check")]
    pub sources: Vec<PathBuf>,

    /// JSON 配置文件，命令行参数优先
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// 远程存储类型
    #[arg(short = 't', long, value_enum, help_heading = "Remote")]
    pub storage: Option<StorageType>,

    /// FTP 主机（host[:port]）或 WebDAV endpoint
    #[arg(short = 'H', long, help_heading = "Remote")]
    pub host: Option<String>,

    /// 用户名（S3 时为 access key）
    #[arg(short = 'u', long, help_heading = "Remote")]
    pub user: Option<String>,

    /// 密码（S3 时为 secret key）
    #[arg(short = 'p', long, env = "MIRRORSYNC_PASSWORD", hide_env_values = true, help_heading = "Remote")]
    pub password: Option<String>,

    /// S3 bucket
    #[arg(long, help_heading = "Remote")]
    pub bucket: Option<String>,

    /// S3 region
    #[arg(long, help_heading = "Remote")]
    pub region: Option<String>,

    /// S3 兼容服务的 endpoint
    #[arg(long, help_heading = "Remote")]
    pub endpoint: Option<String>,

    /// 本地存储的根目录（--storage local）
    #[arg(long, help_heading = "Remote")]
    pub root: Option<String>,

    /// 远程基准目录
    #[arg(short = 'r', long = "remote-dir", value_name = "DIR", help_heading = "Remote")]
    pub remote_dir: Option<String>,

    /// 删除本地不存在的远程文件和目录
    #[arg(short = 'd', long, help_heading = "Sync")]
    pub delete: bool,

    /// 忽略规则文件（默认 ./.syncignore）
    #[arg(long, value_name = "PATH", help_heading = "Sync")]
    pub ignore_file: Option<PathBuf>,

    /// 只测试连接和基准目录，不同步
    #[arg(long, help_heading = "Sync")]
    pub check: bool,

    /// 不输出逐条操作
    #[arg(short = 'q', long, help_heading = "Output")]
    pub quiet: bool,

    /// 日志详细程度: -v DEBUG / -vv TRACE（默认 INFO）
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    pub verbose: u8,

    /// 同时写入日志文件
    #[arg(long, value_name = "PATH", help_heading = "Output")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// 合并配置文件与命令行参数
    pub fn settings(&self) -> Result<SyncSettings, SyncError> {
        let mut settings = match &self.config {
            Some(path) => SyncSettings::load(path)?,
            None => SyncSettings::default(),
        };

        let storage = &mut settings.storage;
        if let Some(typ) = self.storage {
            storage.typ = typ;
        }
        override_opt(&mut storage.host, &self.host);
        override_opt(&mut storage.username, &self.user);
        override_opt(&mut storage.password, &self.password);
        override_opt(&mut storage.bucket, &self.bucket);
        override_opt(&mut storage.region, &self.region);
        override_opt(&mut storage.endpoint, &self.endpoint);
        override_opt(&mut storage.root, &self.root);

        if let Some(dir) = &self.remote_dir {
            settings.base_remote_dir = dir.clone();
        }
        if let Some(path) = &self.ignore_file {
            settings.ignore_file = path.clone();
        }
        settings.delete_enabled |= self.delete;
        settings.quiet |= self.quiet;

        Ok(settings)
    }

    pub fn log_config(&self, settings: &SyncSettings) -> LogConfig {
        LogConfig {
            file: self.log_file.clone(),
            ..LogConfig::from_verbosity(self.verbose, settings.quiet)
        }
    }
}

fn override_opt(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
