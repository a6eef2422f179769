//! 日志模块 - 控制台输出和可选的日志文件

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// 日志级别: "error", "warn", "info", "debug", "trace"
    #[serde(default = "default_level")]
    pub level: String,
    /// 额外写入的日志文件
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// 安静模式：控制台只输出警告和错误
    #[serde(default)]
    pub quiet: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
            quiet: false,
        }
    }
}

impl LogConfig {
    /// 根据 `-v` 次数生成配置
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        Self {
            level: level.to_string(),
            file: None,
            quiet,
        }
    }

    /// 将配置的日志级别转换为 tracing Level
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }

    /// 控制台实际使用的级别
    pub fn console_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::WARN
        } else {
            self.tracing_level()
        }
    }

    fn env_filter(&self, level: tracing::Level, from_env: bool) -> EnvFilter {
        let builder =
            EnvFilter::builder().with_default_directive(LevelFilter::from_level(level).into());
        let mut filter = if from_env {
            builder.from_env_lossy()
        } else {
            builder.parse_lossy("")
        };
        // 隐藏传输层的细节日志
        for directive in ["opendal=warn", "hyper=warn", "reqwest=warn"] {
            if let Ok(d) = directive.parse::<Directive>() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// 控制台过滤器，安静模式下不读取 RUST_LOG
    fn console_filter(&self) -> EnvFilter {
        self.env_filter(self.console_level(), !self.quiet)
    }

    /// 初始化全局日志，返回的 guard 需要保持到进程结束
    pub fn init(&self) -> Option<WorkerGuard> {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_filter(self.console_filter());

        let (file_layer, guard) = match self.file.as_deref().and_then(open_log_file) {
            Some((writer, guard)) => {
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(self.env_filter(self.tracing_level(), true));
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);
        let _ = tracing::subscriber::set_global_default(subscriber);

        guard
    }
}

fn open_log_file(
    path: &Path,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name()?;

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("无法创建日志目录 {}: {}", dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, file_name);
    Some(tracing_appender::non_blocking(appender))
}
