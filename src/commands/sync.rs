use crate::config::SyncSettings;
use crate::core::{IgnoreMatcher, SyncReport, TreeWalker, WalkOptions};
use crate::error::SyncError;
use crate::storage::{self, RemoteClient};
use std::path::PathBuf;
use tracing::{debug, info};

/// 连接远程存储并依次同步所有源目录
pub async fn run_sync(settings: &SyncSettings, sources: &[PathBuf]) -> Result<SyncReport, SyncError> {
    settings.validate()?;
    check_sources(sources).await?;

    // 忽略规则只加载一次，所有源目录、所有层级共用
    let ignore = IgnoreMatcher::load_file(&settings.ignore_file);
    let mut client = storage::connect(&settings.storage).await?;

    sync_with_client(&mut client, ignore, settings, sources).await
}

/// 使用已建立的会话同步
pub async fn sync_with_client<C: RemoteClient + ?Sized>(
    client: &mut C,
    ignore: IgnoreMatcher,
    settings: &SyncSettings,
    sources: &[PathBuf],
) -> Result<SyncReport, SyncError> {
    let start = std::time::Instant::now();
    let mut walker = TreeWalker::new(
        ignore,
        WalkOptions {
            delete_enabled: settings.delete_enabled,
        },
    );

    for source in sources {
        walker
            .sync_root(client, source, &settings.base_remote_dir)
            .await?;
    }

    let report = walker.into_report();
    info!(
        "同步完成: 上传 {}, 删除 {}, 新建目录 {}, 未变化 {}, 耗时 {:.1}s",
        report.files_uploaded,
        report.entries_deleted,
        report.dirs_created,
        report.files_unchanged,
        start.elapsed().as_secs_f64()
    );
    debug!("同步报告: {:?}", report);
    Ok(report)
}

async fn check_sources(sources: &[PathBuf]) -> Result<(), SyncError> {
    if sources.is_empty() {
        return Err(SyncError::Config("至少需要一个源目录".to_string()));
    }
    for source in sources {
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|e| SyncError::local(source, e))?;
        if !meta.is_dir() {
            return Err(SyncError::Config(format!("源路径不是目录: {}", source.display())));
        }
    }
    Ok(())
}
