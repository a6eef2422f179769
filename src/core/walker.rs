//! 目录树同步
//!
//! 逐个目录访问本地树，与对应的远程目录对比后执行删除、上传、保存时间表、
//! 创建子目录，再深度优先进入子目录。每个阶段的顺序是固定的：
//! 子目录必须在上一层访问中先创建，下一次访问才能进入它。

use crate::core::ignore::IgnoreMatcher;
use crate::core::timetable::{file_stamp, ChangeDetector, TIMETABLE_NAME};
use crate::error::{RemoteAction, SyncError};
use crate::storage::{join_remote, normalize_dir, RemoteClient, PSEUDO_ENTRIES};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 同步选项
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// 删除本地不存在的远程条目
    pub delete_enabled: bool,
}

/// 同步报告
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub dirs_visited: u32,
    pub files_uploaded: u32,
    pub files_unchanged: u32,
    pub files_ignored: u32,
    pub entries_deleted: u32,
    pub dirs_created: u32,
    pub records_saved: u32,
    pub bytes_uploaded: u64,
}

impl SyncReport {
    /// 是否对远程存储做过任何修改
    pub fn is_noop(&self) -> bool {
        self.files_uploaded == 0
            && self.entries_deleted == 0
            && self.dirs_created == 0
            && self.records_saved == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalKind {
    File { modified: SystemTime },
    Dir,
    /// 符号链接、设备文件等，不参与上传和递归
    Other,
}

#[derive(Debug, Clone)]
struct LocalEntry {
    name: String,
    kind: LocalKind,
}

/// 一次目录访问的状态
struct DirectoryVisit {
    local_dir: PathBuf,
    remote_dir: String,
    local: Vec<LocalEntry>,
    remote: BTreeSet<String>,
    dirty: bool,
}

/// 目录树同步器
pub struct TreeWalker {
    ignore: IgnoreMatcher,
    options: WalkOptions,
    report: SyncReport,
}

impl TreeWalker {
    pub fn new(ignore: IgnoreMatcher, options: WalkOptions) -> Self {
        Self {
            ignore,
            options,
            report: SyncReport::default(),
        }
    }

    pub fn report(&self) -> &SyncReport {
        &self.report
    }

    pub fn into_report(self) -> SyncReport {
        self.report
    }

    /// 同步一个源目录到远程基准目录
    ///
    /// 任何远程错误（时间表读取除外）都会立即终止同步。
    pub async fn sync_root<C: RemoteClient + ?Sized>(
        &mut self,
        client: &mut C,
        source_root: &Path,
        base_remote_dir: &str,
    ) -> Result<(), SyncError> {
        info!("同步 {:?} -> {}:{}", source_root, client.name(), base_remote_dir);

        // 深度优先：子目录逆序入栈，弹出顺序即名称顺序
        let mut pending = vec![source_root.to_path_buf()];
        while let Some(local_dir) = pending.pop() {
            let remote_dir = remote_path_for(source_root, base_remote_dir, &local_dir)?;
            let children = self.visit(client, local_dir, remote_dir).await?;
            pending.extend(children.into_iter().rev());
        }

        Ok(())
    }

    /// 访问一个目录，返回需要继续进入的子目录
    async fn visit<C: RemoteClient + ?Sized>(
        &mut self,
        client: &mut C,
        local_dir: PathBuf,
        remote_dir: String,
    ) -> Result<Vec<PathBuf>, SyncError> {
        debug!("访问目录 {:?} -> {}", local_dir, remote_dir);
        self.report.dirs_visited += 1;

        // 1. 定位远程目录
        client
            .change_directory(&remote_dir)
            .await
            .map_err(|source| SyncError::Navigation {
                path: remote_dir.clone(),
                source,
            })?;

        // 2. 读取时间表和两侧列表
        let (mut record, missing) = ChangeDetector::load(&*client, &remote_dir)
            .await
            .into_parts();
        let local = list_local(&local_dir).await?;
        let remote = client
            .list_entries()
            .await
            .map_err(|e| SyncError::transfer(RemoteAction::List, remote_dir.clone(), e))?;

        let mut visit = DirectoryVisit {
            local_dir,
            remote_dir,
            local,
            remote,
            dirty: missing,
        };

        // 3. 删除本地不存在的远程条目（不看忽略规则）
        if self.options.delete_enabled {
            let local_names: BTreeSet<&str> =
                visit.local.iter().map(|e| e.name.as_str()).collect();
            let stale: Vec<String> = visit
                .remote
                .iter()
                .filter(|name| !is_reserved(name) && !local_names.contains(name.as_str()))
                .cloned()
                .collect();

            for name in stale {
                let path = join_remote(&visit.remote_dir, &name);
                client
                    .delete(&name)
                    .await
                    .map_err(|e| SyncError::transfer(RemoteAction::Delete, path.clone(), e))?;
                info!("delete {}", path);
                record.remove(&name);
                visit.dirty = true;
                self.report.entries_deleted += 1;
            }
        }

        // 4. 上传新增或修改过的文件
        for entry in &visit.local {
            let LocalKind::File { modified } = entry.kind else {
                continue;
            };
            if entry.name == TIMETABLE_NAME {
                warn!("跳过与时间表同名的本地文件: {:?}", visit.local_dir.join(&entry.name));
                continue;
            }
            if self.ignore.is_ignored(&entry.name) {
                debug!("忽略文件: {}", entry.name);
                self.report.files_ignored += 1;
                continue;
            }

            let stamp = file_stamp(modified);
            if !ChangeDetector::has_changed(&record, &entry.name, &stamp) {
                self.report.files_unchanged += 1;
                continue;
            }

            let local_path = visit.local_dir.join(&entry.name);
            let data = tokio::fs::read(&local_path)
                .await
                .map_err(|e| SyncError::local(&local_path, e))?;
            let size = data.len() as u64;

            let path = join_remote(&visit.remote_dir, &entry.name);
            client
                .store(&entry.name, data)
                .await
                .map_err(|e| SyncError::transfer(RemoteAction::Upload, path.clone(), e))?;
            info!("upload {}", path);

            record.touch(&entry.name, stamp);
            visit.dirty = true;
            self.report.files_uploaded += 1;
            self.report.bytes_uploaded += size;
        }

        // 5. 保存时间表
        if visit.dirty {
            ChangeDetector::save(&*client, &visit.remote_dir, &record).await?;
            info!("timetable {}", join_remote(&visit.remote_dir, TIMETABLE_NAME));
            self.report.records_saved += 1;
        }

        // 6. 创建远程缺少的子目录
        let subdirs: Vec<&LocalEntry> = visit
            .local
            .iter()
            .filter(|e| e.kind == LocalKind::Dir && !is_reserved(&e.name))
            .filter(|e| {
                let ignored = self.ignore.is_ignored(&e.name);
                if ignored {
                    debug!("忽略目录: {}", e.name);
                }
                !ignored
            })
            .collect();

        for entry in &subdirs {
            if visit.remote.contains(&entry.name) {
                continue;
            }
            let path = join_remote(&visit.remote_dir, &entry.name);
            client
                .create_directory(&entry.name)
                .await
                .map_err(|e| SyncError::transfer(RemoteAction::CreateDir, path.clone(), e))?;
            info!("mkdir {}", path);
            self.report.dirs_created += 1;
        }

        // 7. 子目录交给调用方继续访问
        Ok(subdirs
            .iter()
            .map(|e| visit.local_dir.join(&e.name))
            .collect())
    }
}

/// 时间表和伪条目永远不作为普通条目处理
fn is_reserved(name: &str) -> bool {
    name == TIMETABLE_NAME || PSEUDO_ENTRIES.contains(&name)
}

/// 本地目录对应的远程路径：基准目录 + 去掉源根前缀后的相对路径
pub fn remote_path_for(
    source_root: &Path,
    base_remote_dir: &str,
    local_dir: &Path,
) -> Result<String, SyncError> {
    let relative = local_dir.strip_prefix(source_root).map_err(|_| {
        SyncError::Config(format!(
            "{} 不在源目录 {} 之下",
            local_dir.display(),
            source_root.display()
        ))
    })?;

    let mut remote = normalize_dir(base_remote_dir);
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| {
                    SyncError::Config(format!("路径不是有效的 UTF-8: {}", local_dir.display()))
                })?;
                remote = join_remote(&remote, part);
            }
            Component::CurDir => continue,
            _ => {
                return Err(SyncError::Config(format!(
                    "不支持的路径: {}",
                    local_dir.display()
                )))
            }
        }
    }
    Ok(remote)
}

/// 列出本地目录的直接子条目，按名称排序
async fn list_local(dir: &Path) -> Result<Vec<LocalEntry>, SyncError> {
    let dir = dir.to_path_buf();
    let dir_for_err = dir.clone();

    // 使用 spawn_blocking 避免阻塞 async runtime
    tokio::task::spawn_blocking(move || -> Result<Vec<LocalEntry>, SyncError> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SyncError::local(&dir, e.into()))?;
            let Some(name) = entry.file_name().to_str() else {
                warn!("跳过非 UTF-8 文件名: {:?}", entry.path());
                continue;
            };

            let file_type = entry.file_type();
            let kind = if file_type.is_file() {
                let modified = entry
                    .metadata()
                    .map_err(|e| SyncError::local(entry.path(), e.into()))?
                    .modified()
                    .map_err(|e| SyncError::local(entry.path(), e))?;
                LocalKind::File { modified }
            } else if file_type.is_dir() {
                LocalKind::Dir
            } else {
                LocalKind::Other
            };

            entries.push(LocalEntry {
                name: name.to_string(),
                kind,
            });
        }
        Ok(entries)
    })
    .await
    .map_err(|e| SyncError::local(dir_for_err, std::io::Error::other(e)))?
}
