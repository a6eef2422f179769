//! 时间表 - 每个远程目录一份的文件名到修改时间记录，用于增量同步
//!
//! 时间表以保留名称存放在对应的远程目录里。时间戳固定宽度、秒级精度，
//! 字典序即时间顺序；同一秒内的两次写入无法区分。

use crate::error::{RemoteAction, SyncError};
use crate::storage::{join_remote, RemoteClient, RemoteError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, warn};

/// 远程目录中时间表的保留名称
pub const TIMETABLE_NAME: &str = ".mirrorsync.timetable";

/// 时间戳格式（UTC）
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const FORMAT_VERSION: u32 = 1;

/// 单个目录的变更记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRecord {
    entries: BTreeMap<String, String>,
}

impl ChangeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// 记录上传后的时间戳
    pub fn touch(&mut self, name: &str, stamp: String) {
        self.entries.insert(name.to_string(), stamp);
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 时间表文件格式
#[derive(Serialize, Deserialize)]
struct TimetableFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("时间表格式错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("不支持的时间表版本: {0}")]
    UnsupportedVersion(u32),
}

pub fn encode(record: &ChangeRecord) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&TimetableFile {
        version: FORMAT_VERSION,
        entries: record.entries.clone(),
    })
}

pub fn decode(data: &[u8]) -> Result<ChangeRecord, DecodeError> {
    let file: TimetableFile = serde_json::from_slice(data)?;
    if file.version != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion(file.version));
    }
    Ok(ChangeRecord {
        entries: file.entries,
    })
}

/// 时间表加载结果
///
/// 除 `Found` 外的结果都就地恢复为空记录，并强制本次访问结束时重写时间表。
#[derive(Debug)]
pub enum RecordLoad {
    Found(ChangeRecord),
    /// 远程目录中没有时间表
    Missing,
    /// 时间表内容无法解析
    Corrupt(DecodeError),
    /// 读取时出现传输错误
    Unavailable(RemoteError),
}

impl RecordLoad {
    /// 拆成（记录, 是否缺失）
    pub fn into_parts(self) -> (ChangeRecord, bool) {
        match self {
            RecordLoad::Found(record) => (record, false),
            _ => (ChangeRecord::new(), true),
        }
    }
}

/// 变更检测
pub struct ChangeDetector;

impl ChangeDetector {
    /// 从会话当前目录读取时间表，`dir` 仅用于日志
    pub async fn load<C: RemoteClient + ?Sized>(client: &C, dir: &str) -> RecordLoad {
        match client.retrieve(TIMETABLE_NAME).await {
            Ok(data) => match decode(&data) {
                Ok(record) => {
                    debug!("读取时间表 {}: {} 条记录", dir, record.len());
                    RecordLoad::Found(record)
                }
                Err(e) => {
                    warn!("时间表损坏，将重建 {}: {}", dir, e);
                    RecordLoad::Corrupt(e)
                }
            },
            Err(e) if e.is_not_found() => {
                debug!("时间表不存在: {}", dir);
                RecordLoad::Missing
            }
            Err(e) => {
                warn!("读取时间表失败，将重建 {}: {}", dir, e);
                RecordLoad::Unavailable(e)
            }
        }
    }

    /// 文件是否需要（重新）上传
    pub fn has_changed(record: &ChangeRecord, name: &str, stamp: &str) -> bool {
        record.get(name) != Some(stamp)
    }

    /// 把时间表写回会话当前目录
    pub async fn save<C: RemoteClient + ?Sized>(
        client: &C,
        dir: &str,
        record: &ChangeRecord,
    ) -> Result<(), SyncError> {
        let path = join_remote(dir, TIMETABLE_NAME);
        let data = encode(record).map_err(|e| {
            SyncError::transfer(
                RemoteAction::SaveTimetable,
                path.clone(),
                RemoteError::transport(path.clone(), e),
            )
        })?;

        client
            .store(TIMETABLE_NAME, data)
            .await
            .map_err(|e| SyncError::transfer(RemoteAction::SaveTimetable, path, e))?;

        debug!("保存时间表 {}: {} 条记录", dir, record.len());
        Ok(())
    }
}

/// 修改时间转换为时间戳字符串
pub fn file_stamp(modified: SystemTime) -> String {
    let time: DateTime<Utc> = modified.into();
    time.format(STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{MemoryClient, Op};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_file_stamp_fixed_width() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(file_stamp(t), "20231114221320");
        assert_eq!(file_stamp(UNIX_EPOCH), "19700101000000");
        assert_eq!(file_stamp(t).len(), 14);
    }

    #[test]
    fn test_file_stamp_second_resolution() {
        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let later = t + Duration::from_millis(900);
        assert_eq!(file_stamp(t), file_stamp(later));
        assert!(file_stamp(t + Duration::from_secs(1)) > file_stamp(t));
    }

    #[test]
    fn test_has_changed() {
        let mut record = ChangeRecord::new();
        assert!(ChangeDetector::has_changed(&record, "a.txt", "20240101000000"));

        record.touch("a.txt", "20240101000000".to_string());
        assert!(!ChangeDetector::has_changed(&record, "a.txt", "20240101000000"));
        assert!(ChangeDetector::has_changed(&record, "a.txt", "20240101000001"));
        // 时间倒退同样视为变化
        assert!(ChangeDetector::has_changed(&record, "a.txt", "20231231235959"));
    }

    #[test]
    fn test_encode_decode() {
        let mut record = ChangeRecord::new();
        record.touch("index.html", "20240101120000".to_string());
        record.touch("名字 with space.txt", "20240102120000".to_string());

        let data = encode(&record).unwrap();
        let text = String::from_utf8(data.clone()).unwrap();
        assert!(text.contains("\"version\":1"));
        assert_eq!(decode(&data).unwrap(), record);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let data = br#"{"version":7,"entries":{}}"#;
        assert!(matches!(decode(data), Err(DecodeError::UnsupportedVersion(7))));
        assert!(matches!(decode(b"\x80\x03}q"), Err(DecodeError::Json(_))));
    }

    #[tokio::test]
    async fn test_load_missing() {
        let client = MemoryClient::new();
        let load = ChangeDetector::load(&client, "/").await;
        assert!(matches!(load, RecordLoad::Missing));
        let (record, missing) = load.into_parts();
        assert!(record.is_empty());
        assert!(missing);
    }

    #[tokio::test]
    async fn test_load_corrupt() {
        let client = MemoryClient::new().with_file("/.mirrorsync.timetable", b"garbage");
        let load = ChangeDetector::load(&client, "/").await;
        assert!(matches!(load, RecordLoad::Corrupt(_)));
        assert!(load.into_parts().1);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let client = MemoryClient::new();
        let mut record = ChangeRecord::new();
        record.touch("a.txt", "20240101120000".to_string());

        ChangeDetector::save(&client, "/", &record).await.unwrap();
        assert_eq!(client.ops(), vec![Op::Store("/.mirrorsync.timetable".to_string())]);

        let (loaded, missing) = ChangeDetector::load(&client, "/").await.into_parts();
        assert!(!missing);
        assert_eq!(loaded, record);
    }
}
