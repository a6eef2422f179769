use super::{normalize_dir, RemoteClient, RemoteError, IO_TIMEOUT_SECS, OP_TIMEOUT_SECS};
use async_trait::async_trait;
use opendal::{layers::TimeoutLayer, ErrorKind, Operator};
use std::collections::BTreeSet;
use std::time::Duration;

/// 基于 OpenDAL 的远程会话
///
/// 同一个 `Operator` 覆盖 FTP / WebDAV / S3 / 本地文件系统，会话自己记录
/// 当前目录，所有条目路径都按当前目录拼接成相对于存储根的 key。
pub struct OperatorClient {
    operator: Operator,
    cwd: String,
    name: String,
}

impl OperatorClient {
    pub fn ftp(endpoint: &str, user: &str, password: &str) -> Result<Self, RemoteError> {
        use opendal::services::Ftp;

        // 没有 scheme 时 OpenDAL 会按 ftps 处理，这里默认明文 ftp
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("ftp://{}", endpoint)
        };

        let builder = Ftp::default()
            .endpoint(&endpoint)
            .user(user)
            .password(password);

        let name = format!("{}@{}", user, endpoint);
        Self::from_builder(builder, name)
    }

    pub fn webdav(
        endpoint: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, RemoteError> {
        use opendal::services::Webdav;

        let mut builder = Webdav::default().endpoint(endpoint);
        if let Some(u) = username {
            builder = builder.username(u);
        }
        if let Some(p) = password {
            builder = builder.password(p);
        }

        let name = format!("webdav://{}", endpoint.trim_end_matches('/'));
        Self::from_builder(builder, name)
    }

    pub fn s3(
        bucket: &str,
        region: &str,
        access_key: Option<&str>,
        secret_key: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Self, RemoteError> {
        use opendal::services::S3;

        let mut builder = S3::default().bucket(bucket).region(region);
        if let Some(k) = access_key {
            builder = builder.access_key_id(k);
        }
        if let Some(s) = secret_key {
            builder = builder.secret_access_key(s);
        }
        if let Some(ep) = endpoint.filter(|e| !e.is_empty()) {
            builder = builder.endpoint(ep);
        }

        Self::from_builder(builder, format!("s3://{}", bucket))
    }

    pub fn local(root: &str) -> Result<Self, RemoteError> {
        use opendal::services::Fs;

        let builder = Fs::default().root(root);
        Self::from_builder(builder, format!("local:{}", root))
    }

    fn from_builder<B: opendal::Builder>(builder: B, name: String) -> Result<Self, RemoteError> {
        let operator = Operator::new(builder)
            .map_err(|e| RemoteError::transport(name.clone(), e))?
            .layer(
                TimeoutLayer::default()
                    .with_timeout(Duration::from_secs(OP_TIMEOUT_SECS))
                    .with_io_timeout(Duration::from_secs(IO_TIMEOUT_SECS)),
            )
            .finish();

        Ok(Self {
            operator,
            cwd: "/".to_string(),
            name,
        })
    }

    /// 列出存储根目录，用来校验连接和凭证
    pub async fn check(&self) -> Result<(), RemoteError> {
        self.operator
            .list("/")
            .await
            .map(|_| ())
            .map_err(|e| map_err("/", e))
    }

    /// 当前目录下某个条目对应的存储 key（不带前导 `/`）
    fn entry_key(&self, name: &str) -> String {
        let dir = self.cwd.trim_matches('/');
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        }
    }

    fn dir_key(path: &str) -> String {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("{}/", trimmed)
        }
    }
}

fn map_err(path: &str, e: opendal::Error) -> RemoteError {
    if e.kind() == ErrorKind::NotFound {
        RemoteError::NotFound(path.to_string())
    } else {
        RemoteError::transport(path, e)
    }
}

#[async_trait]
impl RemoteClient for OperatorClient {
    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        let path = normalize_dir(path);

        if path != "/" {
            // 对象存储里目录只以 `dir/` 形式的 key 存在
            match self.operator.stat(&Self::dir_key(&path)).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(RemoteError::NotFound(path)),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(RemoteError::NotFound(path))
                }
                Err(e) => {
                    // 文件系统对 `file/` 报的不是 NotFound，按不带 `/` 的 key 再确认一次
                    let plain = path.trim_start_matches('/');
                    return match self.operator.stat(plain).await {
                        Ok(meta) if !meta.is_dir() => Err(RemoteError::NotFound(path)),
                        _ => Err(map_err(&path, e)),
                    };
                }
            }
        }

        self.cwd = path;
        Ok(())
    }

    async fn list_entries(&self) -> Result<BTreeSet<String>, RemoteError> {
        let key = Self::dir_key(&self.cwd);
        let entries = self
            .operator
            .list(&key)
            .await
            .map_err(|e| map_err(&self.cwd, e))?;

        let own = key.trim_matches('/');
        let names = entries
            .iter()
            // 部分服务会把目录自身也列出来
            .filter(|entry| entry.path().trim_matches('/') != own)
            .map(|entry| entry.name().trim_end_matches('/').to_string())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(names)
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, RemoteError> {
        let key = self.entry_key(name);
        let data = self.operator.read(&key).await.map_err(|e| map_err(&key, e))?;
        Ok(data.to_vec())
    }

    async fn store(&self, name: &str, data: Vec<u8>) -> Result<(), RemoteError> {
        let key = self.entry_key(name);
        self.operator
            .write(&key, data)
            .await
            .map_err(|e| map_err(&key, e))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RemoteError> {
        let key = self.entry_key(name);
        let meta = self.operator.stat(&key).await.map_err(|e| map_err(&key, e))?;

        if meta.is_dir() {
            let dir = format!("{}/", key);
            let mut children: Vec<String> = self
                .operator
                .list_with(&dir)
                .recursive(true)
                .await
                .map_err(|e| map_err(&key, e))?
                .into_iter()
                .map(|entry| entry.path().to_string())
                .filter(|path| path != &dir)
                .collect();

            // 先删最深的条目，保证目录为空时才删除目录本身
            children.sort_by_key(|p| std::cmp::Reverse(p.trim_end_matches('/').matches('/').count()));
            for child in &children {
                self.operator
                    .delete(child)
                    .await
                    .map_err(|e| map_err(child, e))?;
            }
            self.operator
                .delete(&dir)
                .await
                .map_err(|e| map_err(&key, e))
        } else {
            self.operator
                .delete(&key)
                .await
                .map_err(|e| map_err(&key, e))
        }
    }

    async fn create_directory(&self, name: &str) -> Result<(), RemoteError> {
        let key = format!("{}/", self.entry_key(name));
        match self.operator.create_dir(&key).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(map_err(&key, e)),
        }
    }

    fn current_dir(&self) -> &str {
        &self.cwd
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(dir: &tempfile::TempDir) -> OperatorClient {
        OperatorClient::local(dir.path().to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_store_retrieve_in_current_dir() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("site")).unwrap();
        let mut client = client(&root);

        client.change_directory("/site").await.unwrap();
        client.store("a.txt", b"hello".to_vec()).await.unwrap();

        assert_eq!(client.current_dir(), "/site");
        assert_eq!(client.retrieve("a.txt").await.unwrap(), b"hello");
        assert_eq!(
            std::fs::read(root.path().join("site/a.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_change_directory_missing() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("file"), b"x").unwrap();
        let mut client = client(&root);

        let err = client.change_directory("/nope").await.unwrap_err();
        assert!(err.is_not_found());

        let err = client.change_directory("/file").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.current_dir(), "/");
    }

    #[tokio::test]
    async fn test_list_create_delete() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir_all(root.path().join("old/nested")).unwrap();
        std::fs::write(root.path().join("old/nested/x"), b"x").unwrap();
        let mut client = client(&root);
        client.change_directory("/").await.unwrap();

        client.create_directory("sub").await.unwrap();
        client.create_directory("sub").await.unwrap();

        let names = client.list_entries().await.unwrap();
        let expected: BTreeSet<String> = ["a.txt", "old", "sub"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, expected);

        client.delete("old").await.unwrap();
        client.delete("a.txt").await.unwrap();
        assert!(!root.path().join("old").exists());
        assert!(!root.path().join("a.txt").exists());
    }

    fn memory_client() -> OperatorClient {
        OperatorClient::from_builder(opendal::services::Memory::default(), "memory".to_string())
            .unwrap()
    }

    #[tokio::test]
    async fn test_change_directory_on_prefix_store() {
        let mut client = memory_client();
        client.create_directory("sub").await.unwrap();
        client.store("file", b"x".to_vec()).await.unwrap();

        client.change_directory("/sub").await.unwrap();
        assert_eq!(client.current_dir(), "/sub");

        let err = client.change_directory("/file").await.unwrap_err();
        assert!(err.is_not_found());
        let err = client.change_directory("/nope").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(client.current_dir(), "/sub");
    }

    #[tokio::test]
    async fn test_walker_creates_and_enters_dirs_on_prefix_store() {
        use crate::core::{IgnoreMatcher, TreeWalker, WalkOptions};

        let local = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(local.path().join("sub/deeper")).unwrap();
        std::fs::write(local.path().join("sub/a.txt"), b"a").unwrap();
        std::fs::write(local.path().join("sub/deeper/b.txt"), b"b").unwrap();

        let mut client = memory_client();
        let mut walker = TreeWalker::new(IgnoreMatcher::new(), WalkOptions::default());
        walker
            .sync_root(&mut client, local.path(), "/")
            .await
            .unwrap();

        let report = walker.into_report();
        assert_eq!(report.dirs_visited, 3);
        assert_eq!(report.dirs_created, 2);
        assert_eq!(report.files_uploaded, 2);

        client.change_directory("/sub/deeper").await.unwrap();
        assert_eq!(client.retrieve("b.txt").await.unwrap(), b"b");
        assert!(client.retrieve(".mirrorsync.timetable").await.is_ok());
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let client = client(&root);
        let err = client.retrieve(".mirrorsync.timetable").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
