//! 内存远程存储（仅测试用），记录每一次修改操作的顺序

use super::{join_remote, normalize_dir, RemoteClient, RemoteError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// 对远程存储发出的修改类操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Store(String),
    Delete(String),
    Mkdir(String),
}

#[derive(Default)]
struct Tree {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    ops: Vec<Op>,
    fail_store: Option<String>,
    fail_retrieve: Option<String>,
    fail_delete: Option<String>,
    fail_mkdir: Option<String>,
    fail_list: Option<String>,
}

pub struct MemoryClient {
    tree: Mutex<Tree>,
    cwd: String,
    visited: Vec<String>,
}

impl MemoryClient {
    pub fn new() -> Self {
        let mut tree = Tree::default();
        tree.dirs.insert("/".to_string());
        Self {
            tree: Mutex::new(tree),
            cwd: "/".to_string(),
            visited: Vec::new(),
        }
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.tree.lock().unwrap().dirs.insert(normalize_dir(path));
        self
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.tree
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), data.to_vec());
        self
    }

    /// 让对指定路径的写入失败
    pub fn failing_store(self, path: &str) -> Self {
        self.tree.lock().unwrap().fail_store = Some(path.to_string());
        self
    }

    /// 让读取指定路径时出现传输错误（不是 NotFound）
    pub fn failing_retrieve(self, path: &str) -> Self {
        self.tree.lock().unwrap().fail_retrieve = Some(path.to_string());
        self
    }

    pub fn failing_delete(self, path: &str) -> Self {
        self.tree.lock().unwrap().fail_delete = Some(path.to_string());
        self
    }

    pub fn failing_mkdir(self, path: &str) -> Self {
        self.tree.lock().unwrap().fail_mkdir = Some(path.to_string());
        self
    }

    /// 让列出指定目录时出现传输错误
    pub fn failing_list(self, dir: &str) -> Self {
        self.tree.lock().unwrap().fail_list = Some(normalize_dir(dir));
        self
    }

    pub fn ops(&self) -> Vec<Op> {
        self.tree.lock().unwrap().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.tree.lock().unwrap().ops.clear();
    }

    /// 每次 `change_directory` 的目标路径
    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.tree.lock().unwrap().files.get(path).cloned()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.tree.lock().unwrap().dirs.contains(path)
    }

    fn path(&self, name: &str) -> String {
        join_remote(&self.cwd, name)
    }
}

fn child_name<'a>(dir: &str, path: &'a str) -> Option<&'a str> {
    let prefix = if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    };
    path.strip_prefix(prefix.as_str())
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn change_directory(&mut self, path: &str) -> Result<(), RemoteError> {
        let path = normalize_dir(path);
        self.visited.push(path.clone());
        if !self.tree.lock().unwrap().dirs.contains(&path) {
            return Err(RemoteError::NotFound(path));
        }
        self.cwd = path;
        Ok(())
    }

    async fn list_entries(&self) -> Result<BTreeSet<String>, RemoteError> {
        let tree = self.tree.lock().unwrap();
        if tree.fail_list.as_deref() == Some(self.cwd.as_str()) {
            return Err(RemoteError::transport(self.cwd.clone(), "426 connection closed"));
        }
        let mut names: BTreeSet<String> = [".", ".."].iter().map(|s| s.to_string()).collect();
        for path in tree.dirs.iter().chain(tree.files.keys()) {
            if let Some(name) = child_name(&self.cwd, path) {
                names.insert(name.to_string());
            }
        }
        Ok(names)
    }

    async fn retrieve(&self, name: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.path(name);
        let tree = self.tree.lock().unwrap();
        if tree.fail_retrieve.as_deref() == Some(path.as_str()) {
            return Err(RemoteError::transport(path, "425 can't open data connection"));
        }
        tree.files
            .get(&path)
            .cloned()
            .ok_or(RemoteError::NotFound(path))
    }

    async fn store(&self, name: &str, data: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.path(name);
        let mut tree = self.tree.lock().unwrap();
        if tree.fail_store.as_deref() == Some(path.as_str()) {
            return Err(RemoteError::transport(path, "552 quota exceeded"));
        }
        tree.ops.push(Op::Store(path.clone()));
        tree.files.insert(path, data);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), RemoteError> {
        let path = self.path(name);
        let mut tree = self.tree.lock().unwrap();
        if tree.fail_delete.as_deref() == Some(path.as_str()) {
            return Err(RemoteError::transport(path, "550 permission denied"));
        }
        let nested = format!("{}/", path);
        let existed = tree.files.remove(&path).is_some() | tree.dirs.remove(&path);
        if !existed {
            return Err(RemoteError::NotFound(path));
        }
        tree.files.retain(|p, _| !p.starts_with(&nested));
        tree.dirs.retain(|p| !p.starts_with(&nested));
        tree.ops.push(Op::Delete(path));
        Ok(())
    }

    async fn create_directory(&self, name: &str) -> Result<(), RemoteError> {
        let path = self.path(name);
        let mut tree = self.tree.lock().unwrap();
        if tree.fail_mkdir.as_deref() == Some(path.as_str()) {
            return Err(RemoteError::transport(path, "550 create directory operation failed"));
        }
        tree.ops.push(Op::Mkdir(path.clone()));
        tree.dirs.insert(path);
        Ok(())
    }

    fn current_dir(&self) -> &str {
        &self.cwd
    }

    fn name(&self) -> &str {
        "memory"
    }
}
