//! 忽略规则
//!
//! 规则文件每行一条，`#` 开头（忽略前导空白）的行是注释。`*` 匹配任意字符序列，
//! 其余字符按字面匹配。匹配是非锚定的：规则出现在名称中的任何位置都算命中，
//! 所以 `cache` 也会忽略 `my_cache_dir`。规则只按条目名匹配，不看路径。

use regex::Regex;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// 单条忽略规则
#[derive(Debug, Clone)]
struct IgnoreRule {
    pattern: String,
    regex: Regex,
}

impl IgnoreRule {
    fn parse(pattern: &str) -> Option<Self> {
        let regex_pattern = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        match Regex::new(&regex_pattern) {
            Ok(regex) => Some(Self {
                pattern: pattern.to_string(),
                regex,
            }),
            Err(e) => {
                warn!("无效的忽略规则 {:?}: {}", pattern, e);
                None
            }
        }
    }
}

/// 忽略规则匹配器
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析规则文本
    pub fn load(source: &str) -> Self {
        let rules = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(IgnoreRule::parse)
            .collect();
        Self { rules }
    }

    /// 从文件加载规则，文件不存在时返回空规则集
    pub fn load_file(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                let matcher = Self::load(&content);
                debug!("加载了 {} 条忽略规则: {:?}", matcher.len(), path);
                matcher
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::new(),
            Err(e) => {
                warn!("无法读取忽略规则文件 {:?}: {}", path, e);
                Self::new()
            }
        }
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.regex.is_match(name))
    }

    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
