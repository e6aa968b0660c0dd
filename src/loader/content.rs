//! 模块内容源
//!
//! 抽象模块的字节内容来源：类文件与资源按相对路径取用。
//! 类加载是同步路径，内容源的读取也全部同步。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

/// 把全限定类名转成内容路径
///
/// `com.acme.Widget` -> `com/acme/Widget.class`
pub fn class_to_path(class_name: &str) -> String {
    format!("{}.class", class_name.replace('.', "/"))
}

/// 取全限定类名的包名
///
/// 无包类返回空字符串。
pub fn package_of(class_name: &str) -> &str {
    match class_name.rfind('.') {
        Some(idx) => &class_name[..idx],
        None => "",
    }
}

/// 模块内容源
///
/// 实现方负责线程安全；同一路径的重复读取允许返回不同的
/// 字节副本，去重由加载器的定义表完成。
pub trait ContentSource: Send + Sync + fmt::Debug {
    /// 按相对路径读取条目字节，不存在返回 None
    fn entry(&self, path: &str) -> Option<Vec<u8>>;

    /// 条目是否存在
    fn contains(&self, path: &str) -> bool {
        self.entry(path).is_some()
    }
}

/// 内存内容源（测试与合成模块使用）
#[derive(Debug, Default, Clone)]
pub struct MemoryContent {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryContent {
    /// 创建空内容源
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加任意条目
    pub fn with_entry(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(path.into(), bytes.into());
        self
    }

    /// 按全限定类名添加类条目
    pub fn with_class(self, class_name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.with_entry(class_to_path(class_name), bytes)
    }
}

impl ContentSource for MemoryContent {
    fn entry(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.get(path).cloned()
    }

    fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

/// 目录内容源：以解压后的 Bundle 目录为根
#[derive(Debug, Clone)]
pub struct DirContent {
    root: PathBuf,
}

impl DirContent {
    /// 以目录为根创建内容源
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 根目录
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析相对路径，拒绝越出根目录的路径
    fn safe_path(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl ContentSource for DirContent {
    fn entry(&self, path: &str) -> Option<Vec<u8>> {
        let full = self.safe_path(path)?;
        trace!(path = %full.display(), "读取目录内容条目");
        fs::read(&full).ok()
    }

    fn contains(&self, path: &str) -> bool {
        self.safe_path(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_to_path() {
        assert_eq!(class_to_path("com.acme.Widget"), "com/acme/Widget.class");
        assert_eq!(class_to_path("TopLevel"), "TopLevel.class");
    }

    #[test]
    fn test_package_of() {
        assert_eq!(package_of("com.acme.Widget"), "com.acme");
        assert_eq!(package_of("TopLevel"), "");
    }

    #[test]
    fn test_memory_content() {
        let content = MemoryContent::new()
            .with_class("com.acme.Widget", vec![0xCA, 0xFE])
            .with_entry("META-INF/notes.txt", b"hello".to_vec());

        assert_eq!(
            content.entry("com/acme/Widget.class"),
            Some(vec![0xCA, 0xFE])
        );
        assert!(content.contains("META-INF/notes.txt"));
        assert!(!content.contains("missing"));
    }

    #[test]
    fn test_dir_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("com/acme")).unwrap();
        std::fs::write(dir.path().join("com/acme/Widget.class"), [0xCA, 0xFE]).unwrap();

        let content = DirContent::new(dir.path());
        assert_eq!(
            content.entry("com/acme/Widget.class"),
            Some(vec![0xCA, 0xFE])
        );
        assert!(content.contains("com/acme/Widget.class"));
        assert!(!content.contains("com/acme/Other.class"));
    }

    #[test]
    fn test_dir_content_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let content = DirContent::new(dir.path());
        assert!(content.entry("../outside").is_none());
        assert!(content.entry("/etc/passwd").is_none());
    }
}
