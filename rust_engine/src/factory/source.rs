//! 资源来源
//!
//! 下载层已把文件取好，工厂只按路径要字节。

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::{Live2dError, Result};

/// 按路径提供已取得的字节
pub trait AssetSource {
    /// 不存在时返回 `AssetNotFound`
    fn read(&self, path: &str) -> Result<Vec<u8>>;
}

/// 内存中的资源表
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl AssetSource for MemoryAssetSource {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Live2dError::AssetNotFound(path.to_string()))
    }
}

/// 本地目录，路径相对于根目录
#[derive(Debug, Clone)]
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirectoryAssetSource {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path.trim_start_matches('/'));
        std::fs::read(&full).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Live2dError::AssetNotFound(full.display().to_string()),
            _ => Live2dError::Io(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let source = MemoryAssetSource::new().with("a/b.json", b"{}".to_vec());
        assert_eq!(source.read("a/b.json").unwrap(), b"{}");
        assert!(matches!(source.read("missing"), Err(Live2dError::AssetNotFound(_))));
    }

    #[test]
    fn test_directory_source_missing_file() {
        let source = DirectoryAssetSource::new(std::env::temp_dir());
        assert!(matches!(
            source.read("live2d-engine-definitely-missing.json"),
            Err(Live2dError::AssetNotFound(_))
        ));
    }
}
