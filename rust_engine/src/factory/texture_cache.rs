//! 纹理缓存
//!
//! 按 URL 缓存已解码的纹理，多个模型共享同一份。
//! 卸载不看引用计数：已经拿到 `Rc<Texture>` 的持有者不受影响。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::texture::{load_texture_from_memory, Texture};
use crate::{Live2dError, Result};

pub type SharedTextureCache = Rc<RefCell<TextureCache>>;

struct CacheEntry {
    texture: Rc<Texture>,
    /// 最近一次被绑定时的纹理 GC 计数
    touched: u64,
}

#[derive(Default)]
pub struct TextureCache {
    entries: HashMap<String, CacheEntry>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedTextureCache {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn get(&self, url: &str) -> Option<Rc<Texture>> {
        self.entries.get(url).map(|e| e.texture.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 命中时直接返回，否则用 `fetch` 取字节并解码
    pub fn load_with<F>(&mut self, url: &str, fetch: F) -> Result<Rc<Texture>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some(texture) = self.get(url) {
            return Ok(texture);
        }
        let texture = Rc::new(load_texture_from_memory(&fetch()?)?);
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                texture: texture.clone(),
                touched: 0,
            },
        );
        log::debug!("纹理已缓存: {} ({}x{})", url, texture.width, texture.height);
        Ok(texture)
    }

    pub fn touch(&mut self, url: &str, gc_count: u64) {
        if let Some(entry) = self.entries.get_mut(url) {
            entry.touched = gc_count;
        }
    }

    pub fn touched(&self, url: &str) -> Option<u64> {
        self.entries.get(url).map(|e| e.touched)
    }

    /// 卸载一组 URL；有未缓存的 URL 时其余照常卸载并返回错误
    pub fn unload(&mut self, urls: &[String]) -> Result<usize> {
        let mut removed = 0;
        let mut missing = Vec::new();
        for url in urls {
            if self.entries.remove(url).is_some() {
                removed += 1;
            } else {
                missing.push(url.as_str());
            }
        }
        if missing.is_empty() {
            Ok(removed)
        } else {
            Err(Live2dError::AssetNotFound(missing.join(", ")))
        }
    }

    /// 清除 GC 计数早于 `before` 的纹理，返回清除数量
    pub fn collect_garbage(&mut self, before: u64) -> usize {
        let len = self.entries.len();
        self.entries.retain(|_, e| e.touched >= before);
        len - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::png_bytes;

    #[test]
    fn test_load_hits_cache() {
        let mut cache = TextureCache::new();
        let first = cache
            .load_with("a.png", || Ok(png_bytes(1, 1, [1, 2, 3, 255])))
            .unwrap();
        let second = cache
            .load_with("a.png", || panic!("cache miss"))
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_fetch_error_propagates() {
        let mut cache = TextureCache::new();
        let result = cache.load_with("a.png", || Err(Live2dError::AssetNotFound("a.png".into())));
        assert!(matches!(result, Err(Live2dError::AssetNotFound(_))));
        assert!(!cache.contains("a.png"));
    }

    #[test]
    fn test_unload_and_gc() {
        let mut cache = TextureCache::new();
        for url in ["a.png", "b.png"] {
            cache.load_with(url, || Ok(png_bytes(1, 1, [0, 0, 0, 255]))).unwrap();
        }
        cache.touch("a.png", 10);
        assert_eq!(cache.touched("a.png"), Some(10));

        assert_eq!(cache.collect_garbage(5), 1);
        assert!(cache.contains("a.png"));

        assert!(cache.unload(&["a.png".to_string(), "c.png".to_string()]).is_err());
        assert!(cache.is_empty());
    }
}
