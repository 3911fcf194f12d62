//! 资源工厂
//!
//! 设置文件 + 已取得的字节 → 内部模型 + 纹理。
//! 任何失败都原样返回给调用方，不会装入半成品。

mod source;
mod texture_cache;

pub use source::{AssetSource, DirectoryAssetSource, MemoryAssetSource};
pub use texture_cache::{SharedTextureCache, TextureCache};

use std::rc::Rc;

use crate::cubism2::Cubism2InternalModel;
use crate::cubism4::Cubism4InternalModel;
use crate::moc::CoreModel;
use crate::model::{InternalModel, InternalModelOptions, ModelFormat, ModelResources, ModelSettings};
use crate::texture::{load_texture_from_memory, Texture};
use crate::{Live2dError, Result};

/// 工厂的产物，交给 `Live2DModel::from_loaded`
pub struct LoadedModel {
    pub internal_model: Box<dyn InternalModel>,
    pub textures: Vec<Rc<Texture>>,
    /// 与 `textures` 一一对应，缓存卸载时按此查找
    pub texture_urls: Vec<String>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("name", &self.internal_model.settings().name)
            .field("format", &self.internal_model.format())
            .field("texture_urls", &self.texture_urls)
            .finish()
    }
}

pub struct Live2DFactory {
    source: Box<dyn AssetSource>,
    texture_cache: Option<SharedTextureCache>,
}

impl Live2DFactory {
    pub fn new(source: impl AssetSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            texture_cache: None,
        }
    }

    /// 多个模型共享解码后的纹理
    pub fn with_texture_cache(mut self, cache: SharedTextureCache) -> Self {
        self.texture_cache = Some(cache);
        self
    }

    pub fn texture_cache(&self) -> Option<&SharedTextureCache> {
        self.texture_cache.as_ref()
    }

    /// 按设置文件 URL 加载
    pub fn load(&self, url: &str, options: &InternalModelOptions) -> Result<LoadedModel> {
        let bytes = self.source.read(url)?;
        let settings = ModelSettings::from_slice(&bytes, url)?;
        self.load_from_settings(settings, options)
    }

    pub fn load_from_settings(&self, settings: ModelSettings, options: &InternalModelOptions) -> Result<LoadedModel> {
        let moc_url = settings.resolve_path(&settings.moc);
        let core = CoreModel::from_slice(&self.source.read(&moc_url)?)?;
        let resources = self.read_resources(&settings)?;

        let texture_urls: Vec<String> = settings.textures.iter().map(|t| settings.resolve_path(t)).collect();
        let textures = texture_urls
            .iter()
            .map(|url| self.load_texture(url))
            .collect::<Result<Vec<_>>>()?;

        let name = settings.name.clone();
        let format = settings.format;
        let internal_model: Box<dyn InternalModel> = match format {
            ModelFormat::Cubism4 => Box::new(Cubism4InternalModel::new(settings, core, &resources, options.clone())?),
            ModelFormat::Cubism2 => Box::new(Cubism2InternalModel::new(settings, core, &resources, options.clone())?),
        };

        log::info!(
            "模型加载完成: {} ({:?}), 纹理 {}, 动作组 {}",
            name,
            format,
            textures.len(),
            resources.motions.len()
        );

        Ok(LoadedModel {
            internal_model,
            textures,
            texture_urls,
        })
    }

    /// 读取设置文件声明的附属文件
    ///
    /// 动作和表情缺失时记为 None；声明了的物理和姿势文件必须存在。
    pub fn read_resources(&self, settings: &ModelSettings) -> Result<ModelResources> {
        let mut resources = ModelResources::default();

        for (group, defs) in &settings.motions {
            let files = defs.iter().map(|def| self.read_optional(settings, &def.file)).collect();
            resources.motions.insert(group.clone(), files);
        }

        resources.expressions = settings
            .expressions
            .iter()
            .map(|def| self.read_optional(settings, &def.file))
            .collect();

        if let Some(physics) = &settings.physics {
            resources.physics = Some(self.source.read(&settings.resolve_path(physics))?);
        }
        if let Some(pose) = &settings.pose {
            resources.pose = Some(self.source.read(&settings.resolve_path(pose))?);
        }

        Ok(resources)
    }

    fn read_optional(&self, settings: &ModelSettings, file: &str) -> Option<Vec<u8>> {
        let url = settings.resolve_path(file);
        match self.source.read(&url) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("资源读取失败，已跳过: {} ({})", url, e);
                None
            }
        }
    }

    fn load_texture(&self, url: &str) -> Result<Rc<Texture>> {
        let result = match &self.texture_cache {
            Some(cache) => cache.borrow_mut().load_with(url, || self.source.read(url)),
            None => load_texture_from_memory(&self.source.read(url)?).map(Rc::new),
        };
        result.map_err(|e| match e {
            Live2dError::AssetNotFound(_) => e,
            other => Live2dError::Texture(format!("{}: {}", url, other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cubism2_moc_json, cubism2_settings_json, cubism4_moc_json, cubism4_settings_json, png_bytes};

    fn cubism4_source() -> MemoryAssetSource {
        MemoryAssetSource::new()
            .with("models/haru/haru.model3.json", cubism4_settings_json())
            .with("models/haru/model.moc.json", cubism4_moc_json())
            .with("models/haru/textures/texture_00.png", png_bytes(2, 2, [255, 0, 0, 255]))
    }

    #[test]
    fn test_load_cubism4() {
        let factory = Live2DFactory::new(cubism4_source());
        let loaded = factory
            .load("models/haru/haru.model3.json", &InternalModelOptions::default())
            .unwrap();
        assert_eq!(loaded.internal_model.format(), ModelFormat::Cubism4);
        assert_eq!(loaded.internal_model.settings().name, "haru");
        assert_eq!(loaded.textures.len(), 1);
        assert_eq!(loaded.texture_urls, vec!["models/haru/textures/texture_00.png".to_string()]);
    }

    #[test]
    fn test_load_cubism2() {
        let source = MemoryAssetSource::new()
            .with("shizuku/shizuku.model.json", cubism2_settings_json())
            .with("shizuku/model.moc.json", cubism2_moc_json())
            .with("shizuku/textures/texture_00.png", png_bytes(2, 2, [0, 0, 255, 255]));
        let factory = Live2DFactory::new(source);
        let loaded = factory
            .load("shizuku/shizuku.model.json", &InternalModelOptions::default())
            .unwrap();
        assert_eq!(loaded.internal_model.format(), ModelFormat::Cubism2);
        assert_eq!(loaded.internal_model.settings().name, "shizuku");
    }

    #[test]
    fn test_missing_motion_is_skipped() {
        // idle 动作文件不在资源表中
        let factory = Live2DFactory::new(cubism4_source());
        let settings = ModelSettings::from_slice(cubism4_settings_json().as_bytes(), "models/haru/haru.model3.json").unwrap();
        let resources = factory.read_resources(&settings).unwrap();
        assert_eq!(resources.motions.get("idle").map(|m| m.len()), Some(1));
        assert!(resources.motions["idle"][0].is_none());
    }

    #[test]
    fn test_missing_texture_fails() {
        let source = MemoryAssetSource::new()
            .with("models/haru/haru.model3.json", cubism4_settings_json())
            .with("models/haru/model.moc.json", cubism4_moc_json());
        let factory = Live2DFactory::new(source);
        let result = factory.load("models/haru/haru.model3.json", &InternalModelOptions::default());
        assert!(matches!(result, Err(Live2dError::AssetNotFound(_))));
    }

    #[test]
    fn test_unknown_settings_format() {
        let source = MemoryAssetSource::new().with("x.json", b"{\"foo\": 1}".to_vec());
        let factory = Live2DFactory::new(source);
        let result = factory.load("x.json", &InternalModelOptions::default());
        assert!(matches!(result, Err(Live2dError::Settings(_))));
    }

    #[test]
    fn test_textures_shared_through_cache() {
        let cache = TextureCache::shared();
        let factory = Live2DFactory::new(cubism4_source()).with_texture_cache(cache.clone());
        let a = factory.load("models/haru/haru.model3.json", &InternalModelOptions::default()).unwrap();
        let b = factory.load("models/haru/haru.model3.json", &InternalModelOptions::default()).unwrap();
        assert!(Rc::ptr_eq(&a.textures[0], &b.textures[0]));
        assert_eq!(cache.borrow().len(), 1);
    }
}
