//! 更新钩子
//!
//! 内部模型在 `update` 的固定位置触发，外部（例如参数过渡）借此写参数。

use crate::moc::CoreModel;

/// 钩子位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelHook {
    BeforeMotionUpdate,
    AfterMotionUpdate,
    /// 提交参数之前
    BeforeModelUpdate,
}

pub type HookId = u64;

pub type HookFn = Box<dyn FnMut(&mut CoreModel)>;

/// 钩子表
pub struct ModelHooks {
    next_id: HookId,
    hooks: Vec<(HookId, ModelHook, HookFn)>,
}

impl ModelHooks {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            hooks: Vec::new(),
        }
    }

    pub fn on(&mut self, kind: ModelHook, hook: HookFn) -> HookId {
        let id = self.next_id;
        self.next_id += 1;
        self.hooks.push((id, kind, hook));
        id
    }

    pub fn off(&mut self, id: HookId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(hook_id, _, _)| *hook_id != id);
        self.hooks.len() != before
    }

    pub fn emit(&mut self, kind: ModelHook, core: &mut CoreModel) {
        for (_, hook_kind, hook) in self.hooks.iter_mut() {
            if *hook_kind == kind {
                hook(core);
            }
        }
    }

    pub fn count(&self, kind: ModelHook) -> usize {
        self.hooks.iter().filter(|(_, k, _)| *k == kind).count()
    }

    pub fn clear(&mut self) {
        self.hooks.clear();
    }
}

impl Default for ModelHooks {
    fn default() -> Self {
        Self::new()
    }
}
