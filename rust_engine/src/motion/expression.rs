//! 表情管理
//!
//! 表情是常驻片段：切换时旧表情淡出、新表情淡入，重置时全部淡出。

use std::rc::Rc;

use rand::Rng;

use super::{MotionClip, MotionQueue};
use crate::moc::CoreModel;

/// 按下标或名称指定表情
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionId<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ExpressionId<'_> {
    fn from(index: usize) -> Self {
        ExpressionId::Index(index)
    }
}

impl<'a> From<&'a str> for ExpressionId<'a> {
    fn from(name: &'a str) -> Self {
        ExpressionId::Name(name)
    }
}

pub struct ExpressionManager {
    definitions: Vec<(String, Option<Rc<dyn MotionClip>>)>,
    queue: MotionQueue,
    current: Option<usize>,
}

impl ExpressionManager {
    pub fn new(definitions: Vec<(String, Option<Rc<dyn MotionClip>>)>) -> Self {
        Self {
            definitions,
            queue: MotionQueue::new(),
            current: None,
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.definitions.iter().position(|(n, _)| n == name)
    }

    /// 当前表情下标
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn set_expression(&mut self, id: ExpressionId<'_>) -> bool {
        let index = match id {
            ExpressionId::Index(index) => index,
            ExpressionId::Name(name) => match self.index_of(name) {
                Some(index) => index,
                None => {
                    log::debug!("表情不存在: {}", name);
                    return false;
                }
            },
        };

        let Some(clip) = self.definitions.get(index).and_then(|(_, c)| c.clone()) else {
            log::debug!("表情不存在或未加载: {}", index);
            return false;
        };

        self.queue.start(clip);
        self.current = Some(index);
        true
    }

    /// 随机切换到另一个表情
    pub fn set_random_expression(&mut self) -> bool {
        let candidates: Vec<usize> = self
            .definitions
            .iter()
            .enumerate()
            .filter(|(i, (_, c))| c.is_some() && (Some(*i) != self.current || self.definitions.len() == 1))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return false;
        }
        let index = candidates[rand::thread_rng().gen_range(0..candidates.len())];
        self.set_expression(ExpressionId::Index(index))
    }

    /// 淡出全部表情
    pub fn reset_expression(&mut self) {
        self.queue.fade_out_all();
        self.current = None;
    }

    pub fn stop_all(&mut self) {
        self.queue.stop_all();
        self.current = None;
    }

    pub fn update(&mut self, core: &mut CoreModel, now: f64) -> bool {
        self.queue.update(core, now)
    }
}
