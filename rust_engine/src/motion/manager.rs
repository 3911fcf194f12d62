//! 动作管理
//!
//! 按组保存已解析的动作，负责优先级判断和待机动作的自动播放。

use std::collections::BTreeMap;
use std::rc::Rc;

use rand::Rng;

use super::{MotionClip, MotionPriority, MotionQueue};
use crate::moc::CoreModel;

pub type MotionGroups = BTreeMap<String, Vec<Option<Rc<dyn MotionClip>>>>;

pub struct MotionManager {
    groups: MotionGroups,
    /// 待机组名
    idle_group: Option<String>,
    queue: MotionQueue,
    current_priority: MotionPriority,
    current: Option<(String, usize)>,
}

impl MotionManager {
    /// 待机组按名称不区分大小写匹配 "idle"
    pub fn new(groups: MotionGroups) -> Self {
        let idle_group = groups.keys().find(|name| name.eq_ignore_ascii_case("idle")).cloned();
        Self {
            groups,
            idle_group,
            queue: MotionQueue::new(),
            current_priority: MotionPriority::None,
            current: None,
        }
    }

    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.keys().cloned().collect()
    }

    pub fn motion_count(&self, group: &str) -> usize {
        self.groups.get(group).map(|g| g.len()).unwrap_or(0)
    }

    pub fn idle_group(&self) -> Option<&str> {
        self.idle_group.as_deref()
    }

    pub fn current_priority(&self) -> MotionPriority {
        self.current_priority
    }

    /// 当前动作 (组, 下标)
    pub fn current(&self) -> Option<(&str, usize)> {
        self.current.as_ref().map(|(g, i)| (g.as_str(), *i))
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    /// 开始播放指定动作
    ///
    /// 优先级不高于当前动作时拒绝，`Force` 总是打断。
    pub fn start_motion(&mut self, group: &str, index: usize, priority: MotionPriority) -> bool {
        if priority == MotionPriority::None {
            return false;
        }

        let Some(clip) = self
            .groups
            .get(group)
            .and_then(|g| g.get(index))
            .and_then(|c| c.clone())
        else {
            log::debug!("动作不存在: {}[{}]", group, index);
            return false;
        };

        if self.queue.is_finished() {
            self.current_priority = MotionPriority::None;
            self.current = None;
        }

        if priority != MotionPriority::Force && priority <= self.current_priority {
            log::debug!(
                "动作 {}[{}] 优先级 {:?} 不高于当前 {:?}，忽略",
                group,
                index,
                priority,
                self.current_priority
            );
            return false;
        }

        self.queue.start(clip);
        self.current_priority = priority;
        self.current = Some((group.to_string(), index));
        true
    }

    /// 随机播放组内一个动作
    pub fn start_random_motion(&mut self, group: &str, priority: MotionPriority) -> bool {
        let available: Vec<usize> = match self.groups.get(group) {
            Some(list) => list
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_some())
                .map(|(i, _)| i)
                .collect(),
            None => return false,
        };
        if available.is_empty() {
            return false;
        }
        let index = available[rand::thread_rng().gen_range(0..available.len())];
        self.start_motion(group, index, priority)
    }

    pub fn stop_all_motions(&mut self) {
        self.queue.stop_all();
        self.current_priority = MotionPriority::None;
        self.current = None;
    }

    /// 推进动作，返回是否有动作写了参数
    ///
    /// 队列为空时自动播放待机动作。
    pub fn update(&mut self, core: &mut CoreModel, now: f64) -> bool {
        if self.queue.is_finished() {
            self.current_priority = MotionPriority::None;
            self.current = None;
            if let Some(idle) = self.idle_group.clone() {
                self.start_random_motion(&idle, MotionPriority::Idle);
            }
        }
        self.queue.update(core, now)
    }
}

impl Default for MotionManager {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::queue::tests::{core, ConstantClip};

    fn clip(value: f32, duration: Option<f64>) -> Option<Rc<dyn MotionClip>> {
        Some(Rc::new(ConstantClip { value, duration, fade_in: 0.0, fade_out: 0.0 }))
    }

    fn manager() -> MotionManager {
        let mut groups: MotionGroups = BTreeMap::new();
        groups.insert("Idle".into(), vec![clip(1.0, Some(1.0))]);
        groups.insert("TapBody".into(), vec![clip(5.0, Some(1.0)), None]);
        MotionManager::new(groups)
    }

    #[test]
    fn test_idle_auto_play() {
        let mut core = core();
        let mut manager = manager();
        assert_eq!(manager.idle_group(), Some("Idle"));

        assert!(manager.update(&mut core, 0.0));
        assert_eq!(manager.current_priority(), MotionPriority::Idle);
        assert_eq!(core.parameter_value(0), 1.0);
    }

    #[test]
    fn test_priority_rules() {
        let mut core = core();
        let mut manager = manager();
        manager.update(&mut core, 0.0);

        assert!(manager.start_motion("TapBody", 0, MotionPriority::Normal));
        assert!(!manager.start_motion("TapBody", 0, MotionPriority::Normal));
        assert!(!manager.start_motion("TapBody", 0, MotionPriority::Idle));
        assert!(manager.start_motion("TapBody", 0, MotionPriority::Force));
        assert!(!manager.start_motion("TapBody", 0, MotionPriority::None));

        manager.update(&mut core, 0.1);
        assert_eq!(core.parameter_value(0), 5.0);
        assert_eq!(manager.current(), Some(("TapBody", 0)));
    }

    #[test]
    fn test_missing_motion() {
        let mut manager = manager();
        assert!(!manager.start_motion("TapBody", 1, MotionPriority::Force));
        assert!(!manager.start_motion("TapBody", 7, MotionPriority::Force));
        assert!(!manager.start_random_motion("Nope", MotionPriority::Force));
        assert!(manager.start_random_motion("TapBody", MotionPriority::Normal));
        assert_eq!(manager.current(), Some(("TapBody", 0)));
    }

    #[test]
    fn test_finished_motion_releases_priority() {
        let mut core = core();
        let mut groups: MotionGroups = BTreeMap::new();
        groups.insert("TapBody".into(), vec![clip(5.0, Some(1.0))]);
        let mut manager = MotionManager::new(groups);

        assert!(manager.start_motion("TapBody", 0, MotionPriority::Normal));
        manager.update(&mut core, 0.0);
        manager.update(&mut core, 1.0);
        assert!(manager.is_finished());
        assert!(!manager.update(&mut core, 2.0));
        assert_eq!(manager.current_priority(), MotionPriority::None);
        assert!(manager.start_motion("TapBody", 0, MotionPriority::Normal));
    }
}
