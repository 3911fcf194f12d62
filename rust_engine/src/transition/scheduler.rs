//! 过渡调度
//!
//! 每种过渡（可见属性 / 参数 / 焦点 / 风）各占一个 `TransitionSlot`，
//! 同一槽位同时最多一个过渡，新过渡开始前先停止旧的。
//! 时间单位为毫秒，由宿主每帧调用 `poll(dt)` 推进。

use std::collections::BTreeMap;

use super::{Completion, Easing};
use crate::config::get_config;

/// 属性名 → 数值
pub type ValueMap<K> = BTreeMap<K, f32>;

/// 线性插值，t == 1 时精确返回终点
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    if t == 1.0 {
        to
    } else {
        from + (to - from) * t
    }
}

/// 过渡时间参数（未设置的字段回退到默认值）
#[derive(Clone, Debug, Default)]
pub struct TransitionTiming {
    /// 时长（毫秒）
    pub duration: Option<f64>,
    /// 延迟（毫秒）
    pub delay: Option<f64>,
    pub easing: Option<Easing>,
}

impl TransitionTiming {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_easing(mut self, easing: impl Into<Easing>) -> Self {
        self.easing = Some(easing.into());
        self
    }

    /// 是否指定了任意时间参数
    pub fn has_timing(&self) -> bool {
        self.duration.is_some() || self.delay.is_some() || self.easing.is_some()
    }

    /// 以 self 为准，缺失字段取 base
    pub fn or(&self, base: &TransitionTiming) -> TransitionTiming {
        TransitionTiming {
            duration: self.duration.or(base.duration),
            delay: self.delay.or(base.delay),
            easing: self.easing.clone().or_else(|| base.easing.clone()),
        }
    }
}

/// 过渡参数
#[derive(Clone, Debug)]
pub struct TransitionOptions<K: Ord> {
    pub from: ValueMap<K>,
    pub to: ValueMap<K>,
    pub timing: TransitionTiming,
}

impl<K: Ord> Default for TransitionOptions<K> {
    fn default() -> Self {
        Self {
            from: BTreeMap::new(),
            to: BTreeMap::new(),
            timing: TransitionTiming::default(),
        }
    }
}

impl<K: Ord + Clone> TransitionOptions<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(mut self, key: K, value: f32) -> Self {
        self.from.insert(key, value);
        self
    }

    pub fn to_value(mut self, key: K, value: f32) -> Self {
        self.to.insert(key, value);
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.timing.duration = Some(duration);
        self
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.timing.delay = Some(delay);
        self
    }

    pub fn with_easing(mut self, easing: impl Into<Easing>) -> Self {
        self.timing.easing = Some(easing.into());
        self
    }

    /// 合并到 base 之上：from / to 逐键覆盖，时间参数以 self 为准
    pub fn merged_over(&self, base: &TransitionOptions<K>) -> TransitionOptions<K> {
        let mut from = base.from.clone();
        from.extend(self.from.iter().map(|(k, v)| (k.clone(), *v)));
        let mut to = base.to.clone();
        to.extend(self.to.iter().map(|(k, v)| (k.clone(), *v)));
        TransitionOptions {
            from,
            to,
            timing: self.timing.or(&base.timing),
        }
    }
}

/// 槽位状态机：Idle → Running → {Completed, Cancelled}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// 单次 `poll` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStatus {
    /// 没有活动过渡
    Idle,
    /// 仍在延迟中
    Delayed,
    Running,
    /// 本帧到达终点
    Completed,
}

/// 延迟期间的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayBehavior {
    /// 什么都不输出（可见属性）
    Hold,
    /// 持续输出起始值（参数 / 焦点 / 风）
    ReportFrom,
}

#[derive(Debug, Clone)]
pub struct TransitionPoll<K> {
    pub status: TransitionStatus,
    /// 本帧应写入的值
    pub values: Option<ValueMap<K>>,
}

impl<K> TransitionPoll<K> {
    fn idle() -> Self {
        Self {
            status: TransitionStatus::Idle,
            values: None,
        }
    }
}

/// `start` 的结果
#[derive(Debug, Clone)]
pub struct StartedTransition<K> {
    pub completion: Completion,
    /// 开始时应立即写入的值（零时长为终点值，否则为起始值）
    pub initial: Option<ValueMap<K>>,
}

struct ActiveTransition<K> {
    /// 开始时一次性确定，之后不再变化
    values: BTreeMap<K, (f32, f32)>,
    duration: f64,
    delay: f64,
    easing: Easing,
    elapsed: f64,
    completion: Completion,
}

impl<K: Ord + Clone> ActiveTransition<K> {
    fn sample(&self, t: f32) -> ValueMap<K> {
        self.values
            .iter()
            .map(|(k, (from, to))| (k.clone(), lerp(*from, *to, t)))
            .collect()
    }
}

/// 单一种类的过渡槽位
pub struct TransitionSlot<K> {
    active: Option<ActiveTransition<K>>,
    state: TransitionState,
    delay_behavior: DelayBehavior,
}

impl<K: Ord + Clone> TransitionSlot<K> {
    pub fn new(delay_behavior: DelayBehavior) -> Self {
        Self {
            active: None,
            state: TransitionState::Idle,
            delay_behavior,
        }
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// 开始新过渡
    ///
    /// `current` 提供属性的实时值；from / to 任一侧缺失时回退到实时值，
    /// 实时值也不存在的属性被忽略。没有任何可插值属性时立即完成，
    /// 且不影响正在进行的过渡。
    pub fn start(
        &mut self,
        options: &TransitionOptions<K>,
        current: impl Fn(&K) -> Option<f32>,
    ) -> StartedTransition<K> {
        let mut values = BTreeMap::new();
        for key in options.from.keys().chain(options.to.keys()) {
            if values.contains_key(key) {
                continue;
            }
            let live = current(key);
            let from = options.from.get(key).copied().or(live);
            let to = options.to.get(key).copied().or(live);
            if let (Some(from), Some(to)) = (from, to) {
                values.insert(key.clone(), (from, to));
            }
        }

        if values.is_empty() {
            return StartedTransition {
                completion: Completion::completed(),
                initial: None,
            };
        }

        self.stop();

        let duration = options
            .timing
            .duration
            .unwrap_or_else(|| get_config().transition_duration)
            .max(0.0);
        let delay = options.timing.delay.unwrap_or(0.0).max(0.0);
        let easing = options.timing.easing.clone().unwrap_or_default();

        let active = ActiveTransition {
            values,
            duration,
            delay,
            easing,
            elapsed: 0.0,
            completion: Completion::new(),
        };

        if duration == 0.0 && delay == 0.0 {
            let initial = active.sample(1.0);
            active.completion.complete();
            self.state = TransitionState::Completed;
            return StartedTransition {
                completion: active.completion,
                initial: Some(initial),
            };
        }

        let initial = active.sample(0.0);
        let completion = active.completion.clone();
        self.active = Some(active);
        self.state = TransitionState::Running;
        StartedTransition {
            completion,
            initial: Some(initial),
        }
    }

    /// 推进 dt 毫秒
    pub fn poll(&mut self, dt: f64) -> TransitionPoll<K> {
        let Some(active) = self.active.as_mut() else {
            return TransitionPoll::idle();
        };

        active.elapsed += dt;

        if active.elapsed < active.delay {
            let values = match self.delay_behavior {
                DelayBehavior::Hold => None,
                DelayBehavior::ReportFrom => Some(active.sample(0.0)),
            };
            return TransitionPoll {
                status: TransitionStatus::Delayed,
                values,
            };
        }

        let progress = if active.duration == 0.0 {
            1.0
        } else {
            ((active.elapsed - active.delay) / active.duration).min(1.0) as f32
        };
        let values = active.sample(active.easing.apply(progress));

        if progress >= 1.0 {
            if let Some(finished) = self.active.take() {
                finished.completion.complete();
            }
            self.state = TransitionState::Completed;
            return TransitionPoll {
                status: TransitionStatus::Completed,
                values: Some(values),
            };
        }

        TransitionPoll {
            status: TransitionStatus::Running,
            values: Some(values),
        }
    }

    /// 停止并 resolve 当前过渡，不写入目标值；返回是否有过渡被停止
    pub fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.completion.cancel();
                self.state = TransitionState::Cancelled;
                true
            }
            None => false,
        }
    }
}

impl<K: Ord + Clone> Default for TransitionSlot<K> {
    fn default() -> Self {
        Self::new(DelayBehavior::Hold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::CompletionState;

    fn live(value: f32) -> impl Fn(&&'static str) -> Option<f32> {
        move |_| Some(value)
    }

    #[test]
    fn test_zero_duration_completes_synchronously() {
        let mut slot = TransitionSlot::new(DelayBehavior::Hold);
        let options = TransitionOptions::new()
            .to_value("alpha", 0.0)
            .with_duration(0.0);
        let started = slot.start(&options, live(1.0));

        assert_eq!(started.completion.state(), CompletionState::Completed);
        assert_eq!(started.initial.unwrap()["alpha"], 0.0);
        assert!(!slot.is_active());
        assert_eq!(slot.state(), TransitionState::Completed);
    }

    #[test]
    fn test_linear_progress_and_exact_end() {
        let mut slot = TransitionSlot::new(DelayBehavior::Hold);
        let options = TransitionOptions::new()
            .from_value("x", 0.0)
            .to_value("x", 10.0)
            .with_duration(100.0);
        let started = slot.start(&options, live(5.0));
        assert_eq!(started.initial.as_ref().unwrap()["x"], 0.0);

        let half = slot.poll(50.0);
        assert_eq!(half.status, TransitionStatus::Running);
        assert!((half.values.unwrap()["x"] - 5.0).abs() < 0.001);

        let end = slot.poll(60.0);
        assert_eq!(end.status, TransitionStatus::Completed);
        assert_eq!(end.values.unwrap()["x"], 10.0);
        assert!(started.completion.is_resolved());
        assert_eq!(slot.poll(16.0).status, TransitionStatus::Idle);
    }

    #[test]
    fn test_missing_side_falls_back_to_live_value() {
        let mut slot = TransitionSlot::new(DelayBehavior::Hold);
        let options = TransitionOptions::new()
            .to_value("y", 4.0)
            .with_duration(100.0)
            .with_easing("easeInQuad");
        slot.start(&options, live(2.0));
        let poll = slot.poll(50.0);
        // 2 + (4 - 2) * 0.25
        assert!((poll.values.unwrap()["y"] - 2.5).abs() < 0.001);
    }

    #[test]
    fn test_delay_behaviour() {
        let options = TransitionOptions::new()
            .from_value("x", 1.0)
            .to_value("x", 3.0)
            .with_duration(100.0)
            .with_delay(50.0);

        let mut hold = TransitionSlot::new(DelayBehavior::Hold);
        hold.start(&options, live(0.0));
        let poll = hold.poll(20.0);
        assert_eq!(poll.status, TransitionStatus::Delayed);
        assert!(poll.values.is_none());

        let mut report = TransitionSlot::new(DelayBehavior::ReportFrom);
        report.start(&options, live(0.0));
        let poll = report.poll(20.0);
        assert_eq!(poll.status, TransitionStatus::Delayed);
        assert_eq!(poll.values.unwrap()["x"], 1.0);

        let poll = report.poll(80.0);
        assert!((poll.values.unwrap()["x"] - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_superseded_transition_resolves_once() {
        let mut slot = TransitionSlot::new(DelayBehavior::Hold);
        let first = slot.start(
            &TransitionOptions::new().to_value("x", 1.0).with_duration(100.0),
            live(0.0),
        );
        let count = std::rc::Rc::new(std::cell::Cell::new(0));
        let counter = count.clone();
        first
            .completion
            .on_settled(move |_| counter.set(counter.get() + 1));

        let second = slot.start(
            &TransitionOptions::new().to_value("x", 2.0).with_duration(100.0),
            live(0.0),
        );
        assert_eq!(first.completion.state(), CompletionState::Cancelled);
        assert!(!second.completion.is_settled());

        slot.stop();
        slot.stop();
        assert_eq!(count.get(), 1);
        assert!(second.completion.is_resolved());
    }

    #[test]
    fn test_empty_values_do_not_stop_running_transition() {
        let mut slot: TransitionSlot<&'static str> = TransitionSlot::new(DelayBehavior::Hold);
        let running = slot.start(
            &TransitionOptions::new().to_value("x", 1.0).with_duration(100.0),
            live(0.0),
        );
        let empty = slot.start(&TransitionOptions::new().to_value("x", 1.0), |_| None);

        assert!(empty.completion.is_resolved());
        assert!(empty.initial.is_none());
        assert!(!running.completion.is_settled());
        assert!(slot.is_active());
    }

    #[test]
    fn test_merged_over() {
        let base = TransitionOptions::new()
            .from_value("alpha", 0.0)
            .with_duration(500.0)
            .with_easing("easeOutQuad");
        let call = TransitionOptions::new().to_value("alpha", 0.5).with_duration(200.0);
        let merged = call.merged_over(&base);

        assert_eq!(merged.from["alpha"], 0.0);
        assert_eq!(merged.to["alpha"], 0.5);
        assert_eq!(merged.timing.duration, Some(200.0));
        assert_eq!(merged.timing.easing.unwrap().name(), "easeOutQuad");
    }
}
