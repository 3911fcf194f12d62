//! 动作队列
//!
//! 同一时刻可能有多个条目：新条目淡入，被替换的条目淡出直到结束。
//! 后加入的条目后应用，覆盖先前条目的结果。

use std::f64::consts::PI;
use std::rc::Rc;

use crate::moc::CoreModel;

/// 可播放的片段（动作或表情）
///
/// 时间单位由所属模型决定，队列只做比较和相减。
pub trait MotionClip {
    /// 时长，`None` 表示循环或常驻
    fn duration(&self) -> Option<f64>;

    fn fade_in_time(&self) -> f64;

    fn fade_out_time(&self) -> f64;

    /// 按播放时间和淡入淡出权重写参数
    fn apply(&self, core: &mut CoreModel, elapsed: f64, weight: f32);
}

/// 条目状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionEntryState {
    /// 尚未开始（第一次更新时记录开始时间）
    Pending,
    FadingIn,
    Playing,
    FadingOut,
    Finished,
}

struct MotionEntry {
    clip: Rc<dyn MotionClip>,
    state: MotionEntryState,
    start_time: f64,
    end_time: Option<f64>,
    /// 实际权重（考虑淡入淡出）
    effective_weight: f32,
}

/// 0→1 的正弦缓动，区间外钳制
fn ease_sine(value: f64) -> f32 {
    if value <= 0.0 {
        0.0
    } else if value >= 1.0 {
        1.0
    } else {
        (0.5 - 0.5 * (value * PI).cos()) as f32
    }
}

impl MotionEntry {
    fn new(clip: Rc<dyn MotionClip>) -> Self {
        Self {
            clip,
            state: MotionEntryState::Pending,
            start_time: 0.0,
            end_time: None,
            effective_weight: 0.0,
        }
    }

    /// 请求淡出，已有更早的结束时间时保持不变
    fn fade_out(&mut self, now: f64) {
        if self.state == MotionEntryState::Pending {
            self.state = MotionEntryState::Finished;
            return;
        }
        let new_end = now + self.clip.fade_out_time();
        if self.end_time.map_or(true, |end| new_end < end) {
            self.end_time = Some(new_end);
        }
        self.state = MotionEntryState::FadingOut;
    }

    fn update(&mut self, core: &mut CoreModel, now: f64) -> bool {
        if self.state == MotionEntryState::Finished {
            return false;
        }

        if self.state == MotionEntryState::Pending {
            self.start_time = now;
            self.end_time = self.clip.duration().map(|d| now + d);
            self.state = MotionEntryState::FadingIn;
        }

        let elapsed = now - self.start_time;
        let fade_in = self.clip.fade_in_time();
        let fade_out = self.clip.fade_out_time();

        let fade_in_weight = if fade_in <= 0.0 { 1.0 } else { ease_sine(elapsed / fade_in) };
        let fade_out_weight = match self.end_time {
            Some(end) if fade_out > 0.0 => ease_sine((end - now) / fade_out),
            _ => 1.0,
        };

        self.effective_weight = fade_in_weight * fade_out_weight;

        if self.state == MotionEntryState::FadingIn && fade_in_weight >= 1.0 {
            self.state = MotionEntryState::Playing;
        }
        if self.state == MotionEntryState::Playing && fade_out_weight < 1.0 {
            self.state = MotionEntryState::FadingOut;
        }

        self.clip.apply(core, elapsed, self.effective_weight);

        if let Some(end) = self.end_time {
            if end <= now {
                self.state = MotionEntryState::Finished;
            }
        }
        true
    }
}

/// 片段队列
pub struct MotionQueue {
    entries: Vec<MotionEntry>,
    last_time: f64,
}

impl MotionQueue {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            last_time: 0.0,
        }
    }

    /// 加入新片段，已有条目开始淡出
    pub fn start(&mut self, clip: Rc<dyn MotionClip>) {
        let now = self.last_time;
        for entry in &mut self.entries {
            entry.fade_out(now);
        }
        self.entries.retain(|e| e.state != MotionEntryState::Finished);
        self.entries.push(MotionEntry::new(clip));
    }

    /// 所有条目开始淡出
    pub fn fade_out_all(&mut self) {
        let now = self.last_time;
        for entry in &mut self.entries {
            entry.fade_out(now);
        }
        self.entries.retain(|e| e.state != MotionEntryState::Finished);
    }

    /// 立即清空
    pub fn stop_all(&mut self) {
        self.entries.clear();
    }

    /// 推进到 now，有条目被应用时返回 true
    pub fn update(&mut self, core: &mut CoreModel, now: f64) -> bool {
        self.last_time = now;
        let mut updated = false;
        for entry in &mut self.entries {
            updated |= entry.update(core, now);
        }
        self.entries.retain(|e| e.state != MotionEntryState::Finished);
        updated
    }

    pub fn is_finished(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最新条目的状态
    pub fn current_state(&self) -> Option<MotionEntryState> {
        self.entries.last().map(|e| e.state)
    }

    /// 最新条目的实际权重
    pub fn current_weight(&self) -> f32 {
        self.entries.last().map(|e| e.effective_weight).unwrap_or(0.0)
    }
}

impl Default for MotionQueue {
    fn default() -> Self {
        Self::new()
    }
}
