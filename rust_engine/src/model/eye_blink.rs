//! 自动眨眼
//!
//! 间隔 → 闭合 → 闭眼 → 睁开 → 间隔。时间单位由调用方决定，
//! Cubism4 用秒，Cubism2 用毫秒。

use rand::Rng;

use crate::moc::CoreModel;

/// 各阶段时长
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeBlinkTiming {
    pub closing: f64,
    pub closed: f64,
    pub opening: f64,
    /// 平均间隔
    pub interval: f64,
}

impl EyeBlinkTiming {
    /// Cubism4（秒）
    pub const SECONDS: EyeBlinkTiming = EyeBlinkTiming {
        closing: 0.1,
        closed: 0.1,
        opening: 0.2,
        interval: 5.0,
    };

    /// Cubism2（毫秒）
    pub const MILLISECONDS: EyeBlinkTiming = EyeBlinkTiming {
        closing: 100.0,
        closed: 50.0,
        opening: 150.0,
        interval: 4000.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EyeState {
    First,
    Interval,
    Closing,
    Closed,
    Opening,
}

pub struct EyeBlink {
    timing: EyeBlinkTiming,
    parameters: Vec<usize>,
    state: EyeState,
    state_start: f64,
    next_blink: f64,
}

impl EyeBlink {
    pub fn new(timing: EyeBlinkTiming, parameters: Vec<usize>) -> Self {
        Self {
            timing,
            parameters,
            state: EyeState::First,
            state_start: 0.0,
            next_blink: 0.0,
        }
    }

    pub fn state(&self) -> EyeState {
        self.state
    }

    pub fn parameters(&self) -> &[usize] {
        &self.parameters
    }

    fn schedule(&mut self, now: f64) {
        let r: f64 = rand::thread_rng().gen();
        self.next_blink = now + r * (2.0 * self.timing.interval - 1.0).max(0.0);
    }

    /// 立即开始一次眨眼
    pub fn blink(&mut self, now: f64) {
        self.state = EyeState::Closing;
        self.state_start = now;
    }

    /// 推进到 now，返回本帧的睁眼值
    pub fn value_at(&mut self, now: f64) -> f32 {
        let progress = |start: f64, duration: f64| {
            if duration <= 0.0 {
                1.0
            } else {
                ((now - start) / duration) as f32
            }
        };

        match self.state {
            EyeState::First => {
                self.state = EyeState::Interval;
                self.schedule(now);
                1.0
            }
            EyeState::Interval => {
                if self.next_blink < now {
                    self.blink(now);
                }
                1.0
            }
            EyeState::Closing => {
                let t = progress(self.state_start, self.timing.closing);
                if t >= 1.0 {
                    self.state = EyeState::Closed;
                    self.state_start = now;
                    0.0
                } else {
                    1.0 - t
                }
            }
            EyeState::Closed => {
                let t = progress(self.state_start, self.timing.closed);
                if t >= 1.0 {
                    self.state = EyeState::Opening;
                    self.state_start = now;
                }
                0.0
            }
            EyeState::Opening => {
                let t = progress(self.state_start, self.timing.opening);
                if t >= 1.0 {
                    self.state = EyeState::Interval;
                    self.schedule(now);
                    1.0
                } else {
                    t
                }
            }
        }
    }

    pub fn update(&mut self, core: &mut CoreModel, now: f64) {
        let value = self.value_at(now);
        for &index in &self.parameters {
            core.set_parameter_value(index, value, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_opens_eyes() {
        let mut blink = EyeBlink::new(EyeBlinkTiming::SECONDS, vec![]);
        assert_eq!(blink.value_at(0.0), 1.0);
        assert_eq!(blink.state(), EyeState::Interval);
    }

    #[test]
    fn test_blink_cycle_seconds() {
        let mut blink = EyeBlink::new(EyeBlinkTiming::SECONDS, vec![]);
        blink.value_at(0.0);
        blink.blink(1.0);

        assert!((blink.value_at(1.05) - 0.5).abs() < 0.001);
        assert_eq!(blink.value_at(1.12), 0.0);
        assert_eq!(blink.state(), EyeState::Closed);
        assert_eq!(blink.value_at(1.25), 0.0);
        assert_eq!(blink.state(), EyeState::Opening);
        assert!((blink.value_at(1.35) - 0.5).abs() < 0.001);
        assert_eq!(blink.value_at(1.5), 1.0);
        assert_eq!(blink.state(), EyeState::Interval);
    }

    #[test]
    fn test_blink_cycle_milliseconds() {
        let mut blink = EyeBlink::new(EyeBlinkTiming::MILLISECONDS, vec![]);
        blink.value_at(0.0);
        blink.blink(1000.0);

        assert!((blink.value_at(1050.0) - 0.5).abs() < 0.001);
        assert_eq!(blink.value_at(1100.0), 0.0);
        assert_eq!(blink.value_at(1150.0), 0.0);
        assert_eq!(blink.state(), EyeState::Opening);
    }

    #[test]
    fn test_interval_eventually_blinks() {
        let mut blink = EyeBlink::new(EyeBlinkTiming::SECONDS, vec![]);
        blink.value_at(0.0);
        blink.value_at(10.0);
        assert_eq!(blink.state(), EyeState::Closing);
    }
}
