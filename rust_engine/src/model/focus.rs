//! 焦点跟随
//!
//! 焦点目标在 [-1, 1]² 内，实际焦点以受限加速度平滑逼近目标。
//! 每帧把焦点换算成头部 / 身体 / 眼球参数。

use crate::config::get_config;
use crate::moc::CoreModel;

/// 焦点控制器
#[derive(Debug, Clone)]
pub struct FocusController {
    pub target_x: f32,
    pub target_y: f32,
    pub x: f32,
    pub y: f32,
    vx: f32,
    vy: f32,
    max_speed: f32,
    acceleration_time: f32,
    epsilon: f32,
}

impl FocusController {
    pub fn new() -> Self {
        let config = get_config();
        Self {
            target_x: 0.0,
            target_y: 0.0,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            max_speed: config.focus_max_speed,
            acceleration_time: config.focus_acceleration_time,
            epsilon: config.focus_epsilon,
        }
    }

    /// 设置目标，`instant` 时直接到位
    pub fn focus(&mut self, x: f32, y: f32, instant: bool) {
        self.target_x = x.clamp(-1.0, 1.0);
        self.target_y = y.clamp(-1.0, 1.0);

        if instant {
            self.x = self.target_x;
            self.y = self.target_y;
        }
    }

    /// 推进 dt 毫秒
    pub fn update(&mut self, dt: f32) {
        let dx = self.target_x - self.x;
        let dy = self.target_y - self.y;

        if dx.abs() < self.epsilon && dy.abs() < self.epsilon {
            return;
        }
        if dt <= 0.0 {
            return;
        }

        let d = (dx * dx + dy * dy).sqrt();
        let max_speed = self.max_speed / (1000.0 / dt);

        let mut ax = max_speed * (dx / d) - self.vx;
        let mut ay = max_speed * (dy / d) - self.vy;
        let a = (ax * ax + ay * ay).sqrt();
        let max_a = max_speed * self.acceleration_time * dt;

        if a > max_a {
            ax *= max_a / a;
            ay *= max_a / a;
        }

        self.vx += ax;
        self.vy += ay;

        // 保证能在到达目标前减速停下
        let v = (self.vx * self.vx + self.vy * self.vy).sqrt();
        let max_v = 0.5 * ((max_a * max_a + 8.0 * max_a * d).sqrt() - max_a);

        if v > max_v {
            self.vx *= max_v / v;
            self.vy *= max_v / v;
        }

        self.x += self.vx;
        self.y += self.vy;
    }
}

impl Default for FocusController {
    fn default() -> Self {
        Self::new()
    }
}

/// 焦点换算常数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusTuning {
    pub head_angle_range: f32,
    pub body_angle_range: f32,
    pub eye_compensation: f32,
}

impl Default for FocusTuning {
    fn default() -> Self {
        let config = get_config();
        Self {
            head_angle_range: config.head_angle_range,
            body_angle_range: config.body_angle_range,
            eye_compensation: config.eye_compensation,
        }
    }
}

/// 焦点相关参数下标（构造时解析一次）
#[derive(Debug, Clone, Copy, Default)]
pub struct FocusParameters {
    pub angle_x: Option<usize>,
    pub angle_y: Option<usize>,
    pub angle_z: Option<usize>,
    pub body_angle_x: Option<usize>,
    pub eye_ball_x: Option<usize>,
    pub eye_ball_y: Option<usize>,
}

impl FocusParameters {
    /// ids 顺序：angle x / y / z, body x, eye ball x / y
    pub fn resolve(core: &CoreModel, ids: [&str; 6]) -> Self {
        Self {
            angle_x: core.parameter_index(ids[0]),
            angle_y: core.parameter_index(ids[1]),
            angle_z: core.parameter_index(ids[2]),
            body_angle_x: core.parameter_index(ids[3]),
            eye_ball_x: core.parameter_index(ids[4]),
            eye_ball_y: core.parameter_index(ids[5]),
        }
    }
}

impl FocusTuning {
    /// 把焦点写入参数
    ///
    /// 眼睛锁定镜头时，眼球参数按当前头部角度反向设置，而不是叠加焦点。
    pub fn apply(&self, core: &mut CoreModel, params: &FocusParameters, x: f32, y: f32, eyes_locked: bool) {
        let head = self.head_angle_range;

        if let Some(i) = params.angle_x {
            core.add_parameter_value(i, x * head, 1.0);
        }
        if let Some(i) = params.angle_y {
            core.add_parameter_value(i, y * head, 1.0);
        }
        if let Some(i) = params.angle_z {
            core.add_parameter_value(i, x * y * -head, 1.0);
        }
        if let Some(i) = params.body_angle_x {
            core.add_parameter_value(i, x * self.body_angle_range, 1.0);
        }

        if eyes_locked {
            let angle_x = params.angle_x.map(|i| core.parameter_value(i)).unwrap_or(0.0);
            let angle_y = params.angle_y.map(|i| core.parameter_value(i)).unwrap_or(0.0);
            let compensation_x = (angle_x / head) * self.eye_compensation;
            let compensation_y = (angle_y / head) * self.eye_compensation;

            if let Some(i) = params.eye_ball_x {
                core.set_parameter_value(i, -compensation_x, 1.0);
            }
            if let Some(i) = params.eye_ball_y {
                core.set_parameter_value(i, -compensation_y, 1.0);
            }
        } else {
            if let Some(i) = params.eye_ball_x {
                core.add_parameter_value(i, x, 1.0);
            }
            if let Some(i) = params.eye_ball_y {
                core.add_parameter_value(i, y, 1.0);
            }
        }
    }
}
