//! 运行时全局配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 单个模型的选项见 `Live2DModelOptions` / `InternalModelOptions`。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// 运行时配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    // ========== 焦点 ==========
    /// 头部角度范围（focus.x * 此值），默认 30.0
    pub head_angle_range: f32,
    /// 身体角度范围（focus.x * 此值），默认 10.0
    pub body_angle_range: f32,
    /// 眼睛锁定镜头时的补偿倍率，默认 1.0
    pub eye_compensation: f32,
    /// 焦点跟随最大速度，默认 40 / 7.5
    pub focus_max_speed: f32,
    /// 焦点加速时间（1 / 毫秒），默认 1 / 150
    pub focus_acceleration_time: f32,
    /// 焦点到达判定阈值，默认 0.01
    pub focus_epsilon: f32,

    // ========== 口型 ==========
    /// Cubism4 口型参数叠加权重，默认 0.8
    pub cubism4_lip_sync_weight: f32,

    // ========== 动作 / 表情 ==========
    /// 动作淡入淡出时间（毫秒），默认 500
    pub motion_fading_duration: f64,
    /// 待机动作淡入淡出时间（毫秒），默认 2000
    pub idle_motion_fading_duration: f64,
    /// 表情淡入淡出时间（毫秒），默认 500
    pub expression_fading_duration: f64,

    // ========== 物理 ==========
    /// 摆锤空气阻力，默认 5.0
    pub physics_air_resistance: f32,
    /// 小于此值的水平位移归零，默认 0.001
    pub physics_movement_threshold: f32,

    // ========== 过渡 ==========
    /// 默认过渡时长（毫秒），默认 500
    pub transition_duration: f64,

    // ========== 音频分析 ==========
    /// FFT 大小（频段数为一半），默认 256
    pub audio_fft_size: usize,
    /// 平均幅值归一化除数，默认 180
    pub audio_normalize_divisor: f32,
    /// 压缩指数，默认 0.8
    pub audio_exponent: f32,
    /// 噪声门限，低于此值视为静音，默认 0.05
    pub audio_noise_floor: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            // ====== 焦点 ======
            // 这几个常数是按视觉效果调出来的，按模型需要可以改
            head_angle_range: 30.0,
            body_angle_range: 10.0,
            eye_compensation: 1.0,
            focus_max_speed: 40.0 / 7.5,
            focus_acceleration_time: 1.0 / (0.15 * 1000.0),
            focus_epsilon: 0.01,

            // ====== 口型 ======
            cubism4_lip_sync_weight: 0.8,

            // ====== 动作 / 表情 ======
            motion_fading_duration: 500.0,
            idle_motion_fading_duration: 2000.0,
            expression_fading_duration: 500.0,

            // ====== 物理 ======
            physics_air_resistance: 5.0,
            physics_movement_threshold: 0.001,

            // ====== 过渡 ======
            transition_duration: 500.0,

            // ====== 音频分析 ======
            // 除数从 128 提到 180、指数从 0.5 提到 0.8，降低灵敏度
            audio_fft_size: 256,
            audio_normalize_divisor: 180.0,
            audio_exponent: 0.8,
            audio_noise_floor: 0.05,
        }
    }
}

/// 全局配置实例
static RUNTIME_CONFIG: Lazy<RwLock<RuntimeConfig>> =
    Lazy::new(|| RwLock::new(RuntimeConfig::default()));

/// 获取当前配置（只读）
pub fn get_config() -> RuntimeConfig {
    match RUNTIME_CONFIG.read() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: RuntimeConfig) {
    match RUNTIME_CONFIG.write() {
        Ok(mut guard) => *guard = config,
        Err(poisoned) => *poisoned.into_inner() = config,
    }
}

/// 重置为默认配置
pub fn reset_config() {
    set_config(RuntimeConfig::default());
}
