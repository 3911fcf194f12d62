//! 音频驱动的口型同步
//!
//! 宿主注入 `AudioBackend`（解码、播放、麦克风、频域数据），
//! `AudioAnalyzer` 每帧从频域数据算出音量供口型使用。

mod analyzer;

pub use analyzer::{decode_audio_payload, volume_from_frequency_data, AudioAnalyzer, AudioPoll, AudioSource};

use crate::Result;

/// 播放状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    /// 播放自然结束
    Ended,
    /// 解码或播放失败
    Failed(String),
}

/// 宿主音频后端
pub trait AudioBackend {
    /// 解码并开始播放
    fn play(&mut self, audio: &[u8]) -> Result<()>;

    /// 停止当前播放
    fn stop(&mut self);

    fn playback_state(&self) -> PlaybackState;

    fn start_microphone(&mut self) -> Result<()>;

    fn stop_microphone(&mut self);

    /// 填充字节频域数据（0..=255）
    fn byte_frequency_data(&mut self, bins: &mut [u8]);

    /// 释放音频上下文
    fn close(&mut self) {}
}
