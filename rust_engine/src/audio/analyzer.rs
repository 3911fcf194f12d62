//! 音量分析
//!
//! 音量 = (频段平均值 / 除数) 钳制到 1 后取指数，低于噪声门限归零。
//! 常数见 `RuntimeConfig` 的音频分析部分。

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::{AudioBackend, PlaybackState};
use crate::config::{get_config, RuntimeConfig};
use crate::{Live2dError, Result};

/// 当前分析的音源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    Speech,
    Microphone,
}

/// 单帧分析结果
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPoll {
    /// 没有音源
    Idle,
    Volume(f32),
    /// 语音播放结束，音源已清除
    Ended,
    /// 语音播放失败，音源已清除
    Failed(String),
}

/// 由字节频域数据计算音量
pub fn volume_from_frequency_data(bins: &[u8], config: &RuntimeConfig) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    let average = sum as f32 / bins.len() as f32;

    let normalized = (average / config.audio_normalize_divisor).min(1.0);
    let volume = normalized.powf(config.audio_exponent);
    if volume < config.audio_noise_floor {
        0.0
    } else {
        volume
    }
}

/// 解码 base64 音频，允许带 `data:...;base64,` 前缀
pub fn decode_audio_payload(payload: &str) -> Result<Vec<u8>> {
    let encoded = match payload.split_once(',') {
        Some((_, data)) if !data.is_empty() => data,
        _ => payload,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Live2dError::Audio(format!("Invalid base64 audio: {}", e)))
}

pub struct AudioAnalyzer {
    backend: Box<dyn AudioBackend>,
    bins: Vec<u8>,
    source: Option<AudioSource>,
    config: RuntimeConfig,
}

impl AudioAnalyzer {
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        let config = get_config();
        Self {
            backend,
            bins: vec![0; (config.audio_fft_size / 2).max(1)],
            source: None,
            config,
        }
    }

    pub fn source(&self) -> Option<AudioSource> {
        self.source
    }

    /// 播放 base64 音频并开始分析
    pub fn play_and_analyze(&mut self, payload: &str) -> Result<()> {
        let audio = decode_audio_payload(payload)?;
        self.stop_playback();
        self.stop_microphone();

        self.backend
            .play(&audio)
            .map_err(|e| Live2dError::Audio(format!("Failed to play audio: {}", e)))?;
        self.source = Some(AudioSource::Speech);
        Ok(())
    }

    pub fn start_microphone(&mut self) -> Result<()> {
        self.stop_playback();
        self.backend
            .start_microphone()
            .map_err(|e| Live2dError::Audio(format!("Failed to access microphone: {}", e)))?;
        self.source = Some(AudioSource::Microphone);
        Ok(())
    }

    pub fn stop_microphone(&mut self) {
        if self.source == Some(AudioSource::Microphone) {
            self.backend.stop_microphone();
            self.source = None;
        }
    }

    pub fn stop_playback(&mut self) {
        if self.source == Some(AudioSource::Speech) {
            self.backend.stop();
            self.source = None;
        }
    }

    /// 每帧调用一次
    pub fn poll(&mut self) -> AudioPoll {
        match self.source {
            None => AudioPoll::Idle,
            Some(AudioSource::Microphone) => AudioPoll::Volume(self.sample()),
            Some(AudioSource::Speech) => match self.backend.playback_state() {
                PlaybackState::Playing => AudioPoll::Volume(self.sample()),
                // 还没开始出声
                PlaybackState::Idle => AudioPoll::Volume(0.0),
                PlaybackState::Ended => {
                    self.source = None;
                    AudioPoll::Ended
                }
                PlaybackState::Failed(message) => {
                    self.source = None;
                    AudioPoll::Failed(message)
                }
            },
        }
    }

    fn sample(&mut self) -> f32 {
        self.backend.byte_frequency_data(&mut self.bins);
        volume_from_frequency_data(&self.bins, &self.config)
    }

    /// 停止全部音源并关闭后端
    pub fn destroy(&mut self) {
        self.stop_microphone();
        self.stop_playback();
        self.backend.close();
    }
}
