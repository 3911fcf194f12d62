//! 语音与麦克风口型
//!
//! 每帧由 `update` 轮询分析器，把音量写入口型值。

use super::{Live2DModel, SpeakOptions};
use crate::audio::{AudioPoll, AudioSource};
use crate::transition::Completion;
use crate::{Live2dError, Result};

/// 正在播放的语音
pub(super) struct SpeechSession {
    completion: Completion,
    volume: f32,
    /// 结束后恢复默认表情（仅在切换过表情时）
    reset_expression: bool,
    on_finish: Option<Box<dyn FnOnce()>>,
    on_error: Option<Box<dyn FnOnce(&Live2dError)>>,
}

fn no_backend() -> Live2dError {
    Live2dError::Audio("No audio backend".into())
}

impl Live2DModel {
    /// 播放 base64 音频并驱动口型
    ///
    /// 返回的 Completion 在播放结束时完成，失败时 fail，被打断时 cancel。
    pub fn speak(&mut self, audio: &str, options: SpeakOptions) -> Completion {
        if !self.is_ready() {
            log::warn!("{} speak() before ready", self.tag());
            return Completion::completed();
        }
        self.stop_speaking();

        let SpeakOptions {
            volume,
            expression,
            reset_expression,
            on_finish,
            on_error,
        } = options;

        let expression_set = match &expression {
            Some(target) => self.expression(Some(target.as_id())),
            None => false,
        };
        self.start_lip_sync();

        let result = match self.audio.as_mut() {
            Some(analyzer) => analyzer.play_and_analyze(audio),
            None => Err(no_backend()),
        };
        match result {
            Ok(()) => {
                let completion = Completion::new();
                self.speech = Some(SpeechSession {
                    completion: completion.clone(),
                    volume,
                    reset_expression: reset_expression && expression_set,
                    on_finish,
                    on_error,
                });
                completion
            }
            Err(e) => {
                self.set_lip_sync_value(0.0);
                self.report_speech_error(&e, on_error);
                Completion::failed(e.to_string())
            }
        }
    }

    fn report_speech_error(&self, error: &Live2dError, on_error: Option<Box<dyn FnOnce(&Live2dError)>>) {
        match on_error {
            Some(callback) => callback(error),
            None => log::error!("{} {}", self.tag(), error),
        }
    }

    /// 停止语音，口型总是归零；正在等待的 Completion 被 cancel
    pub fn stop_speaking(&mut self) {
        if let Some(analyzer) = self.audio.as_mut() {
            analyzer.stop_playback();
        }
        self.set_lip_sync_value(0.0);
        if let Some(session) = self.speech.take() {
            session.completion.cancel();
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_some()
    }

    /// 用麦克风音量驱动口型，会打断正在播放的语音
    pub fn start_microphone_lip_sync(&mut self) -> Result<()> {
        self.stop_speaking();
        let result = match self.audio.as_mut() {
            Some(analyzer) => analyzer.start_microphone(),
            None => Err(no_backend()),
        };
        if let Err(e) = result {
            log::error!("{} {}", self.tag(), e);
            return Err(e);
        }
        self.start_lip_sync();
        Ok(())
    }

    pub fn stop_microphone_lip_sync(&mut self) {
        let Some(analyzer) = self.audio.as_mut() else {
            return;
        };
        if analyzer.source() == Some(AudioSource::Microphone) {
            analyzer.stop_microphone();
            self.set_lip_sync_value(0.0);
        }
    }

    pub fn is_microphone_active(&self) -> bool {
        self.audio
            .as_ref()
            .map_or(false, |a| a.source() == Some(AudioSource::Microphone))
    }

    pub(super) fn update_speech(&mut self) {
        let Some(analyzer) = self.audio.as_mut() else {
            return;
        };
        match analyzer.poll() {
            AudioPoll::Idle => {}
            AudioPoll::Volume(volume) => {
                let value = match &self.speech {
                    Some(session) => (volume * session.volume).min(1.0),
                    None => volume,
                };
                self.set_lip_sync_value(value);
            }
            AudioPoll::Ended => {
                self.set_lip_sync_value(0.0);
                if let Some(session) = self.speech.take() {
                    if session.reset_expression {
                        if let Some(internal) = self.internal.as_deref_mut() {
                            internal.reset_expression();
                        }
                    }
                    if let Some(callback) = session.on_finish {
                        callback();
                    }
                    session.completion.complete();
                }
            }
            AudioPoll::Failed(message) => {
                self.set_lip_sync_value(0.0);
                let error = Live2dError::Audio(message);
                if let Some(session) = self.speech.take() {
                    self.report_speech_error(&error, session.on_error);
                    session.completion.fail(error.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::audio::PlaybackState;
    use crate::display::Live2DModelOptions;
    use crate::factory::{Live2DFactory, MemoryAssetSource};
    use crate::testing::{cubism4_moc_json, cubism4_settings_json, png_bytes, ScriptedAudio, ScriptedAudioState};
    use crate::transition::CompletionState;

    fn model() -> (Live2DModel, Rc<RefCell<ScriptedAudioState>>) {
        let source = MemoryAssetSource::new()
            .with("haru/haru.model3.json", cubism4_settings_json())
            .with("haru/model.moc.json", cubism4_moc_json())
            .with("haru/textures/texture_00.png", png_bytes(2, 2, [255, 255, 255, 255]));
        let mut model =
            Live2DModel::load(&Live2DFactory::new(source), "haru/haru.model3.json", Live2DModelOptions::default())
                .unwrap();
        let (backend, state) = ScriptedAudio::new();
        model.set_audio_backend(Box::new(backend));
        (model, state)
    }

    #[test]
    fn test_speak_until_finished() {
        let (mut model, state) = model();
        let finished = Rc::new(Cell::new(false));
        let flag = finished.clone();
        let done = model.speak("AQID", SpeakOptions::new().with_volume(0.5).on_finish(move || flag.set(true)));
        assert!(model.is_speaking());
        assert!(model.is_lip_sync_enabled());
        assert_eq!(state.borrow().played, vec![vec![1, 2, 3]]);

        state.borrow_mut().playback = PlaybackState::Playing;
        state.borrow_mut().frequency = vec![255; 128];
        model.update(16.0);
        assert_eq!(model.lip_sync_value(), 0.5);

        state.borrow_mut().playback = PlaybackState::Ended;
        model.update(16.0);
        assert_eq!(model.lip_sync_value(), 0.0);
        assert!(finished.get());
        assert_eq!(done.state(), CompletionState::Completed);
        assert!(!model.is_speaking());
    }

    #[test]
    fn test_speak_play_error_calls_back() {
        let (mut model, state) = model();
        state.borrow_mut().fail_play = Some("decode error".into());
        let message = Rc::new(RefCell::new(String::new()));
        let sink = message.clone();
        let done = model.speak("AQID", SpeakOptions::new().on_error(move |e| *sink.borrow_mut() = e.to_string()));
        assert!(matches!(done.state(), CompletionState::Failed(_)));
        assert!(message.borrow().contains("decode error"));
        assert_eq!(model.lip_sync_value(), 0.0);
        assert!(!model.is_speaking());
    }

    #[test]
    fn test_playback_failure_mid_speech() {
        let (mut model, state) = model();
        let done = model.speak("AQID", SpeakOptions::default());
        state.borrow_mut().playback = PlaybackState::Failed("device lost".into());
        model.update(16.0);
        assert!(matches!(done.state(), CompletionState::Failed(_)));
        assert_eq!(model.lip_sync_value(), 0.0);
    }

    #[test]
    fn test_stop_speaking_cancels() {
        let (mut model, state) = model();
        let done = model.speak("AQID", SpeakOptions::default());
        model.stop_speaking();
        assert!(state.borrow().stopped);
        assert_eq!(done.state(), CompletionState::Cancelled);

        // 新语音打断旧语音
        let first = model.speak("AQID", SpeakOptions::default());
        let second = model.speak("AQID", SpeakOptions::default());
        assert_eq!(first.state(), CompletionState::Cancelled);
        assert_eq!(second.state(), CompletionState::Pending);
    }

    #[test]
    fn test_stop_speaking_always_closes_mouth() {
        let (mut model, _state) = model();
        model.start_lip_sync();
        model.set_lip_sync_value(0.7);
        assert_eq!(model.lip_sync_value(), 0.7);
        assert!(!model.is_speaking());
        model.stop_speaking();
        assert_eq!(model.lip_sync_value(), 0.0);
    }

    #[test]
    fn test_speak_without_backend_or_model() {
        let mut not_ready = Live2DModel::new(Live2DModelOptions::default());
        assert_eq!(not_ready.speak("AQID", SpeakOptions::default()).state(), CompletionState::Completed);

        let (mut model, _state) = model();
        model.audio = None;
        let failed = Rc::new(Cell::new(false));
        let flag = failed.clone();
        let done = model.speak("AQID", SpeakOptions::new().on_error(move |_| flag.set(true)));
        assert!(failed.get());
        assert!(matches!(done.state(), CompletionState::Failed(_)));
    }

    #[test]
    fn test_microphone_lip_sync() {
        let (mut model, state) = model();
        model.start_microphone_lip_sync().unwrap();
        assert!(model.is_microphone_active());

        state.borrow_mut().frequency = vec![90; 128];
        model.update(16.0);
        assert!((model.lip_sync_value() - 0.5f32.powf(0.8)).abs() < 1e-5);

        model.stop_microphone_lip_sync();
        assert!(!state.borrow().microphone);
        assert_eq!(model.lip_sync_value(), 0.0);
    }

    #[test]
    fn test_microphone_error_propagates() {
        let (mut model, state) = model();
        state.borrow_mut().fail_microphone = Some("denied".into());
        assert!(matches!(model.start_microphone_lip_sync(), Err(Live2dError::Audio(_))));
        assert!(!model.is_microphone_active());
    }
}
