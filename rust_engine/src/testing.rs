//! 测试替身与样例数据
//!
//! 记录型 GL 上下文、可编排的音频后端，以及两种格式的最小模型。

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Wake, Waker};

use glam::{Affine2, Mat4};

use crate::audio::{AudioBackend, PlaybackState};
use crate::gl::{GlContext, GlFramebufferId, GlTextureId, MeshDrawCall, Renderer};
use crate::texture::Texture;
use crate::{Live2dError, Result};

// ====== 异步 ======

struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

pub fn noop_waker() -> Waker {
    Waker::from(Arc::new(NoopWake))
}

// ====== 纹理 ======

/// 纯色 PNG
pub fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

// ====== GL ======

#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub texture: Option<GlTextureId>,
    pub mvp: Mat4,
    pub opacity: f32,
    pub premultiplied_alpha: bool,
    pub culling: bool,
    pub writing_mask: bool,
}

/// 只记录调用的 GL 上下文
#[derive(Debug, Default)]
pub struct RecordingGl {
    pub draws: Vec<RecordedDraw>,
    pub bound_framebuffer: Option<GlFramebufferId>,
    pub uploads: usize,
    pub flip_y: Vec<bool>,
    pub viewports: Vec<[f32; 4]>,
    pub deleted: Vec<GlTextureId>,
    pub framebuffers: usize,
    pub fail_upload: bool,
    next_id: u32,
}

impl RecordingGl {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GlContext for RecordingGl {
    fn pixel_store_flip_y(&mut self, flip: bool) {
        self.flip_y.push(flip);
    }

    fn upload_texture(&mut self, _texture: &Texture) -> Result<GlTextureId> {
        if self.fail_upload {
            return Err(Live2dError::Context("texture upload failed".into()));
        }
        self.uploads += 1;
        Ok(self.next_id())
    }

    fn delete_texture(&mut self, texture: GlTextureId) {
        self.deleted.push(texture);
    }

    fn viewport(&mut self, rect: [f32; 4]) {
        self.viewports.push(rect);
    }

    fn framebuffer_binding(&self) -> Option<GlFramebufferId> {
        self.bound_framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GlFramebufferId>) {
        self.bound_framebuffer = framebuffer;
    }

    fn create_framebuffer(&mut self, _width: u32, _height: u32) -> Result<(GlFramebufferId, GlTextureId)> {
        self.framebuffers += 1;
        let framebuffer = self.next_id();
        let texture = self.next_id();
        Ok((framebuffer, texture))
    }

    fn set_culling(&mut self, _enabled: bool) {}

    fn draw_mesh(&mut self, call: &MeshDrawCall<'_>) {
        self.draws.push(RecordedDraw {
            texture: call.texture,
            mvp: call.mvp,
            opacity: call.opacity,
            premultiplied_alpha: call.premultiplied_alpha,
            culling: call.culling,
            writing_mask: call.writing_mask,
        });
    }
}

/// 把调用转发到共享的 `RecordingGl`，测试在渲染之间检查它
struct SharedGl(Rc<RefCell<RecordingGl>>);

impl GlContext for SharedGl {
    fn pixel_store_flip_y(&mut self, flip: bool) {
        self.0.borrow_mut().pixel_store_flip_y(flip);
    }

    fn upload_texture(&mut self, texture: &Texture) -> Result<GlTextureId> {
        self.0.borrow_mut().upload_texture(texture)
    }

    fn delete_texture(&mut self, texture: GlTextureId) {
        self.0.borrow_mut().delete_texture(texture);
    }

    fn viewport(&mut self, rect: [f32; 4]) {
        self.0.borrow_mut().viewport(rect);
    }

    fn framebuffer_binding(&self) -> Option<GlFramebufferId> {
        self.0.borrow().framebuffer_binding()
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GlFramebufferId>) {
        self.0.borrow_mut().bind_framebuffer(framebuffer);
    }

    fn create_framebuffer(&mut self, width: u32, height: u32) -> Result<(GlFramebufferId, GlTextureId)> {
        self.0.borrow_mut().create_framebuffer(width, height)
    }

    fn set_culling(&mut self, enabled: bool) {
        self.0.borrow_mut().set_culling(enabled);
    }

    fn draw_mesh(&mut self, call: &MeshDrawCall<'_>) {
        self.0.borrow_mut().draw_mesh(call);
    }
}

pub struct RecordingRenderer {
    pub context_uid: u64,
    pub gc_count: u64,
    pub screen: Option<(f32, f32)>,
    gl: SharedGl,
}

impl RecordingRenderer {
    pub fn shared(context_uid: u64) -> (Rc<RefCell<RecordingRenderer>>, Rc<RefCell<RecordingGl>>) {
        let gl = Rc::new(RefCell::new(RecordingGl::default()));
        let renderer = RecordingRenderer {
            context_uid,
            gc_count: 0,
            screen: None,
            gl: SharedGl(gl.clone()),
        };
        (Rc::new(RefCell::new(renderer)), gl)
    }
}

impl Renderer for RecordingRenderer {
    fn context_uid(&self) -> u64 {
        self.context_uid
    }

    fn gl(&mut self) -> &mut dyn GlContext {
        &mut self.gl
    }

    fn screen_size(&self) -> Option<(f32, f32)> {
        self.screen
    }

    fn projection(&self) -> Option<Affine2> {
        None
    }

    fn texture_gc_count(&self) -> u64 {
        self.gc_count
    }
}

// ====== 音频 ======

#[derive(Debug)]
pub struct ScriptedAudioState {
    pub played: Vec<Vec<u8>>,
    pub playback: PlaybackState,
    /// 复制进频段，不足部分补 0
    pub frequency: Vec<u8>,
    pub fail_play: Option<String>,
    pub fail_microphone: Option<String>,
    pub microphone: bool,
    pub stopped: bool,
    pub closed: bool,
}

impl Default for ScriptedAudioState {
    fn default() -> Self {
        Self {
            played: Vec::new(),
            playback: PlaybackState::Idle,
            frequency: Vec::new(),
            fail_play: None,
            fail_microphone: None,
            microphone: false,
            stopped: false,
            closed: false,
        }
    }
}

/// 由测试逐帧编排状态的音频后端
pub struct ScriptedAudio {
    state: Rc<RefCell<ScriptedAudioState>>,
}

impl ScriptedAudio {
    pub fn new() -> (Self, Rc<RefCell<ScriptedAudioState>>) {
        let state = Rc::new(RefCell::new(ScriptedAudioState::default()));
        (Self { state: state.clone() }, state)
    }
}

impl AudioBackend for ScriptedAudio {
    fn play(&mut self, audio: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.fail_play.clone() {
            return Err(Live2dError::Audio(message));
        }
        state.played.push(audio.to_vec());
        state.playback = PlaybackState::Idle;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.stopped = true;
        state.playback = PlaybackState::Idle;
    }

    fn playback_state(&self) -> PlaybackState {
        self.state.borrow().playback.clone()
    }

    fn start_microphone(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if let Some(message) = state.fail_microphone.clone() {
            return Err(Live2dError::Audio(message));
        }
        state.microphone = true;
        Ok(())
    }

    fn stop_microphone(&mut self) {
        self.state.borrow_mut().microphone = false;
    }

    fn byte_frequency_data(&mut self, bins: &mut [u8]) {
        let state = self.state.borrow();
        for (i, bin) in bins.iter_mut().enumerate() {
            *bin = state.frequency.get(i).copied().unwrap_or(0);
        }
    }

    fn close(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

// ====== 样例模型 ======

/// Cubism4：400x300 画布，100 像素 / 单位
pub fn cubism4_moc_json() -> String {
    r#"{
        "canvas": { "width": 400, "height": 300, "pixelsPerUnit": 100 },
        "parameters": [
            { "id": "ParamAngleX", "min": -30, "max": 30 },
            { "id": "ParamAngleY", "min": -30, "max": 30 },
            { "id": "ParamAngleZ", "min": -30, "max": 30 },
            { "id": "ParamBodyAngleX", "min": -10, "max": 10 },
            { "id": "ParamEyeBallX", "min": -1, "max": 1 },
            { "id": "ParamEyeBallY", "min": -1, "max": 1 },
            { "id": "ParamEyeLOpen", "min": 0, "max": 1, "default": 0 },
            { "id": "ParamEyeROpen", "min": 0, "max": 1, "default": 0 },
            { "id": "ParamBreath", "min": 0, "max": 1 },
            { "id": "ParamMouthOpenY", "min": 0, "max": 1 }
        ],
        "parts": [
            { "id": "PartCore" },
            { "id": "PartArm", "parent": "PartCore" }
        ],
        "drawables": [
            {
                "id": "ArtMesh0",
                "textureIndex": 0,
                "vertices": [-2, 1.5, 2, 1.5, 2, -1.5, -2, -1.5],
                "uvs": [0, 0, 1, 0, 1, 1, 0, 1],
                "indices": [0, 1, 2, 0, 2, 3],
                "parentPart": "PartCore",
                "deformers": [{
                    "parameter": "ParamAngleX",
                    "keys": [-30, 0, 30],
                    "offsets": [
                        [-0.2, 0, -0.2, 0, -0.2, 0, -0.2, 0],
                        [0, 0, 0, 0, 0, 0, 0, 0],
                        [0.2, 0, 0.2, 0, 0.2, 0, 0.2, 0]
                    ]
                }]
            },
            {
                "id": "HitAreaBody",
                "textureIndex": 0,
                "vertices": [-0.5, 0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5],
                "uvs": [0.25, 0.25, 0.75, 0.25, 0.75, 0.75, 0.25, 0.75],
                "indices": [0, 1, 2, 0, 2, 3],
                "parentPart": "PartArm",
                "doubleSided": true
            }
        ]
    }"#
    .to_string()
}

pub fn cubism4_settings_json() -> String {
    r#"{
        "Version": 3,
        "FileReferences": {
            "Moc": "model.moc.json",
            "Textures": ["textures/texture_00.png"],
            "Motions": {
                "idle": [{ "File": "motions/idle.motion3.json" }]
            }
        },
        "Groups": [
            { "Target": "Parameter", "Name": "LipSync", "Ids": ["ParamMouthOpenY"] },
            { "Target": "Parameter", "Name": "EyeBlink", "Ids": ["ParamEyeLOpen", "ParamEyeROpen"] }
        ],
        "HitAreas": [{ "Id": "HitAreaBody", "Name": "Body" }],
        "Layout": { "CenterX": 0, "Width": 2 }
    }"#
    .to_string()
}

/// Cubism2：顶点直接是画布像素
pub fn cubism2_moc_json() -> String {
    r#"{
        "canvas": { "width": 600, "height": 600 },
        "parameters": [
            { "id": "PARAM_ANGLE_X", "min": -30, "max": 30 },
            { "id": "PARAM_ANGLE_Y", "min": -30, "max": 30 },
            { "id": "PARAM_ANGLE_Z", "min": -30, "max": 30 },
            { "id": "PARAM_BODY_ANGLE_X", "min": -10, "max": 10 },
            { "id": "PARAM_EYE_BALL_X", "min": -1, "max": 1 },
            { "id": "PARAM_EYE_BALL_Y", "min": -1, "max": 1 },
            { "id": "PARAM_EYE_L_OPEN", "min": 0, "max": 1, "default": 0 },
            { "id": "PARAM_EYE_R_OPEN", "min": 0, "max": 1, "default": 0 },
            { "id": "PARAM_BREATH", "min": 0, "max": 1 },
            { "id": "PARAM_MOUTH_OPEN_Y", "min": 0, "max": 1 },
            { "id": "PARAM_HAIR_FRONT", "min": -1, "max": 1 },
            { "id": "VISIBLE:PARTS_01_ARM_L_A", "min": 0, "max": 1, "default": 1 },
            { "id": "VISIBLE:PARTS_01_ARM_L_B", "min": 0, "max": 1, "default": 0 }
        ],
        "parts": [
            { "id": "PARTS_01_ARM_L_A" },
            { "id": "PARTS_01_ARM_L_B" },
            { "id": "PARTS_01_HAND_L_A" },
            { "id": "PARTS_01_HAT" }
        ],
        "drawables": [
            {
                "id": "D_REF.BODY",
                "vertices": [200, 200, 400, 200, 400, 500, 200, 500],
                "uvs": [0, 0, 1, 0, 1, 1, 0, 1],
                "indices": [0, 1, 2, 0, 2, 3]
            },
            {
                "id": "D_HAIR",
                "vertices": [220, 60, 380, 60, 380, 220, 220, 220],
                "uvs": [0, 0, 1, 0, 1, 1, 0, 1],
                "indices": [0, 1, 2, 0, 2, 3],
                "renderOrder": 2,
                "deformers": [{
                    "parameter": "PARAM_HAIR_FRONT",
                    "keys": [-1, 1],
                    "offsets": [
                        [-10, 0, -10, 0, 0, 0, 0, 0],
                        [10, 0, 10, 0, 0, 0, 0, 0]
                    ]
                }]
            }
        ]
    }"#
    .to_string()
}

pub fn cubism2_settings_json() -> String {
    r#"{
        "type": "Live2D Model Setting",
        "model": "model.moc.json",
        "textures": ["textures/texture_00.png"],
        "motions": {
            "idle": [{ "file": "motions/idle.mtn" }]
        },
        "hit_areas": [{ "name": "body", "id": "D_REF.BODY" }],
        "init_param": [{ "id": "PARAM_ANGLE_X", "value": 10 }],
        "layout": { "center_x": 0, "width": 2 }
    }"#
    .to_string()
}
