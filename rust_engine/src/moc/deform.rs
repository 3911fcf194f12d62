//! 关键帧形变

use super::data::{DeformerData, DrawableData};

/// 在升序关键值中定位：返回 (左下标, 右下标, 比例)
///
/// 超出范围时钳制到两端。
pub fn locate_key(keys: &[f32], value: f32) -> Option<(usize, usize, f32)> {
    let last = keys.len().checked_sub(1)?;
    if value <= keys[0] {
        return Some((0, 0, 0.0));
    }
    if value >= keys[last] {
        return Some((last, last, 0.0));
    }
    for i in 0..last {
        let (k0, k1) = (keys[i], keys[i + 1]);
        if value >= k0 && value <= k1 {
            let span = k1 - k0;
            let t = if span > 0.0 { (value - k0) / span } else { 0.0 };
            return Some((i, i + 1, t));
        }
    }
    Some((last, last, 0.0))
}

/// 把单个形变器叠加到顶点上，返回不透明度系数
fn apply_deformer(deformer: &DeformerData, value: f32, out: &mut [f32]) -> f32 {
    let Some((i0, i1, t)) = locate_key(&deformer.keys, value) else {
        return 1.0;
    };

    if !deformer.offsets.is_empty() {
        let a = &deformer.offsets[i0];
        let b = &deformer.offsets[i1];
        for ((dst, &oa), &ob) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
            *dst += oa + (ob - oa) * t;
        }
    }

    if deformer.opacities.is_empty() {
        1.0
    } else {
        let a = deformer.opacities[i0];
        let b = deformer.opacities[i1];
        a + (b - a) * t
    }
}

/// 计算可绘制对象的当前顶点，返回形变器的不透明度系数
///
/// `lookup` 按参数 id 返回当前值；找不到的参数按默认姿态处理（不形变）。
pub fn deform_drawable(
    drawable: &DrawableData,
    lookup: impl Fn(&str) -> Option<f32>,
    out: &mut Vec<f32>,
) -> f32 {
    out.clear();
    out.extend_from_slice(&drawable.vertices);

    let mut opacity = 1.0;
    for deformer in &drawable.deformers {
        if let Some(value) = lookup(&deformer.parameter) {
            opacity *= apply_deformer(deformer, value, out);
        }
    }
    opacity
}
