//! 贝塞尔曲线插值

/// 三次贝塞尔段
///
/// 时间轴控制点归一化到 [0, 1]，值轴保留原始值。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BezierCurve {
    pub x1: f32,
    pub x2: f32,
    pub v0: f32,
    pub v1: f32,
    pub v2: f32,
    pub v3: f32,
}

impl BezierCurve {
    /// 由四个 (时间, 值) 控制点构造
    pub fn from_points(p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) -> Self {
        let span = p3.0 - p0.0;
        let (x1, x2) = if span.abs() < f32::EPSILON {
            (1.0 / 3.0, 2.0 / 3.0)
        } else {
            ((p1.0 - p0.0) / span, (p2.0 - p0.0) / span)
        };
        Self {
            x1: x1.clamp(0.0, 1.0),
            x2: x2.clamp(0.0, 1.0),
            v0: p0.1,
            v1: p1.1,
            v2: p2.1,
            v3: p3.1,
        }
    }

    /// t 为段内归一化时间
    pub fn evaluate(&self, t: f32) -> f32 {
        if t <= 0.0 {
            return self.v0;
        }
        if t >= 1.0 {
            return self.v3;
        }
        let s = self.solve(t);
        cubic(self.v0, self.v1, self.v2, self.v3, s)
    }

    /// 牛顿法求 x(s) = t
    fn solve(&self, t: f32) -> f32 {
        let mut s = t;
        for _ in 0..15 {
            let x = cubic(0.0, self.x1, self.x2, 1.0, s);
            let dx = self.bezier_dx(s);

            if dx.abs() < 1e-6 {
                break;
            }

            let new_s = (s - (x - t) / dx).clamp(0.0, 1.0);
            if (new_s - s).abs() < 1e-6 {
                s = new_s;
                break;
            }
            s = new_s;
        }
        s
    }

    fn bezier_dx(&self, s: f32) -> f32 {
        let s2 = s * s;
        let t = 1.0 - s;

        3.0 * t * t * self.x1 + 6.0 * t * s * (self.x2 - self.x1) + 3.0 * s2 * (1.0 - self.x2)
    }
}

fn cubic(p0: f32, p1: f32, p2: f32, p3: f32, s: f32) -> f32 {
    let t = 1.0 - s;
    t * t * t * p0 + 3.0 * t * t * s * p1 + 3.0 * t * s * s * p2 + s * s * s * p3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_control_points() {
        let curve = BezierCurve::from_points((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0));
        assert!((curve.evaluate(0.5) - 1.5).abs() < 0.001);
        assert!((curve.evaluate(0.25) - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_endpoints() {
        let curve = BezierCurve::from_points((0.0, 2.0), (0.2, 8.0), (0.8, -1.0), (1.0, 5.0));
        assert_eq!(curve.evaluate(0.0), 2.0);
        assert_eq!(curve.evaluate(1.0), 5.0);
    }

    #[test]
    fn test_ease_curve_is_symmetric() {
        let curve = BezierCurve::from_points((0.0, 0.0), (0.5, 0.0), (0.5, 1.0), (1.0, 1.0));
        assert!((curve.evaluate(0.5) - 0.5).abs() < 0.001);
        assert!(curve.evaluate(0.2) < 0.2);
        assert!(curve.evaluate(0.8) > 0.8);
    }
}
