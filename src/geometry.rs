/// 2D点（フレームピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 2点間のユークリッド距離（ピクセル）
    pub fn distance(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// 頂点bにおける ∠abc を度で返す
///
/// 余弦定理ベース。ゼロ長ベクトル（縮退）は180度として扱う。
pub fn angle_at_deg(a: Point2, b: Point2, c: Point2) -> f32 {
    let v1x = a.x - b.x;
    let v1y = a.y - b.y;
    let v2x = c.x - b.x;
    let v2y = c.y - b.y;
    let m1 = (v1x * v1x + v1y * v1y).sqrt();
    let m2 = (v2x * v2x + v2y * v2y).sqrt();
    if m1 == 0.0 || m2 == 0.0 {
        return 180.0;
    }
    let dot = v1x * v2x + v1y * v2y;
    let cos = (dot / (m1 * m2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// 小数第1位への丸め（距離cm表示用）
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// 小数第2位への丸め（タイム秒表示用）
pub fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_3_4_5() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_midpoint() {
        let a = Point2::new(0.0, 10.0);
        let b = Point2::new(4.0, 0.0);
        let m = a.midpoint(&b);
        assert_eq!(m, Point2::new(2.0, 5.0));
    }

    #[test]
    fn test_angle_right() {
        let a = Point2::new(1.0, 0.0);
        let b = Point2::new(0.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        let angle = angle_at_deg(a, b, c);
        assert!((angle - 90.0).abs() < 0.01, "angle={}", angle);
    }

    #[test]
    fn test_angle_straight() {
        let a = Point2::new(-1.0, 0.0);
        let b = Point2::new(0.0, 0.0);
        let c = Point2::new(1.0, 0.0);
        let angle = angle_at_deg(a, b, c);
        assert!((angle - 180.0).abs() < 0.01, "angle={}", angle);
    }

    #[test]
    fn test_angle_acute() {
        // ほぼ重なる2ベクトル → 0度に近い
        let a = Point2::new(1.0, 0.0);
        let b = Point2::new(0.0, 0.0);
        let c = Point2::new(1.0, 0.001);
        let angle = angle_at_deg(a, b, c);
        assert!(angle < 1.0, "angle={}", angle);
    }

    #[test]
    fn test_angle_degenerate_returns_180() {
        let p = Point2::new(1.0, 1.0);
        let angle = angle_at_deg(p, p, Point2::new(2.0, 2.0));
        assert_eq!(angle, 180.0);
    }

    #[test]
    fn test_round_helpers() {
        assert_eq!(round1(12.34), 12.3);
        assert_eq!(round1(12.35), 12.4);
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(9.996), 10.0);
    }
}
