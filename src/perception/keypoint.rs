use crate::geometry::Point2;

/// キーポイントインデックス
///
/// 0〜16はMoveNet互換。17・18のつま先はより詳細なモデルだけが出力し、
/// 欠けている場合は足首で代用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
    LeftFootIndex = 17,
    RightFootIndex = 18,
}

impl KeypointIndex {
    pub const COUNT: usize = 19;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            17 => Some(Self::LeftFootIndex),
            18 => Some(Self::RightFootIndex),
            _ => None,
        }
    }
}

/// 単一キーポイント（フレームピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)。スコアを出さないモデルは1.0を入れる
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値を超えるか
    pub fn is_valid(&self, threshold: f32) -> bool {
        self.confidence > threshold
    }

    pub fn point(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// 1人分の姿勢
#[derive(Debug, Clone)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// 閾値を超えるキーポイントの座標
    pub fn valid_point(&self, index: KeypointIndex, threshold: f32) -> Option<Point2> {
        let kp = self.get(index);
        kp.is_valid(threshold).then(|| kp.point())
    }

    /// 左右ペアの代表点
    pub fn bilateral(
        &self,
        pair: (KeypointIndex, KeypointIndex),
        threshold: f32,
    ) -> Option<Point2> {
        average_bilateral(
            self.valid_point(pair.0, threshold),
            self.valid_point(pair.1, threshold),
        )
    }

    /// 左右ペアの代表点。優先ペアが両方欠けたら代替ペアで再試行
    pub fn bilateral_or_fallback(
        &self,
        pair: (KeypointIndex, KeypointIndex),
        fallback: (KeypointIndex, KeypointIndex),
        threshold: f32,
    ) -> Option<Point2> {
        self.bilateral(pair, threshold)
            .or_else(|| self.bilateral(fallback, threshold))
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}

/// 左右キーポイントの代表点
///
/// 両方有効なら中点、片方だけならその点、両方無効ならNone。
pub fn average_bilateral(left: Option<Point2>, right: Option<Point2>) -> Option<Point2> {
    match (left, right) {
        (Some(l), Some(r)) => Some(l.midpoint(&r)),
        (Some(l), None) => Some(l),
        (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}
