/// 検出バウンディングボックス（フレームピクセル座標、左上基準）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// IoU (Intersection over Union)
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// 1件の物体検出結果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn person(confidence: f32, bbox: BBox) -> Self {
        Self {
            class: "person".to_string(),
            confidence,
            bbox,
        }
    }
}

/// 閾値を超える人物検出だけを残す
///
/// 監督チェック（単独受検ルール）はこのフィルタ後の件数で判定する。
/// 低信頼度の検出ノイズで違反扱いにしないための前段。
pub fn valid_persons(detections: &[Detection], threshold: f32) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.class == "person" && d.confidence > threshold)
        .cloned()
        .collect()
}

/// 貪欲NMS。信頼度降順に採用し、採用済みとのIoUが閾値を超える候補を棄却
pub fn nms_persons(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}
