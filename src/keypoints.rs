/// 关键点与检测结果数据结构
///
/// - `Landmarks`: 姿态模型的原始输出 (归一化坐标, 带布局信息)
/// - `KeypointSet`: 分析器只保留的 8 个高尔夫相关部位
/// - `Circle` / `Ball`: 圆检测原始结果 / 对外报告的整数像素结果
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::Point2;

/// 分析器关心的 8 个身体部位, 顺序即输出顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    LeftShoulder,
    RightShoulder,
    LeftHip,
    RightHip,
    LeftWrist,
    RightWrist,
    LeftElbow,
    RightElbow,
}

impl BodyPart {
    pub const ALL: [BodyPart; 8] = [
        BodyPart::LeftShoulder,
        BodyPart::RightShoulder,
        BodyPart::LeftHip,
        BodyPart::RightHip,
        BodyPart::LeftWrist,
        BodyPart::RightWrist,
        BodyPart::LeftElbow,
        BodyPart::RightElbow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BodyPart::LeftShoulder => "left_shoulder",
            BodyPart::RightShoulder => "right_shoulder",
            BodyPart::LeftHip => "left_hip",
            BodyPart::RightHip => "right_hip",
            BodyPart::LeftWrist => "left_wrist",
            BodyPart::RightWrist => "right_wrist",
            BodyPart::LeftElbow => "left_elbow",
            BodyPart::RightElbow => "right_elbow",
        }
    }

    /// 该部位在指定布局中的下标
    pub fn index(&self, layout: LandmarkLayout) -> usize {
        match layout {
            // COCO: 5-左肩 6-右肩 7-左肘 8-右肘 9-左腕 10-右腕 11-左髋 12-右髋
            LandmarkLayout::Coco17 => match self {
                BodyPart::LeftShoulder => 5,
                BodyPart::RightShoulder => 6,
                BodyPart::LeftElbow => 7,
                BodyPart::RightElbow => 8,
                BodyPart::LeftWrist => 9,
                BodyPart::RightWrist => 10,
                BodyPart::LeftHip => 11,
                BodyPart::RightHip => 12,
            },
            // BlazePose (MediaPipe Pose) 33 点
            LandmarkLayout::BlazePose33 => match self {
                BodyPart::LeftShoulder => 11,
                BodyPart::RightShoulder => 12,
                BodyPart::LeftElbow => 13,
                BodyPart::RightElbow => 14,
                BodyPart::LeftWrist => 15,
                BodyPart::RightWrist => 16,
                BodyPart::LeftHip => 23,
                BodyPart::RightHip => 24,
            },
        }
    }
}

impl std::fmt::Display for BodyPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 姿态模型的关键点布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkLayout {
    /// YOLOv8-pose / COCO 17 点
    Coco17,
    /// MediaPipe BlazePose 33 点
    BlazePose33,
}

impl LandmarkLayout {
    pub fn num_points(&self) -> usize {
        match self {
            LandmarkLayout::Coco17 => 17,
            LandmarkLayout::BlazePose33 => 33,
        }
    }
}

/// 一个人的全部关键点, 坐标已按原图宽高归一化
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    layout: LandmarkLayout,
    points: Vec<Point2>,
}

impl Landmarks {
    pub fn new(layout: LandmarkLayout, points: Vec<Point2>) -> Self {
        Self { layout, points }
    }

    pub fn layout(&self) -> LandmarkLayout {
        self.layout
    }

    pub fn points(&self) -> &[Point2] {
        &self.points
    }
}

/// 8 个部位 → 归一化坐标
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeypointSet {
    points: BTreeMap<BodyPart, Point2>,
}

impl KeypointSet {
    /// 从模型输出中挑出 8 个部位, 坐标截断到 [0, 1]
    pub fn from_landmarks(landmarks: &Landmarks) -> Result<Self> {
        let layout = landmarks.layout();
        if landmarks.points().len() < layout.num_points() {
            bail!(
                "{:?} layout needs {} landmarks, model produced {}",
                layout,
                layout.num_points(),
                landmarks.points().len()
            );
        }

        let mut points = BTreeMap::new();
        for part in BodyPart::ALL {
            let p = &landmarks.points()[part.index(layout)];
            if !p.x().is_finite() || !p.y().is_finite() {
                bail!("landmark {} is not finite: ({}, {})", part, p.x(), p.y());
            }
            points.insert(
                part,
                Point2::new_with_conf(p.x().clamp(0.0, 1.0), p.y().clamp(0.0, 1.0), p.confidence()),
            );
        }
        Ok(Self { points })
    }

    pub fn get(&self, part: BodyPart) -> Option<&Point2> {
        self.points.get(&part)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyPart, &Point2)> {
        self.points.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// {"left_shoulder": [x, y], ...}
impl Serialize for KeypointSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.points.len()))?;
        for (part, p) in self.points.iter() {
            map.serialize_entry(part.name(), &[p.x(), p.y()])?;
        }
        map.end()
    }
}

/// 圆检测器的原始输出 (像素坐标)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// 支持该半径的边缘点数
    pub support: u32,
}

impl Circle {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            x,
            y,
            radius,
            support: 0,
        }
    }
}

/// 对外报告的球位置, 四舍五入到整数像素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ball {
    pub x: u32,
    pub y: u32,
    pub radius: u32,
}

/// 四舍六入五取偶, 与 numpy `np.round` 一致
impl From<Circle> for Ball {
    fn from(c: Circle) -> Self {
        Self {
            x: c.x.round_ties_even().max(0.0) as u32,
            y: c.y.round_ties_even().max(0.0) as u32,
            radius: c.radius.round_ties_even().max(0.0) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coco_person() -> Landmarks {
        let points = (0..17)
            .map(|i| Point2::new_with_conf(i as f32 * 0.05, 1.0 - i as f32 * 0.05, 0.9))
            .collect();
        Landmarks::new(LandmarkLayout::Coco17, points)
    }

    #[test]
    fn test_coco_extracts_eight_parts() {
        let kpts = KeypointSet::from_landmarks(&coco_person()).unwrap();
        assert_eq!(kpts.len(), 8);
        let ls = kpts.get(BodyPart::LeftShoulder).unwrap();
        assert!((ls.x() - 0.25).abs() < 1e-6);
        assert!((ls.y() - 0.75).abs() < 1e-6);
        let rh = kpts.get(BodyPart::RightHip).unwrap();
        assert!((rh.x() - 0.60).abs() < 1e-6);
    }

    #[test]
    fn test_blazepose_indices() {
        let points = (0..33)
            .map(|i| Point2::new(i as f32 / 100.0, 0.5))
            .collect();
        let kpts =
            KeypointSet::from_landmarks(&Landmarks::new(LandmarkLayout::BlazePose33, points))
                .unwrap();
        assert!((kpts.get(BodyPart::LeftHip).unwrap().x() - 0.23).abs() < 1e-6);
        assert!((kpts.get(BodyPart::RightWrist).unwrap().x() - 0.16).abs() < 1e-6);
    }

    #[test]
    fn test_coordinates_are_clamped() {
        let mut points = vec![Point2::new(0.5, 0.5); 17];
        points[5] = Point2::new(-0.2, 1.3);
        let kpts =
            KeypointSet::from_landmarks(&Landmarks::new(LandmarkLayout::Coco17, points)).unwrap();
        let ls = kpts.get(BodyPart::LeftShoulder).unwrap();
        assert_eq!((ls.x(), ls.y()), (0.0, 1.0));
    }

    #[test]
    fn test_short_landmark_list_is_error() {
        let landmarks = Landmarks::new(LandmarkLayout::BlazePose33, vec![Point2::default(); 17]);
        assert!(KeypointSet::from_landmarks(&landmarks).is_err());
    }

    #[test]
    fn test_non_finite_is_error() {
        let mut points = vec![Point2::new(0.5, 0.5); 17];
        points[9] = Point2::new(f32::NAN, 0.5);
        let landmarks = Landmarks::new(LandmarkLayout::Coco17, points);
        assert!(KeypointSet::from_landmarks(&landmarks).is_err());
    }

    #[test]
    fn test_serialize_shape() {
        let kpts = KeypointSet::from_landmarks(&coco_person()).unwrap();
        let json = serde_json::to_value(&kpts).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert_eq!(obj["left_elbow"].as_array().unwrap().len(), 2);

        let ball = Ball::from(Circle::new(99.6, 80.4, 14.5));
        assert_eq!(
            serde_json::to_value(ball).unwrap(),
            serde_json::json!({"x": 100, "y": 80, "radius": 14})
        );
    }

    #[test]
    fn test_ball_rounds_half_to_even() {
        let ball = Ball::from(Circle::new(12.5, 13.5, 15.5));
        assert_eq!((ball.x, ball.y, ball.radius), (12, 14, 16));
        let ball = Ball::from(Circle::new(-0.4, 2.6, 0.5));
        assert_eq!((ball.x, ball.y, ball.radius), (0, 3, 0));
    }
}
