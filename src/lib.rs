#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod analyzer; // 单帧分析器 (姿态 + 球)
pub mod annotate; // 结果绘制
pub mod config; // 命令行与分析参数
pub mod error; // 错误类型
pub mod frame; // 输入帧
pub mod keypoints; // 关键点/圆 数据结构
pub mod models; // 模型接口与具体实现
pub mod ort_backend;
pub mod source; // 输入图片/视频
pub mod utils;

pub use crate::analyzer::{AnalysisReport, FrameAnalysis, FrameAnalyzer};
pub use crate::config::{AnalyzerConfig, Args, BallSelection, CircleBackend, HoughConfig};
pub use crate::error::{AnalyzerError, AnalyzerResult};
pub use crate::frame::{ChannelOrder, Frame};
pub use crate::keypoints::{Ball, BodyPart, Circle, KeypointSet, LandmarkLayout, Landmarks};
pub use crate::models::{CircleFinder, PoseEstimator, YOLOv8Pose};
pub use crate::ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use crate::utils::hough_circles::HoughCircles;

/// 按置信度降序排序后做 NMS, 原地保留结果
pub fn non_max_suppression(xs: &mut Vec<(Bbox, Vec<Point2>)>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.0.confidence().total_cmp(&b1.0.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].0.iou(&xs[index].0);
            if iou > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Point2 {
    // A point2d with x, y, conf
    x: f32,
    y: f32,
    confidence: f32,
}

impl Point2 {
    pub fn new_with_conf(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bbox {
    // a bounding box around an object
    xmin: f32,
    ymin: f32,
    width: f32,
    height: f32,
    confidence: f32,
}

impl Bbox {
    pub fn new(xmin: f32, ymin: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            xmin,
            ymin,
            width,
            height,
            confidence,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.xmin + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.xmin.max(another.xmin);
        let r = self.xmax().min(another.xmax());
        let t = self.ymin.max(another.ymin);
        let b = self.ymax().min(another.ymax());
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0.0 {
            return 0.0;
        }
        self.intersection_area(another) / union
    }
}
