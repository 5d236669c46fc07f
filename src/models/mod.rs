/// 模型能力接口与实现
///
/// # 架构说明
///
/// 分析器不直接依赖具体模型, 只依赖两个能力:
/// - **PoseEstimator**: 单张图片 → 一个人的全部关键点 (单图模式, 无跟踪状态)
/// - **CircleFinder**: 单张图片 → 候选圆列表 (检测器自身顺序)
///
/// ## 具体实现
/// - `YOLOv8Pose`: ONNX YOLOv8-pose 模型 (COCO 17 点), 文件 `yolov8.rs`
/// - `HoughCircles`: 梯度 Hough 圆检测, 文件 `utils/hough_circles.rs`
///
/// ## 使用示例
/// ```no_run
/// use golf_swing_rs::models::{PoseEstimator, YOLOv8Pose, YOLOv8PoseConfig};
/// use golf_swing_rs::{Frame, OrtConfig};
///
/// # fn main() -> anyhow::Result<()> {
/// let ort = OrtConfig { f: "models/yolov8n-pose.onnx".into(), ..Default::default() };
/// let mut model = YOLOv8Pose::new(ort, YOLOv8PoseConfig::default())?;
/// let frame = Frame::from_dynamic(&image::open("swing.jpg")?);
/// let landmarks = model.infer(&frame)?;
/// # Ok(())
/// # }
/// ```
use anyhow::Result;

use crate::{Circle, Frame, Landmarks};

/// 人体姿态估计能力
pub trait PoseEstimator: Send {
    /// 单帧推理
    ///
    /// # Returns
    /// * `Ok(None)` - 画面中没有人
    /// * `Ok(Some(landmarks))` - 置信度最高的那个人, 坐标按原图宽高归一化
    fn infer(&mut self, frame: &Frame) -> Result<Option<Landmarks>>;

    /// 模型名称 (日志用)
    fn name(&self) -> &str;
}

/// 圆检测能力
pub trait CircleFinder: Send {
    /// 返回所有候选圆, 顺序由实现决定 (不保证 "最好" 的在前)
    fn find_circles(&self, frame: &Frame) -> Result<Vec<Circle>>;
}

impl<T: PoseEstimator + ?Sized> PoseEstimator for Box<T> {
    fn infer(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        (**self).infer(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: CircleFinder + ?Sized> CircleFinder for Box<T> {
    fn find_circles(&self, frame: &Frame) -> Result<Vec<Circle>> {
        (**self).find_circles(frame)
    }
}

pub mod hub; // 模型下载与缓存
pub mod yolov8; // YOLOv8-pose 模型

// Re-exports
pub use yolov8::{YOLOv8Pose, YOLOv8PoseConfig, YOLOv8PosePostprocessor};
