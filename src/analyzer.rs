/// 单帧分析器
///
/// 一帧图像进来, 分别给出:
/// - 8 个身体部位的归一化坐标 (没有人时为 `None`)
/// - 一个球的位置和半径 (没有圆时为 `None`)
///
/// 两路结果互不影响, 姿态模型失败不会挡住球检测。
/// 姿态模型在第一次 `detect_pose` 时才加载, 之后一直复用; 加载失败下次调用会重试。
use std::time::Instant;

use anyhow::Result;
use once_cell::unsync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, Args, BallSelection};
use crate::error::{AnalyzerError, AnalyzerResult};
use crate::models::{CircleFinder, PoseEstimator, YOLOv8Pose};
use crate::{utils, Ball, Circle, Frame, KeypointSet};

/// 姿态模型构造器, 延迟到第一次使用时调用
pub type PoseLoader = Box<dyn Fn() -> Result<Box<dyn PoseEstimator>> + Send>;

pub struct FrameAnalyzer {
    config: AnalyzerConfig,
    pose: OnceCell<Box<dyn PoseEstimator>>,
    loader: Option<PoseLoader>,
    circles: Box<dyn CircleFinder>,
}

impl FrameAnalyzer {
    /// `loader` 为 `None` 时不做姿态估计
    pub fn new(config: AnalyzerConfig, loader: Option<PoseLoader>) -> Result<Self> {
        let circles = utils::circle_finder(config.circle_backend, &config.hough)?;
        Ok(Self {
            config,
            pose: OnceCell::new(),
            loader,
            circles,
        })
    }

    pub fn with_loader<F>(config: AnalyzerConfig, loader: F) -> Result<Self>
    where
        F: Fn() -> Result<Box<dyn PoseEstimator>> + Send + 'static,
    {
        Self::new(config, Some(Box::new(loader)))
    }

    /// 直接注入一个已加载的姿态模型
    pub fn with_estimator(config: AnalyzerConfig, estimator: Box<dyn PoseEstimator>) -> Result<Self> {
        let analyzer = Self::new(config, None)?;
        let _ = analyzer.pose.set(estimator);
        Ok(analyzer)
    }

    pub fn without_pose(config: AnalyzerConfig) -> Result<Self> {
        Self::new(config, None)
    }

    /// 替换圆检测实现
    pub fn with_circle_finder(mut self, circles: Box<dyn CircleFinder>) -> Self {
        self.circles = circles;
        self
    }

    /// 按命令行参数组装: YOLOv8-pose 延迟加载, `--no-pose` 时不加载
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = args.analyzer_config()?;
        if args.no_pose {
            return Self::without_pose(config);
        }
        let ort = args.ort_config();
        let pose = args.pose_config();
        Self::with_loader(config, move || {
            let model = YOLOv8Pose::new(ort.clone(), pose.clone())?;
            if pose.profile {
                model.summary();
            }
            Ok(Box::new(model) as Box<dyn PoseEstimator>)
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn pose_loaded(&self) -> bool {
        self.pose.get().is_some()
    }

    fn pose_model(&mut self) -> AnalyzerResult<Option<&mut Box<dyn PoseEstimator>>> {
        if self.pose.get().is_none() {
            let Some(loader) = &self.loader else {
                return Ok(None);
            };
            let t = Instant::now();
            let model = loader().map_err(|e| {
                let msg = format!("{e:#}");
                warn!(error = %msg, "pose model load failed");
                AnalyzerError::ModelInit(e)
            })?;
            info!(model = model.name(), elapsed = ?t.elapsed(), "pose model loaded");
            let _ = self.pose.set(model);
        }
        Ok(self.pose.get_mut())
    }

    /// 姿态关键点
    ///
    /// # Returns
    /// * `Ok(None)` - 没有检测到人 (或未启用姿态估计)
    /// * `Ok(Some(kpts))` - 8 个部位, 坐标在 [0, 1]
    pub fn detect_pose(&mut self, frame: &Frame) -> AnalyzerResult<Option<KeypointSet>> {
        frame.validate()?;
        let Some(model) = self.pose_model()? else {
            debug!("pose estimation disabled");
            return Ok(None);
        };

        let t = Instant::now();
        let landmarks = model.infer(frame).map_err(AnalyzerError::Inference)?;
        let Some(landmarks) = landmarks else {
            debug!(elapsed = ?t.elapsed(), "no person detected");
            return Ok(None);
        };
        let keypoints = KeypointSet::from_landmarks(&landmarks).map_err(AnalyzerError::Inference)?;
        debug!(parts = keypoints.len(), elapsed = ?t.elapsed(), "pose detected");
        Ok(Some(keypoints))
    }

    /// 球位置 (像素坐标, 四舍五入)
    pub fn detect_ball(&self, frame: &Frame) -> AnalyzerResult<Option<Ball>> {
        frame.validate()?;
        let t = Instant::now();
        let circles = self
            .circles
            .find_circles(frame)
            .map_err(AnalyzerError::Inference)?;
        let chosen = select_circle(
            &circles,
            self.config.ball_selection,
            frame.width(),
            frame.height(),
        );
        debug!(
            candidates = circles.len(),
            chosen = ?chosen,
            elapsed = ?t.elapsed(),
            "ball detection"
        );
        Ok(chosen.map(Ball::from))
    }

    /// 两路同时跑, 各自保留自己的结果或错误
    pub fn analyze(&mut self, frame: &Frame) -> FrameAnalysis {
        let pose = self.detect_pose(frame);
        if let Err(e) = &pose {
            warn!(error = %e, "pose detection failed");
        }
        let ball = self.detect_ball(frame);
        if let Err(e) = &ball {
            warn!(error = %e, "ball detection failed");
        }
        FrameAnalysis { pose, ball }
    }
}

/// 多个候选圆时按策略选一个, 并列时取靠前的
pub fn select_circle(
    circles: &[Circle],
    selection: BallSelection,
    width: u32,
    height: u32,
) -> Option<Circle> {
    match selection {
        BallSelection::First => circles.first().copied(),
        BallSelection::LargestRadius => circles
            .iter()
            .copied()
            .reduce(|best, c| if c.radius > best.radius { c } else { best }),
        BallSelection::ClosestToCenter => {
            let (mx, my) = (width as f32 / 2.0, height as f32 / 2.0);
            let d2 = |c: &Circle| (c.x - mx).powi(2) + (c.y - my).powi(2);
            circles
                .iter()
                .copied()
                .reduce(|best, c| if d2(&c) < d2(&best) { c } else { best })
        }
    }
}

/// 一帧的两路结果
#[derive(Debug)]
pub struct FrameAnalysis {
    pub pose: AnalyzerResult<Option<KeypointSet>>,
    pub ball: AnalyzerResult<Option<Ball>>,
}

impl FrameAnalysis {
    pub fn is_ok(&self) -> bool {
        self.pose.is_ok() && self.ball.is_ok()
    }

    pub fn report(&self) -> AnalysisReport {
        let mut errors = Vec::new();
        let pose_keypoints = match &self.pose {
            Ok(p) => p.clone(),
            Err(e) => {
                errors.push(format!("pose: {e}"));
                None
            }
        };
        let ball = match &self.ball {
            Ok(b) => *b,
            Err(e) => {
                errors.push(format!("ball: {e}"));
                None
            }
        };
        AnalysisReport {
            pose_keypoints,
            ball,
            errors,
        }
    }
}

/// 对外输出的 JSON 结构
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub pose_keypoints: Option<KeypointSet>,
    pub ball: Option<Ball>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
