/// 命令行参数与分析配置
///
/// `Args` 是命令行入口; 分析器本身只认 `AnalyzerConfig`,
/// 也可以用 `--config xxx.json` 直接加载 (字段缺省时取默认值)。
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::YOLOv8PoseConfig;
use crate::{OrtConfig, OrtEP};

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "高尔夫挥杆单帧分析 (姿态关键点 + 球检测)", long_about = None)]
pub struct Args {
    /// ONNX 姿态模型路径或 http(s) 地址
    #[arg(long, required = false, default_value = "models/yolov8n-pose.onnx")]
    pub model: String,

    /// 输入图片或图片目录
    #[arg(long, required = true)]
    pub source: String,

    /// JSON 配置文件 (覆盖下面的 Hough / 选球参数)
    #[arg(long)]
    pub config: Option<String>,

    /// device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// using CUDA EP (需要 `cuda` feature)
    #[arg(long)]
    pub cuda: bool,

    /// intra-op 线程数
    #[arg(long)]
    pub threads: Option<usize>,

    /// 模型输入宽度
    #[arg(long, default_value_t = 640)]
    pub width: u32,

    /// 模型输入高度
    #[arg(long, default_value_t = 640)]
    pub height: u32,

    /// 人体置信度阈值
    #[arg(long, default_value_t = 0.5)]
    pub conf: f32,

    /// NMS IoU 阈值
    #[arg(long, default_value_t = 0.45)]
    pub iou: f32,

    /// 跳过姿态估计, 只检测球
    #[arg(long)]
    pub no_pose: bool,

    /// 多个候选圆时的选取策略
    #[arg(long, value_enum, default_value_t = BallSelection::First)]
    pub ball_selection: BallSelection,

    /// 累加器分辨率倒数比 (dp)
    #[arg(long, default_value_t = 1.0)]
    pub dp: f32,

    /// 圆心最小间距 (像素)
    #[arg(long, default_value_t = 20.0)]
    pub min_dist: f32,

    /// Canny 高阈值 (低阈值取一半)
    #[arg(long, default_value_t = 50.0)]
    pub canny_threshold: f32,

    /// 累加器阈值
    #[arg(long, default_value_t = 30)]
    pub acc_threshold: u32,

    #[arg(long, default_value_t = 5)]
    pub min_radius: u32,

    #[arg(long, default_value_t = 30)]
    pub max_radius: u32,

    /// 中值滤波核大小 (奇数)
    #[arg(long, default_value_t = 5)]
    pub median_ksize: u32,

    /// 径向边缘点至少覆盖的圆周比例
    #[arg(long, default_value_t = 0.5)]
    pub min_coverage: f32,

    /// 圆检测实现 (opencv 需要 `opencv` feature)
    #[arg(long, value_enum, default_value_t = CircleBackend::Imageproc)]
    pub circle_backend: CircleBackend,

    /// 保存标注结果图
    #[arg(long)]
    pub save: bool,

    /// 标注图输出目录
    #[arg(long, default_value = "runs")]
    pub out: String,

    /// profile
    #[arg(long)]
    pub profile: bool,
}

impl Args {
    /// 组装分析配置: 有 `--config` 时以文件为准
    pub fn analyzer_config(&self) -> Result<AnalyzerConfig> {
        if let Some(path) = &self.config {
            return AnalyzerConfig::load(path);
        }
        let config = AnalyzerConfig {
            hough: HoughConfig {
                dp: self.dp,
                min_dist: self.min_dist,
                canny_threshold: self.canny_threshold,
                acc_threshold: self.acc_threshold,
                min_radius: self.min_radius,
                max_radius: self.max_radius,
                median_ksize: self.median_ksize,
                min_coverage: self.min_coverage,
            },
            ball_selection: self.ball_selection,
            circle_backend: self.circle_backend,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn pose_config(&self) -> YOLOv8PoseConfig {
        YOLOv8PoseConfig {
            conf: self.conf,
            iou: self.iou,
            profile: self.profile,
            ..Default::default()
        }
    }

    pub fn ort_config(&self) -> OrtConfig {
        let ep = if self.cuda {
            OrtEP::CUDA(self.device_id)
        } else {
            OrtEP::CPU
        };
        OrtConfig {
            ep,
            f: self.model.clone(),
            image_size: (self.height, self.width),
            intra_threads: self.threads,
        }
    }
}

/// 多候选圆时的选取策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallSelection {
    /// 检测器返回的第一个 (按累加器票数), 不做额外排序
    #[default]
    First,
    /// 半径最大的
    LargestRadius,
    /// 离画面中心最近的
    ClosestToCenter,
}

/// 圆检测实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircleBackend {
    /// 纯 Rust (imageproc) 实现
    #[default]
    Imageproc,
    /// cv::HoughCircles
    Opencv,
}

/// 梯度 Hough 圆检测参数, 默认值与 cv2.HoughCircles(gray, HOUGH_GRADIENT, 1, 20,
/// param1=50, param2=30, minRadius=5, maxRadius=30) + medianBlur(5) 一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    pub dp: f32,
    pub min_dist: f32,
    pub canny_threshold: f32,
    pub acc_threshold: u32,
    pub min_radius: u32,
    pub max_radius: u32,
    pub median_ksize: u32,
    /// 仅 imageproc 实现使用
    pub min_coverage: f32,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            dp: 1.0,
            min_dist: 20.0,
            canny_threshold: 50.0,
            acc_threshold: 30,
            min_radius: 5,
            max_radius: 30,
            median_ksize: 5,
            min_coverage: 0.5,
        }
    }
}

impl HoughConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dp.is_nan() || self.dp < 1.0 {
            bail!("dp must be >= 1, got {}", self.dp);
        }
        if self.min_dist.is_nan() || self.min_dist <= 0.0 {
            bail!("min_dist must be positive, got {}", self.min_dist);
        }
        if self.canny_threshold.is_nan() || self.canny_threshold <= 0.0 {
            bail!("canny_threshold must be positive, got {}", self.canny_threshold);
        }
        if self.max_radius == 0 || self.min_radius > self.max_radius {
            bail!(
                "invalid radius range [{}, {}]",
                self.min_radius,
                self.max_radius
            );
        }
        if self.median_ksize < 3 || self.median_ksize % 2 == 0 {
            bail!("median_ksize must be odd and >= 3, got {}", self.median_ksize);
        }
        if !(0.0..=1.0).contains(&self.min_coverage) {
            bail!("min_coverage must be in [0, 1], got {}", self.min_coverage);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub hough: HoughConfig,
    pub ball_selection: BallSelection,
    pub circle_backend: CircleBackend,
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        self.hough.validate()
    }

    /// 从JSON文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        info!(path = %path.display(), "analyzer config loaded");
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("failed to write config {}", path.as_ref().display()))?;
        Ok(())
    }
}
