/// 分析器错误类型
///
/// "没有检测到" 不是错误: `detect_pose` / `detect_ball` 用 `Ok(None)` 表示。
/// 这里只区分调用方需要不同处理的几类失败。
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// 输入帧为空或缓冲区与尺寸不符 (调用方应拒绝该上传)
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// 模型加载失败 (下次调用会重试)
    #[error("model initialization failed: {0:#}")]
    ModelInit(anyhow::Error),

    /// 推理或后处理失败
    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl AnalyzerError {
    pub fn invalid_frame(msg: impl Into<String>) -> Self {
        Self::InvalidFrame(msg.into())
    }

    pub fn is_invalid_frame(&self) -> bool {
        matches!(self, Self::InvalidFrame(_))
    }
}

pub type AnalyzerResult<T> = std::result::Result<T, AnalyzerError>;
