// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理后端
// 只负责: 建 session、喂 NCHW f32 张量、取回全部 f32 输出

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

/// Execution Provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    /// (height, width)
    pub image_size: (u32, u32),
    pub intra_threads: Option<usize>,
}

impl Default for OrtConfig {
    fn default() -> Self {
        Self {
            f: String::new(),
            ep: OrtEP::CPU,
            image_size: (640, 640),
            intra_threads: None,
        }
    }
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    height: u32,
    width: u32,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let mut builder =
            Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
        if let Some(n) = config.intra_threads {
            builder = builder.with_intra_threads(n)?;
        }

        let ep = match config.ep {
            #[cfg(feature = "cuda")]
            OrtEP::CUDA(device_id) => {
                use ort::execution_providers::CUDAExecutionProvider;
                builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build()])?;
                OrtEP::CUDA(device_id)
            }
            #[cfg(not(feature = "cuda"))]
            OrtEP::CUDA(device_id) => {
                tracing::warn!(
                    device_id,
                    "built without the `cuda` feature, falling back to CPU"
                );
                OrtEP::CPU
            }
            OrtEP::CPU => OrtEP::CPU,
        };

        let session = builder
            .commit_from_file(&config.f)
            .with_context(|| format!("failed to load ONNX model {}", config.f))?;

        let (height, width) = config.image_size;
        info!(model = %config.f, ?ep, height, width, "onnx session ready");

        Ok(Self {
            session,
            ep,
            height,
            width,
        })
    }

    /// 单输入推理, 返回所有输出 (按模型声明顺序)
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();
        let input = Tensor::from_array(xs)?;
        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("onnx inference failed")?;

        let mut ys = Vec::with_capacity(outputs.len());
        for i in 0..outputs.len() {
            let y = outputs[i]
                .try_extract_array::<f32>()
                .with_context(|| format!("output #{} is not a f32 tensor", i))?;
            ys.push(y.into_owned());
        }
        if profile {
            println!("[ORT run]: {:?}", t.elapsed());
        }
        debug!(outputs = ys.len(), elapsed = ?t.elapsed(), "onnx run");
        Ok(ys)
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}
