// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8-pose 模型实现
// 包含: 模型加载、预处理(letterbox)、推理、后处理(NMS + 关键点还原)

use anyhow::{bail, Result};
use image::{imageops, RgbImage};
use ndarray::{s, Array, Axis, IxDyn};
use tracing::debug;

use super::{hub, PoseEstimator};
use crate::{
    non_max_suppression, Bbox, Frame, LandmarkLayout, Landmarks, OrtBackend, OrtConfig, Point2,
};

const CXYWH_OFFSET: usize = 4;
const KPT_STEP: usize = 3;

/// YOLOv8-pose 后处理参数
#[derive(Debug, Clone)]
pub struct YOLOv8PoseConfig {
    /// 人体置信度阈值
    pub conf: f32,
    /// NMS IoU 阈值
    pub iou: f32,
    /// 关键点数量 (COCO = 17)
    pub nk: usize,
    pub profile: bool,
}

impl Default for YOLOv8PoseConfig {
    fn default() -> Self {
        Self {
            conf: 0.5,
            iou: 0.45,
            nk: 17,
            profile: false,
        }
    }
}

/// YOLOv8-pose 后处理器 (不依赖推理 session, 可单独测试)
///
/// 输出格式 `[batch, 4 + nc + nk*3, anchors]`:
/// - 0..4: cx, cy, w, h (模型输入坐标系)
/// - 4..4+nc: 类别分数 (pose 模型 nc = 1, 即 person)
/// - 末尾 nk*3: 每个关键点 (x, y, conf)
pub struct YOLOv8PosePostprocessor {
    config: YOLOv8PoseConfig,
    width: u32,
    height: u32,
}

impl YOLOv8PosePostprocessor {
    pub fn new(config: YOLOv8PoseConfig, width: u32, height: u32) -> Self {
        Self {
            config,
            width,
            height,
        }
    }

    pub fn config(&self) -> &YOLOv8PoseConfig {
        &self.config
    }

    fn scale_wh(&self, w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
        let r = (w1 / w0).min(h1 / h0);
        (r, (w0 * r).round(), (h0 * r).round())
    }

    /// letterbox: 等比缩放贴左上角, 其余填充 144/255, 输出 NCHW
    pub fn preprocess(&self, img: &RgbImage) -> Array<f32, IxDyn> {
        let mut ys = Array::ones((1, 3, self.height as usize, self.width as usize)).into_dyn();
        ys.fill(144.0 / 255.0);

        let (w0, h0) = img.dimensions();
        let (_, w_new, h_new) =
            self.scale_wh(w0 as f32, h0 as f32, self.width as f32, self.height as f32);
        let resized = imageops::resize(
            img,
            (w_new as u32).max(1),
            (h_new as u32).max(1),
            imageops::FilterType::Triangle,
        );

        for (x, y, rgb) in resized.enumerate_pixels() {
            let x = x as usize;
            let y = y as usize;
            if x >= self.width as usize || y >= self.height as usize {
                continue;
            }
            let [r, g, b] = rgb.0;
            ys[[0, 0, y, x]] = (r as f32) / 255.0;
            ys[[0, 1, y, x]] = (g as f32) / 255.0;
            ys[[0, 2, y, x]] = (b as f32) / 255.0;
        }
        ys
    }

    /// 取置信度最高的人, 关键点还原到原图后按宽高归一化
    pub fn postprocess(
        &self,
        xs: &[Array<f32, IxDyn>],
        width_original: u32,
        height_original: u32,
    ) -> Result<Option<Landmarks>> {
        let Some(preds) = xs.first() else {
            bail!("model produced no outputs");
        };
        if preds.ndim() != 3 || preds.shape()[0] == 0 {
            bail!("unexpected pose output shape {:?}", preds.shape());
        }
        let nk = self.config.nk;
        let channels = preds.shape()[1];
        if channels <= CXYWH_OFFSET + KPT_STEP * nk {
            bail!(
                "pose output has {} channels, need more than {} for {} keypoints",
                channels,
                CXYWH_OFFSET + KPT_STEP * nk,
                nk
            );
        }
        let nc = channels - CXYWH_OFFSET - KPT_STEP * nk;

        let width_original = width_original as f32;
        let height_original = height_original as f32;
        let (ratio, _, _) = self.scale_wh(
            width_original,
            height_original,
            self.width as f32,
            self.height as f32,
        );

        let anchor = preds.index_axis(Axis(0), 0);
        let mut data: Vec<(Bbox, Vec<Point2>)> = Vec::new();
        for pred in anchor.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);
            let kpts = pred.slice(s![CXYWH_OFFSET + nc..]);

            let confidence = clss.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if confidence < self.config.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            let y_bbox = Bbox::new(cx - w / 2., cy - h / 2., w, h, confidence);

            let mut y_kpts = Vec::with_capacity(nk);
            for i in 0..nk {
                let kx = (kpts[KPT_STEP * i] / ratio).clamp(0.0, width_original);
                let ky = (kpts[KPT_STEP * i + 1] / ratio).clamp(0.0, height_original);
                let kconf = kpts[KPT_STEP * i + 2];
                y_kpts.push(Point2::new_with_conf(
                    kx / width_original,
                    ky / height_original,
                    kconf,
                ));
            }
            data.push((y_bbox, y_kpts));
        }

        let candidates = data.len();
        non_max_suppression(&mut data, self.config.iou);
        debug!(candidates, persons = data.len(), "pose postprocess");

        Ok(data
            .into_iter()
            .next()
            .map(|(_, kpts)| Landmarks::new(LandmarkLayout::Coco17, kpts)))
    }
}

/// YOLOv8-pose 完整模型
pub struct YOLOv8Pose {
    engine: OrtBackend,
    postprocessor: YOLOv8PosePostprocessor,
    name: String,
}

impl YOLOv8Pose {
    /// 加载模型, `ort.f` 可以是本地路径或 http(s) 地址
    pub fn new(mut ort: OrtConfig, config: YOLOv8PoseConfig) -> Result<Self> {
        let path = hub::resolve(&ort.f)?;
        ort.f = path.to_string_lossy().into_owned();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolov8-pose".to_string());

        let engine = OrtBackend::build(ort)?;
        let postprocessor = YOLOv8PosePostprocessor::new(config, engine.width(), engine.height());

        Ok(Self {
            engine,
            postprocessor,
            name,
        })
    }

    pub fn engine(&self) -> &OrtBackend {
        &self.engine
    }

    pub fn summary(&self) {
        let cfg = self.postprocessor.config();
        println!(
            "\nSummary:\n\
            > Model: {}\n\
            > EP: {:?}\n\
            > Height: {}, Width: {}\n\
            > nk: {}, conf: {}, iou: {}\n\
            ",
            self.name,
            self.engine.ep(),
            self.engine.height(),
            self.engine.width(),
            cfg.nk,
            cfg.conf,
            cfg.iou,
        );
    }
}

impl PoseEstimator for YOLOv8Pose {
    fn infer(&mut self, frame: &Frame) -> Result<Option<Landmarks>> {
        let profile = self.postprocessor.config().profile;

        let t_pre = std::time::Instant::now();
        let rgb = frame.to_rgb();
        let xs = self.postprocessor.preprocess(&rgb);
        if profile {
            println!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let t_run = std::time::Instant::now();
        let ys = self.engine.run(xs, profile)?;
        if profile {
            println!("[Model Inference]: {:?}", t_run.elapsed());
        }

        let t_post = std::time::Instant::now();
        let ys = self
            .postprocessor
            .postprocess(&ys, frame.width(), frame.height())?;
        if profile {
            println!("[Model Postprocess]: {:?}", t_post.elapsed());
        }

        Ok(ys)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const NK: usize = 17;
    const CH: usize = CXYWH_OFFSET + 1 + KPT_STEP * NK;

    // 在模型坐标系 (640x640) 里放一个人
    fn put_person(out: &mut Array<f32, IxDyn>, anchor: usize, cx: f32, cy: f32, conf: f32) {
        out[[0, 0, anchor]] = cx;
        out[[0, 1, anchor]] = cy;
        out[[0, 2, anchor]] = 100.0;
        out[[0, 3, anchor]] = 200.0;
        out[[0, 4, anchor]] = conf;
        for k in 0..NK {
            out[[0, 5 + k * 3, anchor]] = cx;
            out[[0, 5 + k * 3 + 1, anchor]] = cy;
            out[[0, 5 + k * 3 + 2, anchor]] = 0.9;
        }
    }

    fn postprocessor() -> YOLOv8PosePostprocessor {
        YOLOv8PosePostprocessor::new(YOLOv8PoseConfig::default(), 640, 640)
    }

    #[test]
    fn test_picks_most_confident_person() {
        let mut out = Array::zeros((1, CH, 4)).into_dyn();
        put_person(&mut out, 0, 320.0, 180.0, 0.9);
        put_person(&mut out, 1, 325.0, 185.0, 0.8); // 与 0 重叠, NMS 去掉
        put_person(&mut out, 2, 100.0, 100.0, 0.3); // 低于阈值
        put_person(&mut out, 3, 500.0, 300.0, 0.6);

        // 1280x720 → ratio 0.5
        let landmarks = postprocessor()
            .postprocess(&[out], 1280, 720)
            .unwrap()
            .unwrap();
        assert_eq!(landmarks.layout(), LandmarkLayout::Coco17);
        assert_eq!(landmarks.points().len(), NK);
        let p = &landmarks.points()[5];
        assert!((p.x() - 0.5).abs() < 1e-5);
        assert!((p.y() - 0.5).abs() < 1e-5);
        assert!((p.confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_no_person_is_none() {
        let mut out = Array::zeros((1, CH, 8)).into_dyn();
        put_person(&mut out, 3, 320.0, 320.0, 0.2);
        assert!(postprocessor()
            .postprocess(&[out], 640, 640)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_keypoints_stay_inside_frame() {
        let mut out = Array::zeros((1, CH, 1)).into_dyn();
        put_person(&mut out, 0, 320.0, 320.0, 0.95);
        out[[0, 5, 0]] = -40.0;
        out[[0, 6, 0]] = 900.0;
        let landmarks = postprocessor()
            .postprocess(&[out], 640, 640)
            .unwrap()
            .unwrap();
        let p = &landmarks.points()[0];
        assert_eq!((p.x(), p.y()), (0.0, 1.0));
    }

    #[test]
    fn test_bad_shape_is_error() {
        let out = Array::zeros((1, 20, 10)).into_dyn();
        assert!(postprocessor().postprocess(&[out], 640, 640).is_err());
        assert!(postprocessor().postprocess(&[], 640, 640).is_err());
    }

    #[test]
    fn test_letterbox_preprocess() {
        let pp = YOLOv8PosePostprocessor::new(YOLOv8PoseConfig::default(), 64, 64);
        let img = RgbImage::from_pixel(128, 64, Rgb([255, 0, 0]));
        let xs = pp.preprocess(&img);
        assert_eq!(xs.shape(), &[1, 3, 64, 64]);
        // 上半部分是图像, 下半部分是填充
        assert!((xs[[0, 0, 10, 10]] - 1.0).abs() < 1e-2);
        assert!(xs[[0, 1, 10, 10]].abs() < 1e-2);
        assert!((xs[[0, 0, 50, 10]] - 144.0 / 255.0).abs() < 1e-6);
    }
}
