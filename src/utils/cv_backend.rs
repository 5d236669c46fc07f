//! OpenCV 后端 (`opencv` feature)
//!
//! - `OpenCvHoughCircles`: medianBlur + cv::HoughCircles(HOUGH_GRADIENT)
//! - `read_first_frame`: 读取视频第一帧 (BGR)

use std::path::Path;

use anyhow::{bail, Context, Result};
use image::GrayImage;
use opencv::core::{self, Mat, Scalar, Vec3f, Vector};
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use tracing::{debug, info};

use crate::models::CircleFinder;
use crate::{ChannelOrder, Circle, Frame, HoughConfig};

#[derive(Debug, Clone)]
pub struct OpenCvHoughCircles {
    config: HoughConfig,
}

impl OpenCvHoughCircles {
    pub fn new(config: HoughConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn to_mat(gray: &GrayImage) -> Result<Mat> {
        let (w, h) = gray.dimensions();
        let mut mat =
            Mat::new_rows_cols_with_default(h as i32, w as i32, core::CV_8UC1, Scalar::all(0.0))?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
        Ok(mat)
    }
}

impl CircleFinder for OpenCvHoughCircles {
    fn find_circles(&self, frame: &Frame) -> Result<Vec<Circle>> {
        let cfg = &self.config;
        let gray = Self::to_mat(&frame.to_gray())?;

        let mut blurred = Mat::default();
        imgproc::median_blur(&gray, &mut blurred, cfg.median_ksize as i32)?;

        let mut found = Vector::<Vec3f>::new();
        imgproc::hough_circles(
            &blurred,
            &mut found,
            imgproc::HOUGH_GRADIENT,
            cfg.dp as f64,
            cfg.min_dist as f64,
            cfg.canny_threshold as f64,
            cfg.acc_threshold as f64,
            cfg.min_radius as i32,
            cfg.max_radius as i32,
        )
        .context("cv::HoughCircles failed")?;

        debug!(circles = found.len(), "opencv hough");
        Ok(found.iter().map(|c| Circle::new(c[0], c[1], c[2])).collect())
    }
}

/// 打开视频并解码第一帧
pub fn read_first_frame(path: &Path) -> Result<Frame> {
    let name = path.to_string_lossy();
    let mut cap = videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)
        .with_context(|| format!("failed to open video {}", name))?;
    if !cap.is_opened()? {
        bail!("unable to open video {}", name);
    }

    let mut mat = Mat::default();
    if !cap.read(&mut mat)? || mat.empty() {
        bail!("video {} has no decodable frame", name);
    }
    if mat.typ() != core::CV_8UC3 {
        bail!("unexpected frame type {} in {}", mat.typ(), name);
    }
    let mat = if mat.is_continuous() { mat } else { mat.try_clone()? };

    let (rows, cols) = (mat.rows() as u32, mat.cols() as u32);
    info!(path = %name, width = cols, height = rows, "first video frame decoded");
    Ok(Frame::from_raw(
        cols,
        rows,
        mat.data_bytes()?.to_vec(),
        ChannelOrder::Bgr,
    )?)
}
