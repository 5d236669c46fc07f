/// 结果绘制: 关键点画实心绿点, 球画红色圆环 (线宽 3, 中心落在半径上)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut};
use tracing::info;

use crate::{gen_time_string, Ball, Frame, KeypointSet};

const KEYPOINT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const KEYPOINT_RADIUS: i32 = 8;
const BALL_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BALL_THICKNESS: i32 = 3;

/// 在帧的 RGB 副本上绘制结果
pub fn draw(frame: &Frame, keypoints: Option<&KeypointSet>, ball: Option<&Ball>) -> RgbImage {
    let mut img = frame.to_rgb().into_owned();
    let (w, h) = (frame.width() as f32, frame.height() as f32);

    if let Some(kpts) = keypoints {
        for (_, p) in kpts.iter() {
            let x = (p.x() * w).round() as i32;
            let y = (p.y() * h).round() as i32;
            draw_filled_circle_mut(&mut img, (x, y), KEYPOINT_RADIUS, KEYPOINT_COLOR);
        }
    }

    if let Some(ball) = ball {
        let center = (ball.x as i32, ball.y as i32);
        // 线宽以半径为中心
        let half = BALL_THICKNESS / 2;
        for t in -half..=half {
            let r = ball.radius as i32 + t;
            if r > 0 {
                draw_hollow_circle_mut(&mut img, center, r, BALL_COLOR);
            }
        }
    }
    img
}

/// 保存到 `out` 目录, 文件名带时间戳
pub fn save<P: AsRef<Path>>(img: &RgbImage, out: P, stem: &str) -> Result<PathBuf> {
    let out = out.as_ref();
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create output dir {}", out.display()))?;
    let path = out.join(format!("{}-{}.jpg", stem, gen_time_string("-")));
    img.save(&path)
        .with_context(|| format!("failed to save {}", path.display()))?;
    info!(path = %path.display(), "annotated image saved");
    Ok(path)
}
