//! 梯度 Hough 圆检测
//!
//! 流程: 中值滤波 → Canny 边缘 → 沿 Sobel 梯度正反两个方向在
//! [min_radius, max_radius] 范围内投票 → 3x3 邻域聚合累加器 →
//! 局部极大值作为圆心候选 (按票数降序) → 对每个圆心统计边缘点距离
//! 直方图估计半径。
//!
//! 半径只统计梯度方向接近径向的边缘点, 且这些点至少要覆盖
//! `min_coverage` 比例的圆周; 噪声的边缘方向杂乱, 过不了这一关。
//!
//! 圆心坐标为像素下标坐标 (第 0 列像素中心 x = 0)。

use anyhow::Result;
use image::GrayImage;
use imageproc::{edges, filter, gradients};
use tracing::trace;

use crate::config::HoughConfig;
use crate::models::CircleFinder;
use crate::{Circle, Frame};

/// 梯度与径向夹角的余弦下限 (约 26°)
const RADIAL_COS: f32 = 0.9;

/// 边缘点: 坐标 + 单位梯度方向
#[derive(Debug, Clone, Copy)]
struct EdgePoint {
    x: f32,
    y: f32,
    ux: f32,
    uy: f32,
}

#[derive(Debug, Clone, Default)]
pub struct HoughCircles {
    config: HoughConfig,
}

/// 累加器 (外围各留一格, 下标 +1)
struct Accumulator {
    cols: usize,
    rows: usize,
    votes: Vec<u32>,
}

impl Accumulator {
    fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            votes: vec![0; (cols + 2) * (rows + 2)],
        }
    }

    #[inline]
    fn idx(&self, cx: usize, cy: usize) -> usize {
        (cy + 1) * (self.cols + 2) + cx + 1
    }

    fn vote(&mut self, cx: usize, cy: usize) {
        let i = self.idx(cx, cy);
        self.votes[i] += 1;
    }

    /// 3x3 邻域求和, 圆心落在相邻格子的票合并到一起
    fn pooled(&self) -> Self {
        let stride = self.cols + 2;
        let mut out = Self::new(self.cols, self.rows);
        for cy in 0..self.rows {
            for cx in 0..self.cols {
                let c = self.idx(cx, cy);
                let mut sum = 0;
                for row in [c - stride, c, c + stride] {
                    sum += self.votes[row - 1] + self.votes[row] + self.votes[row + 1];
                }
                out.votes[c] = sum;
            }
        }
        out
    }

    /// 局部极大值 (左/上严格大于, 右/下大于等于), 票数降序, 同票按扫描顺序
    fn peaks(&self, threshold: u32) -> Vec<(usize, usize, u32)> {
        let stride = self.cols + 2;
        let mut peaks = Vec::new();
        for cy in 0..self.rows {
            for cx in 0..self.cols {
                let c = self.idx(cx, cy);
                let v = self.votes[c];
                if v > threshold
                    && v > self.votes[c - 1]
                    && v >= self.votes[c + 1]
                    && v > self.votes[c - stride]
                    && v >= self.votes[c + stride]
                {
                    peaks.push((cx, cy, v));
                }
            }
        }
        peaks.sort_by(|a, b| b.2.cmp(&a.2));
        peaks
    }
}

impl HoughCircles {
    pub fn new(config: HoughConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &HoughConfig {
        &self.config
    }

    /// 中值滤波去噪
    pub fn preprocess(&self, gray: &GrayImage) -> GrayImage {
        let r = self.config.median_ksize / 2;
        filter::median_filter(gray, r, r)
    }

    /// 在已平滑的灰度图上检测圆, 按累加器票数降序返回
    pub fn detect(&self, gray: &GrayImage) -> Vec<Circle> {
        let cfg = &self.config;
        let (w, h) = gray.dimensions();
        if w < 3 || h < 3 {
            return Vec::new();
        }

        let high = cfg.canny_threshold;
        let edge_map = edges::canny(gray, (high / 2.0).max(1.0), high);
        let dx = gradients::horizontal_sobel(gray);
        let dy = gradients::vertical_sobel(gray);

        let dp = cfg.dp;
        let cols = (w as f32 / dp).ceil() as usize;
        let rows = (h as f32 / dp).ceil() as usize;
        let mut acc = Accumulator::new(cols, rows);
        let mut points: Vec<EdgePoint> = Vec::new();

        for (x, y, e) in edge_map.enumerate_pixels() {
            if e.0[0] == 0 {
                continue;
            }
            let vx = dx.get_pixel(x, y).0[0] as f32;
            let vy = dy.get_pixel(x, y).0[0] as f32;
            if vx == 0.0 && vy == 0.0 {
                continue;
            }
            let (x, y) = (x as f32, y as f32);
            let mag = vx.hypot(vy);
            let (vx, vy) = (vx / mag, vy / mag);
            points.push(EdgePoint {
                x,
                y,
                ux: vx,
                uy: vy,
            });
            for k in [1.0f32, -1.0] {
                for r in cfg.min_radius..=cfg.max_radius {
                    let r = r as f32;
                    let cx = ((x + k * vx * r) / dp).round();
                    let cy = ((y + k * vy * r) / dp).round();
                    if cx < 0.0 || cy < 0.0 || cx >= cols as f32 || cy >= rows as f32 {
                        break;
                    }
                    acc.vote(cx as usize, cy as usize);
                }
            }
        }

        let peaks = acc.pooled().peaks(cfg.acc_threshold);
        trace!(edges = points.len(), peaks = peaks.len(), "hough accumulate");

        let min_dist2 = cfg.min_dist * cfg.min_dist;
        let mut circles: Vec<Circle> = Vec::new();
        for (cx, cy, _) in peaks {
            let x = cx as f32 * dp;
            let y = cy as f32 * dp;
            if circles
                .iter()
                .any(|c| (c.x - x).powi(2) + (c.y - y).powi(2) < min_dist2)
            {
                continue;
            }
            if let Some((radius, support)) = self.estimate_radius(&points, x, y) {
                circles.push(Circle {
                    x,
                    y,
                    radius,
                    support,
                });
            }
        }
        circles
    }

    /// 径向边缘点到圆心距离排序后按 dp 宽度分组, 选 "点数 / 半径" 最大的一组
    fn estimate_radius(&self, points: &[EdgePoint], x: f32, y: f32) -> Option<(f32, u32)> {
        let cfg = &self.config;
        let r2_min = (cfg.min_radius * cfg.min_radius) as f32;
        let r2_max = (cfg.max_radius * cfg.max_radius) as f32;

        let mut dist: Vec<f32> = points
            .iter()
            .filter_map(|p| {
                let (dx, dy) = (p.x - x, p.y - y);
                let d2 = dx * dx + dy * dy;
                if !(r2_min..=r2_max).contains(&d2) {
                    return None;
                }
                let d = d2.sqrt();
                let radial = (dx * p.ux + dy * p.uy).abs() >= RADIAL_COS * d;
                radial.then_some(d)
            })
            .collect();
        if dist.is_empty() {
            return None;
        }
        dist.sort_by(f32::total_cmp);

        let mut best = 0.0f32;
        let mut max_count = 0usize;
        let mut start = 0;
        for j in 1..=dist.len() {
            if j == dist.len() || dist[j] - dist[start] > cfg.dp {
                let count = j - start;
                let r_cur = dist[(start + j - 1) / 2];
                if count as f32 * best >= max_count as f32 * r_cur
                    || (best == 0.0 && count >= max_count)
                {
                    best = r_cur;
                    max_count = count;
                }
                start = j;
            }
        }

        let support = max_count as u32;
        let circumference = 2.0 * std::f32::consts::PI * best;
        let covered = support as f32 >= cfg.min_coverage * circumference;
        (support > cfg.acc_threshold && covered).then_some((best, support))
    }
}

impl CircleFinder for HoughCircles {
    fn find_circles(&self, frame: &Frame) -> Result<Vec<Circle>> {
        let gray = frame.to_gray();
        Ok(self.detect(&self.preprocess(&gray)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelOrder;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn disk_frame(disks: &[(i32, i32, i32)], fg: u8, bg: u8) -> Frame {
        let mut img = RgbImage::from_pixel(200, 160, Rgb([bg, bg, bg]));
        for &(x, y, r) in disks {
            draw_filled_circle_mut(&mut img, (x, y), r, Rgb([fg, fg, fg]));
        }
        Frame::new(img, ChannelOrder::Rgb)
    }

    #[test]
    fn test_single_disk() {
        let frame = disk_frame(&[(100, 80, 15)], 255, 0);
        let circles = HoughCircles::default().find_circles(&frame).unwrap();
        assert!(!circles.is_empty());
        let c = circles[0];
        assert!((c.x - 100.0).abs() <= 3.0, "{:?}", c);
        assert!((c.y - 80.0).abs() <= 3.0, "{:?}", c);
        assert!((c.radius - 15.0).abs() <= 3.0, "{:?}", c);
        assert!(c.support > 30);
    }

    #[test]
    fn test_dark_disk_on_gray() {
        let frame = disk_frame(&[(60, 70, 12)], 20, 180);
        let circles = HoughCircles::default().find_circles(&frame).unwrap();
        assert!(circles
            .iter()
            .any(|c| (c.x - 60.0).abs() <= 3.0 && (c.y - 70.0).abs() <= 3.0));
    }

    #[test]
    fn test_two_disks_far_apart() {
        let frame = disk_frame(&[(40, 40, 10), (140, 100, 25)], 255, 0);
        let circles = HoughCircles::default().find_circles(&frame).unwrap();
        let near = |x: f32, y: f32| {
            circles
                .iter()
                .find(|c| (c.x - x).abs() <= 3.0 && (c.y - y).abs() <= 3.0)
                .copied()
        };
        let small = near(40.0, 40.0).unwrap();
        let big = near(140.0, 100.0).unwrap();
        assert!(small.radius < big.radius);
    }

    #[test]
    fn test_min_dist_between_centers() {
        let frame = disk_frame(&[(40, 40, 10), (140, 100, 25)], 255, 0);
        let hough = HoughCircles::default();
        let circles = hough.find_circles(&frame).unwrap();
        let min_dist = hough.config().min_dist;
        for (i, a) in circles.iter().enumerate() {
            for b in circles.iter().skip(i + 1) {
                assert!((a.x - b.x).hypot(a.y - b.y) >= min_dist);
            }
        }
    }

    #[test]
    fn test_blank_and_smooth_frames() {
        let hough = HoughCircles::default();
        let blank = Frame::new(RgbImage::from_pixel(200, 160, Rgb([90, 90, 90])), ChannelOrder::Rgb);
        assert!(hough.find_circles(&blank).unwrap().is_empty());

        let gradient = RgbImage::from_fn(200, 160, |x, _| {
            let v = (x * 255 / 199) as u8;
            Rgb([v, v, v])
        });
        let gradient = Frame::new(gradient, ChannelOrder::Rgb);
        assert!(hough.find_circles(&gradient).unwrap().is_empty());
    }

    #[test]
    fn test_low_noise_has_no_circle() {
        let mut rng = StdRng::seed_from_u64(7);
        let img = RgbImage::from_fn(200, 160, |_, _| {
            let v = rng.gen_range(112u8..=128);
            Rgb([v, v, v])
        });
        let frame = Frame::new(img, ChannelOrder::Rgb);
        assert!(HoughCircles::default().find_circles(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_full_range_noise_has_no_circle() {
        let hough = HoughCircles::default();
        for seed in 0..10 {
            let mut rng = StdRng::seed_from_u64(seed);
            let img = RgbImage::from_fn(200, 160, |_, _| {
                let v = rng.gen_range(0u8..=255);
                Rgb([v, v, v])
            });
            let circles = hough
                .find_circles(&Frame::new(img, ChannelOrder::Rgb))
                .unwrap();
            assert!(circles.is_empty(), "seed {}: {:?}", seed, circles.first());
        }
    }

    #[test]
    fn test_disk_in_mild_noise() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut img = RgbImage::from_fn(200, 160, |_, _| {
            let v = rng.gen_range(0u8..=20);
            Rgb([v, v, v])
        });
        draw_filled_circle_mut(&mut img, (100, 80), 15, Rgb([235, 235, 235]));
        let circles = HoughCircles::default()
            .find_circles(&Frame::new(img, ChannelOrder::Rgb))
            .unwrap();
        let c = circles[0];
        assert!((c.x - 100.0).abs() <= 3.0 && (c.y - 80.0).abs() <= 3.0, "{:?}", c);
    }

    #[test]
    fn test_partial_arc_below_coverage() {
        // 只有四分之一圆弧, 覆盖率不够
        let mut img = RgbImage::from_pixel(200, 160, Rgb([0, 0, 0]));
        draw_filled_circle_mut(&mut img, (100, 80), 20, Rgb([255, 255, 255]));
        for (x, y, p) in img.enumerate_pixels_mut() {
            if x < 100 || y < 80 {
                *p = Rgb([0, 0, 0]);
            }
        }
        let frame = Frame::new(img, ChannelOrder::Rgb);
        let strict = HoughCircles::default().find_circles(&frame).unwrap();
        assert!(strict
            .iter()
            .all(|c| (c.x - 100.0).abs() > 3.0 || (c.y - 80.0).abs() > 3.0 || c.radius < 15.0));
    }

    #[test]
    fn test_deterministic() {
        let frame = disk_frame(&[(40, 40, 10), (140, 100, 25)], 255, 0);
        let hough = HoughCircles::default();
        assert_eq!(
            hough.find_circles(&frame).unwrap(),
            hough.find_circles(&frame).unwrap()
        );
    }

    #[test]
    fn test_tiny_frame() {
        let frame = Frame::new(RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])), ChannelOrder::Rgb);
        assert!(HoughCircles::default().find_circles(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let cfg = HoughConfig {
            median_ksize: 2,
            ..Default::default()
        };
        assert!(HoughCircles::new(cfg).is_err());
    }
}
