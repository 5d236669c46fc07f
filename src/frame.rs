/// 单帧输入 (Frame)
///
/// 解码由调用方完成, 这里只持有内存中的 8-bit 三通道像素和通道顺序。
/// OpenCV 解码出来的是 BGR, `image` crate 解码出来的是 RGB。
use std::borrow::Cow;

use image::{imageops, DynamicImage, GrayImage, RgbImage};

use crate::error::{AnalyzerError, AnalyzerResult};

/// 像素通道顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pixels: RgbImage,
    order: ChannelOrder,
}

impl Frame {
    pub fn new(pixels: RgbImage, order: ChannelOrder) -> Self {
        Self { pixels, order }
    }

    /// 从裸缓冲区构建, 长度必须等于 width * height * 3
    pub fn from_raw(
        width: u32,
        height: u32,
        data: Vec<u8>,
        order: ChannelOrder,
    ) -> AnalyzerResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(AnalyzerError::invalid_frame(format!(
                "buffer holds {} bytes, {}x{}x3 needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        let pixels = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| AnalyzerError::invalid_frame("buffer does not match dimensions"))?;
        Ok(Self { pixels, order })
    }

    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self {
            pixels: image.to_rgb8(),
            order: ChannelOrder::Rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn validate(&self) -> AnalyzerResult<()> {
        if self.is_empty() {
            return Err(AnalyzerError::invalid_frame(format!(
                "frame has zero size ({}x{})",
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }

    /// 原始像素, 按 `order()` 排列
    pub fn raw(&self) -> &RgbImage {
        &self.pixels
    }

    /// 转成 RGB 顺序 (模型期望的输入), 已是 RGB 时不复制
    pub fn to_rgb(&self) -> Cow<'_, RgbImage> {
        match self.order {
            ChannelOrder::Rgb => Cow::Borrowed(&self.pixels),
            ChannelOrder::Bgr => {
                let mut rgb = self.pixels.clone();
                for p in rgb.pixels_mut() {
                    p.0.swap(0, 2);
                }
                Cow::Owned(rgb)
            }
        }
    }

    pub fn to_gray(&self) -> GrayImage {
        let rgb = self.to_rgb();
        imageops::grayscale(&*rgb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_from_raw_rejects_length_mismatch() {
        let err = Frame::from_raw(4, 4, vec![0; 10], ChannelOrder::Rgb).unwrap_err();
        assert!(err.is_invalid_frame());
    }

    #[test]
    fn test_empty_frame_fails_validation() {
        let frame = Frame::new(RgbImage::new(0, 0), ChannelOrder::Rgb);
        assert!(frame.is_empty());
        assert!(frame.validate().unwrap_err().is_invalid_frame());

        let frame = Frame::from_raw(0, 8, Vec::new(), ChannelOrder::Bgr).unwrap();
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_bgr_is_swapped_to_rgb() {
        let frame = Frame::from_raw(1, 1, vec![10, 20, 30], ChannelOrder::Bgr).unwrap();
        assert_eq!(frame.to_rgb().get_pixel(0, 0), &Rgb([30, 20, 10]));
        // 原始缓冲区不变
        assert_eq!(frame.raw().get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_rgb_is_borrowed() {
        let frame = Frame::new(RgbImage::new(2, 2), ChannelOrder::Rgb);
        assert!(matches!(frame.to_rgb(), Cow::Borrowed(_)));
        assert_eq!(frame.to_gray().dimensions(), (2, 2));
    }
}
