pub mod hough_circles; // 梯度 Hough 圆检测
#[cfg(feature = "opencv")]
pub mod cv_backend; // OpenCV 圆检测与视频首帧读取

use anyhow::Result;

use crate::models::CircleFinder;
use crate::{CircleBackend, HoughConfig, HoughCircles};

/// 按配置构造圆检测实现
pub fn circle_finder(backend: CircleBackend, config: &HoughConfig) -> Result<Box<dyn CircleFinder>> {
    match backend {
        CircleBackend::Imageproc => Ok(Box::new(HoughCircles::new(config.clone())?)),
        #[cfg(feature = "opencv")]
        CircleBackend::Opencv => Ok(Box::new(cv_backend::OpenCvHoughCircles::new(
            config.clone(),
        )?)),
        #[cfg(not(feature = "opencv"))]
        CircleBackend::Opencv => anyhow::bail!("built without the `opencv` feature"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend() {
        assert!(circle_finder(CircleBackend::Imageproc, &HoughConfig::default()).is_ok());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_opencv_backend_needs_feature() {
        assert!(circle_finder(CircleBackend::Opencv, &HoughConfig::default()).is_err());
    }
}
