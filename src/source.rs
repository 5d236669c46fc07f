/// 命令行输入: 单张图片、单个视频 (只取第一帧) 或一个目录
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::Frame;

const IMAGE_EXTS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "tiff"];
const VIDEO_EXTS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
}

pub fn kind_of(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if IMAGE_EXTS.contains(&ext.as_str()) {
        Some(SourceKind::Image)
    } else if VIDEO_EXTS.contains(&ext.as_str()) {
        Some(SourceKind::Video)
    } else {
        None
    }
}

/// 单个文件直接返回, 目录按文件名排序后返回其中的图片和视频
pub fn collect_sources(source: &str) -> Result<Vec<PathBuf>> {
    let path = PathBuf::from(source);
    if path.is_file() {
        return Ok(vec![path]);
    }
    if !path.is_dir() {
        bail!("source not found: {}", source);
    }
    let mut files = Vec::new();
    for entry in
        std::fs::read_dir(&path).with_context(|| format!("failed to read dir {}", source))?
    {
        let p = entry?.path();
        if p.is_file() && kind_of(&p).is_some() {
            files.push(p);
        }
    }
    files.sort();
    if files.is_empty() {
        bail!("no images or videos under {}", source);
    }
    Ok(files)
}

/// 解码成一帧: 图片直接解码, 视频取第一帧
pub fn load_frame(path: &Path) -> Result<Frame> {
    match kind_of(path) {
        Some(SourceKind::Video) => read_video(path),
        _ => {
            let img = image::open(path)
                .with_context(|| format!("failed to decode image {}", path.display()))?;
            Ok(Frame::from_dynamic(&img))
        }
    }
}

#[cfg(feature = "opencv")]
fn read_video(path: &Path) -> Result<Frame> {
    crate::utils::cv_backend::read_first_frame(path)
}

#[cfg(not(feature = "opencv"))]
fn read_video(path: &Path) -> Result<Frame> {
    bail!(
        "video input {} needs the `opencv` feature",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_kind_of() {
        assert_eq!(kind_of(Path::new("a/swing.JPG")), Some(SourceKind::Image));
        assert_eq!(kind_of(Path::new("swing.mp4")), Some(SourceKind::Video));
        assert_eq!(kind_of(Path::new("notes.txt")), None);
        assert_eq!(kind_of(Path::new("README")), None);
    }

    #[test]
    fn test_collect_and_load() {
        let dir = std::env::temp_dir().join(format!("golf-swing-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        RgbImage::from_pixel(4, 3, Rgb([10, 20, 30]))
            .save(dir.join("b.png"))
            .unwrap();
        std::fs::write(dir.join("a.mp4"), b"not really a video").unwrap();
        std::fs::write(dir.join("notes.txt"), b"skip me").unwrap();

        let files = collect_sources(dir.to_str().unwrap()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.mp4", "b.png"]);

        let frame = load_frame(&files[1]).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert!(load_frame(&files[0]).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_source() {
        assert!(collect_sources("/definitely/missing/swings").is_err());
    }
}
