/// 模型文件定位: 本地路径直接使用, http(s) 地址下载到缓存目录后复用
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

const CACHE_SUBDIR: &str = "golf-swing-rs";

pub fn is_url(model: &str) -> bool {
    model.starts_with("http://") || model.starts_with("https://")
}

/// 缓存根目录, 如 `~/.cache/golf-swing-rs`
pub fn cache_root() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|d| d.join(CACHE_SUBDIR))
        .ok_or_else(|| anyhow!("no cache directory on this platform"))
}

/// URL 对应的缓存文件 (取 URL 最后一段作为文件名, 去掉 query)
pub fn cache_path(root: &Path, url: &str) -> Result<PathBuf> {
    let name = url
        .split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| anyhow!("cannot derive a file name from {}", url))?;
    Ok(root.join(name))
}

/// 返回可直接交给 ONNX Runtime 的本地文件路径
pub fn resolve(model: &str) -> Result<PathBuf> {
    if !is_url(model) {
        let path = PathBuf::from(model);
        if !path.is_file() {
            bail!("model file not found: {}", path.display());
        }
        return Ok(path);
    }

    let root = cache_root()?;
    let dst = cache_path(&root, model)?;
    if dst.is_file() {
        info!(path = %dst.display(), "using cached model");
        return Ok(dst);
    }
    fs::create_dir_all(&root)
        .with_context(|| format!("failed to create cache dir {}", root.display()))?;
    download(model, &dst)?;
    Ok(dst)
}

fn download(url: &str, dst: &Path) -> Result<()> {
    info!(url, dst = %dst.display(), "downloading model");
    let t = std::time::Instant::now();

    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to fetch {}", url))?;

    // 先写临时文件, 完整下载后再改名, 避免留下半个模型
    let tmp = dst.with_extension("part");
    let mut file =
        fs::File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    let bytes = io::copy(&mut response.into_reader(), &mut file)
        .with_context(|| format!("failed to download {}", url))?;
    drop(file);
    fs::rename(&tmp, dst).with_context(|| format!("failed to move model to {}", dst.display()))?;

    info!(bytes, elapsed = ?t.elapsed(), "model downloaded");
    Ok(())
}
