/// 高尔夫挥杆单帧分析
///
/// 对 `--source` 指定的图片/视频 (或目录下的全部图片和视频) 逐个分析, 视频只取第一帧,
/// 每张输出一行 JSON: 8 个身体部位的归一化坐标 + 球的位置和半径。
///
/// 日志级别用 `RUST_LOG` 控制, 默认 info。
use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use golf_swing_rs::source::{collect_sources, load_frame};
use golf_swing_rs::{annotate, Args, FrameAnalyzer};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let sources = collect_sources(&args.source)?;
    let mut analyzer = FrameAnalyzer::from_args(&args)?;
    info!(images = sources.len(), pose = !args.no_pose, "🚀 golf swing analysis");

    let mut failed = 0usize;
    for path in &sources {
        let frame = match load_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                let msg = format!("{e:#}");
                error!(path = %path.display(), error = %msg, "failed to decode source");
                failed += 1;
                continue;
            }
        };

        let t = std::time::Instant::now();
        let analysis = analyzer.analyze(&frame);
        if args.profile {
            println!("[Analyze]: {:?}", t.elapsed());
        }
        if !analysis.is_ok() {
            failed += 1;
        }

        let report = analysis.report();
        let mut json = serde_json::to_value(&report)?;
        if let Some(obj) = json.as_object_mut() {
            obj.insert(
                "source".to_string(),
                serde_json::Value::String(path.display().to_string()),
            );
        }
        println!("{}", json);

        if args.save {
            let annotated = annotate::draw(
                &frame,
                report.pose_keypoints.as_ref(),
                report.ball.as_ref(),
            );
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "frame".to_string());
            if let Err(e) = annotate::save(&annotated, &args.out, &stem) {
                let msg = format!("{e:#}");
                warn!(error = %msg, "failed to save annotated image");
            }
        }
    }

    if failed > 0 {
        warn!(failed, total = sources.len(), "some images could not be analyzed");
    }
    Ok(())
}
