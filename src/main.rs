use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use hand_rom::config::Config;
use hand_rom::replay::{load_frame_log, rescore, score_frame_stateless};
use hand_rom::tracker::SessionAggregator;

const CONFIG_PATH: &str = "config.toml";

#[derive(Parser, Debug)]
#[command(name = "hand-rom", version = env!("HAND_ROM_BUILD"), about = "Score hand/wrist range of motion from a recorded frame log")]
struct Cli {
    /// JSON lines のフレームログ
    frames: PathBuf,

    /// 設定ファイル（無ければデフォルト）
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// 最初のフレームを手首ニュートラルとしてキャリブレーションする
    #[arg(long)]
    calibrate_first: bool,

    /// 各フレームを履歴なしで評価して JSON lines で出力する
    #[arg(long)]
    per_frame: bool,

    /// 整形して出力
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hand_rom=info".into()),
        )
        .init();

    let config = Config::load_or_default(&cli.config)?;

    let frames = load_frame_log(&cli.frames)?;
    info!(frames = frames.len(), path = %cli.frames.display(), "frame log loaded");

    if cli.per_frame {
        for frame in &frames {
            let outcome = score_frame_stateless(&config, frame)?;
            let line = serde_json::json!({
                "timestampMs": frame.timestamp_ms,
                "skipped": outcome.skipped.is_some(),
                "fingers": outcome
                    .fingers
                    .iter()
                    .map(|(finger, angles, _)| (finger.as_str(), angles))
                    .collect::<std::collections::BTreeMap<_, _>>(),
                "wrist": outcome.wrist,
            });
            println!("{}", line);
        }
        return Ok(());
    }

    let mut aggregator = SessionAggregator::new(&config);
    let (calibration, frames) = match frames.split_first() {
        Some((first, rest)) if cli.calibrate_first => (Some(first), rest),
        _ => (None, frames.as_slice()),
    };
    if let Some(first) = calibration {
        aggregator.reset_session();
        if aggregator.calibrate_wrist_neutral(first) {
            info!(
                baseline = aggregator.session().neutral_baseline().unwrap_or_default(),
                "neutral calibrated from first frame"
            );
        } else {
            tracing::warn!("first frame unusable for neutral calibration, using configured baseline");
        }
    }

    let report = if calibration.is_some() {
        // キャリブレーション値を残すため reset せずに流す
        for frame in frames {
            aggregator
                .process(frame)
                .with_context(|| format!("frame at {}ms", frame.timestamp_ms))?;
        }
        aggregator.report()
    } else {
        rescore(&mut aggregator, frames)?
    };

    info!(
        processed = report.frames.processed,
        skipped = report.frames.skipped,
        rejected = report.frames.rejected_samples,
        hand = report.wrist.hand_type.map_or("unknown", |s| s.as_str()),
        "session scored"
    );
    for (joint, history) in aggregator.session().histories() {
        if history.rejected_count() > 0 {
            debug!(
                %joint,
                accepted = history.accepted_count(),
                rejected = history.rejected_count(),
                "joint samples rejected"
            );
        }
    }

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}
