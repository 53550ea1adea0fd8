//! Re-scoring of stored frame logs.
//!
//! A frame log is JSON lines, one `FrameInput` per line. `rescore` replays the
//! whole log through a fresh session in recorded order, so it reproduces the
//! live result. `score_frame_stateless` scores a single frame with no history,
//! for scrubbing a replay timeline; its values are never used for maxima.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::error::EngineError;
use crate::pose::FrameInput;
use crate::tracker::{FrameOutcome, SessionAggregator, SessionRomReport};

/// JSON lines のフレームログを読む。空行は無視
pub fn load_frame_log<P: AsRef<Path>>(path: P) -> Result<Vec<FrameInput>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open frame log {}", path.display()))?;
    let mut frames = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {} line {}", path.display(), line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: FrameInput = serde_json::from_str(&line)
            .with_context(|| format!("parse {} line {}", path.display(), line_no + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

/// 新しいセッションで全フレームを順に処理し直す
pub fn rescore(aggregator: &mut SessionAggregator, frames: &[FrameInput]) -> Result<SessionRomReport> {
    aggregator.reset_session();
    for frame in frames {
        aggregator
            .process(frame)
            .with_context(|| format!("frame at {}ms", frame.timestamp_ms))?;
    }
    Ok(aggregator.report())
}

/// 履歴を使わず1フレームだけ評価する（タイムライン操作用）
pub fn score_frame_stateless(config: &Config, frame: &FrameInput) -> Result<FrameOutcome, EngineError> {
    SessionAggregator::new(config).process(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_frame_log_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"timestampMs": 0}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"timestampMs": 33, "handedness": "RIGHT"}}"#).unwrap();
        let frames = load_frame_log(file.path()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_ms, 33);
    }

    #[test]
    fn test_load_frame_log_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"timestampMs": 0}}"#).unwrap();
        writeln!(file, "not json").unwrap();
        let err = load_frame_log(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"), "{:#}", err);
    }

    #[test]
    fn test_rescore_out_of_order_fails() {
        let frames = vec![
            FrameInput { timestamp_ms: 10, ..Default::default() },
            FrameInput { timestamp_ms: 5, ..Default::default() },
        ];
        let mut agg = SessionAggregator::default();
        assert!(rescore(&mut agg, &frames).is_err());
    }

    #[test]
    fn test_stateless_frame_without_hand() {
        let outcome = score_frame_stateless(&Config::default(), &FrameInput::default()).unwrap();
        assert!(outcome.skipped.is_some());
    }
}
