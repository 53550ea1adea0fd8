use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::EngineError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub wrist: WristConfig,
    #[serde(default)]
    pub input: InputConfig,
}

/// 時系列整合性チェックの設定
#[derive(Debug, Deserialize, Clone)]
pub struct TemporalConfig {
    /// 関節ごとに保持する採用済みサンプル数
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// 整合性チェックで比較する直近サンプル数
    #[serde(default = "default_consistency_window")]
    pub consistency_window: usize,
    /// 1フレームあたりの最大変化量（度）
    #[serde(default = "default_max_change_per_frame")]
    pub max_change_per_frame: f32,
    /// 直近ウィンドウとの最大偏差の閾値（度）
    #[serde(default = "default_consistency_threshold")]
    pub consistency_threshold: f32,
    /// 信頼できる最大値に必要な採用サンプル数
    #[serde(default = "default_min_valid_frames")]
    pub min_valid_frames: usize,
    /// 平滑化最大値に使う上位サンプル数
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// サンプル不足時の品質スコア
    #[serde(default = "default_low_quality_score")]
    pub low_quality_score: f32,
    /// 連続棄却がこの回数に達したらウィンドウを張り直す（0で無効）
    #[serde(default = "default_max_consecutive_rejections")]
    pub max_consecutive_rejections: usize,
}

fn default_window_size() -> usize { 5 }
fn default_consistency_window() -> usize { 3 }
fn default_max_change_per_frame() -> f32 { 30.0 }
fn default_consistency_threshold() -> f32 { 30.0 }
fn default_min_valid_frames() -> usize { 10 }
fn default_top_k() -> usize { 3 }
fn default_low_quality_score() -> f32 { 0.3 }
fn default_max_consecutive_rejections() -> usize { 8 }

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            consistency_window: default_consistency_window(),
            max_change_per_frame: default_max_change_per_frame(),
            consistency_threshold: default_consistency_threshold(),
            min_valid_frames: default_min_valid_frames(),
            top_k: default_top_k(),
            low_quality_score: default_low_quality_score(),
            max_consecutive_rejections: default_max_consecutive_rejections(),
        }
    }
}

/// 屈曲/伸展の符号判定に使う外積の成分
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectionAxis {
    X,
    Y,
    Z,
}

impl DirectionAxis {
    pub fn component(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// 肘基準の手首角度計算の設定
#[derive(Debug, Deserialize, Clone)]
pub struct WristConfig {
    /// 角度計算に必要な肘の可視度
    #[serde(default = "default_min_elbow_visibility")]
    pub min_elbow_visibility: f32,
    /// 角度計算に必要な手首（ポーズ側）の可視度
    #[serde(default = "default_min_wrist_visibility")]
    pub min_wrist_visibility: f32,
    /// 左右判定に使うフレームの条件。どちらかの腕の肘と手首がこれを超えること
    #[serde(default = "default_min_lock_visibility")]
    pub min_lock_visibility: f32,
    /// 左右判定で側を採用する肘可視度の下限
    #[serde(default = "default_elbow_accept_visibility")]
    pub elbow_accept_visibility: f32,
    /// 距離判定を可視度で上書きする差分
    #[serde(default = "default_visibility_margin")]
    pub visibility_margin: f32,
    /// 手首まっすぐ時の前腕-手ベクトル角（度、屈曲側が正）
    #[serde(default = "default_neutral_baseline_deg")]
    pub neutral_baseline_deg: f32,
    #[serde(default = "default_direction_axis")]
    pub direction_axis: DirectionAxis,
    /// 左手で屈曲/伸展の符号を反転する
    #[serde(default = "default_mirror_left")]
    pub mirror_left: bool,
    /// ロックまでに同じ側が連続して選ばれる回数
    #[serde(default = "default_lock_confirm_frames")]
    pub lock_confirm_frames: u32,
}

fn default_min_elbow_visibility() -> f32 { 0.3 }
fn default_min_wrist_visibility() -> f32 { 0.3 }
fn default_min_lock_visibility() -> f32 { 0.0 }
fn default_elbow_accept_visibility() -> f32 { 0.15 }
fn default_visibility_margin() -> f32 { 0.1 }
fn default_neutral_baseline_deg() -> f32 { 0.0 }
fn default_direction_axis() -> DirectionAxis { DirectionAxis::Z }
fn default_mirror_left() -> bool { true }
fn default_lock_confirm_frames() -> u32 { 1 }

impl Default for WristConfig {
    fn default() -> Self {
        Self {
            min_elbow_visibility: default_min_elbow_visibility(),
            min_wrist_visibility: default_min_wrist_visibility(),
            min_lock_visibility: default_min_lock_visibility(),
            elbow_accept_visibility: default_elbow_accept_visibility(),
            visibility_margin: default_visibility_margin(),
            neutral_baseline_deg: default_neutral_baseline_deg(),
            direction_axis: default_direction_axis(),
            mirror_left: default_mirror_left(),
            lock_confirm_frames: default_lock_confirm_frames(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InputConfig {
    /// これ未満のトラッキング品質のフレームは捨てる
    #[serde(default)]
    pub min_tracking_quality: f32,
}

impl Config {
    /// ファイルが無い・読めないときだけデフォルト設定を使う
    ///
    /// 読めたのに壊れている、または値が不正な設定はエラーにする
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("config {} not loaded ({}), using defaults", path.display(), e);
                return Ok(Self::default());
            }
        };
        Self::parse(&content).with_context(|| format!("config {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let t = &self.temporal;
        if t.window_size == 0 {
            return Err(EngineError::InvalidConfig("temporal.window_size must be > 0".into()));
        }
        if t.consistency_window > t.window_size {
            return Err(EngineError::InvalidConfig(format!(
                "temporal.consistency_window ({}) exceeds window_size ({})",
                t.consistency_window, t.window_size
            )));
        }
        if t.top_k == 0 {
            return Err(EngineError::InvalidConfig("temporal.top_k must be > 0".into()));
        }
        if !(t.max_change_per_frame > 0.0) || !(t.consistency_threshold > 0.0) {
            return Err(EngineError::InvalidConfig(
                "temporal thresholds must be positive".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.wrist.min_lock_visibility) {
            return Err(EngineError::InvalidConfig(
                "wrist.min_lock_visibility must be in [0, 1)".into(),
            ));
        }
        if self.wrist.lock_confirm_frames == 0 {
            return Err(EngineError::InvalidConfig(
                "wrist.lock_confirm_frames must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.temporal.window_size, 5);
        assert_eq!(config.temporal.consistency_window, 3);
        assert_eq!(config.temporal.min_valid_frames, 10);
        assert_eq!(config.wrist.direction_axis, DirectionAxis::Z);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_section() {
        let config: Config = toml::from_str(
            r#"
            [temporal]
            max_change_per_frame = 20.0

            [wrist]
            direction_axis = "x"
            neutral_baseline_deg = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(config.temporal.max_change_per_frame, 20.0);
        assert_eq!(config.temporal.top_k, 3);
        assert_eq!(config.wrist.direction_axis, DirectionAxis::X);
        assert_eq!(config.wrist.neutral_baseline_deg, 12.5);
        assert!(config.wrist.mirror_left);
    }

    #[test]
    fn test_validate_rejects_oversized_consistency_window() {
        let mut config = Config::default();
        config.temporal.consistency_window = 9;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/hand-rom.toml").unwrap();
        assert_eq!(config.temporal.window_size, 5);
    }

    #[test]
    fn test_load_or_default_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[temporal]\ntop_k = 0").unwrap();
        let err = Config::load_or_default(file.path()).unwrap_err();
        assert!(matches!(
            err.root_cause().downcast_ref::<EngineError>(),
            Some(EngineError::InvalidConfig(_))
        ));
        assert!(format!("{:#}", err).contains("top_k"), "{:#}", err);
    }

    #[test]
    fn test_load_or_default_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[temporal\nwindow_size = ").unwrap();
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_reads_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[wrist]\nlock_confirm_frames = 3").unwrap();
        let config = Config::load_or_default(file.path()).unwrap();
        assert_eq!(config.wrist.lock_confirm_frames, 3);
    }
}
