use thiserror::Error;

/// エンジンの契約違反エラー
///
/// ランドマーク欠損は正常系として扱う（未検出の結果を返す）。
/// ここに入るのは呼び出し側の前提条件違反だけ。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// フレームのタイムスタンプが巻き戻った
    #[error("frame out of order: {current_ms}ms arrived after {previous_ms}ms")]
    OutOfOrderFrame { previous_ms: u64, current_ms: u64 },
    /// 設定値が不正
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}
