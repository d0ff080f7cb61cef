//! tracing の初期化

use tracing_subscriber::EnvFilter;

/// RUST_LOG に従って stderr へ出力する。未設定なら "info"
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // 二重初期化 (テストなど) は無視
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
