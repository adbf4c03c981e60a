mod concurrent_tests;

/// Install a test-writer subscriber once; honours `RUST_LOG`.
/// 安装一次测试日志订阅器，遵循 `RUST_LOG`。
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
