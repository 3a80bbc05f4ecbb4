use env_logger::Env;

/// Initialize the process-wide logger. Call once at binary startup.
/// Filter defaults to `info` and can be overridden through `RUST_LOG`.
pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
