/// Logging initialization.
///
/// - stderr via `tracing-subscriber::fmt`, filtered by `RUST_LOG`
/// - optional append-only `<data_dir>/chatsync.log` so host apps without a
///   visible stderr still leave a trail
///
/// Called once at the start of `FfiChat::new()`. A host that already installed
/// a global subscriber keeps it; the second init is a silent no-op.
pub fn init_logging(data_dir: &str, to_file: bool) {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chatsync_core=debug,info".into());

    let file_layer = if to_file {
        let log_path = std::path::Path::new(data_dir).join("chatsync.log");
        let _ = std::fs::create_dir_all(data_dir);
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .ok()
            .map(|file| {
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
            })
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
}
