use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the tracing stack: stderr output plus a daily rolling log file,
/// with the `log` crate bridged in. Call once at startup.
pub fn init_logs() {
    tracing_log::LogTracer::init().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("fracture_annotator=debug,info"));

    let file_appender = tracing_appender::rolling::daily("logs", "annotator.log");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_appender),
        )
        .init();
}
