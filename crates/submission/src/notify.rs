/// User-visible outcome banners, injected so the engine never hard-wires a
/// presentation channel.
pub trait Notifier: Send + Sync {
    fn notify_success(&self, message: &str);
    fn notify_failure(&self, message: &str);
}

/// Default notifier: routes banners to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_success(&self, message: &str) {
        tracing::info!(%message, "EBMS notification");
    }

    fn notify_failure(&self, message: &str) {
        tracing::error!(%message, "EBMS notification");
    }
}
