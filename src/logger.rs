// Logging setup on top of tracing. INFO by default, DEBUG with --debug.
// Everything goes to stderr so stdout stays free for data.

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

// Install the global subscriber. Calling it twice is harmless; the second
// call keeps the first subscriber.
pub fn init(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("logger already initialized");
    }
}
