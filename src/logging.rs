use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the logger with elapsed-time formatting.
///
/// Verbose selects Info level, otherwise Warn. Output goes to stderr as
/// `[HH:MM:SS] LEVEL message` where the timestamp is time since startup.
pub fn init_logger(verbose: bool) {
    START_TIME.set(Instant::now()).ok();

    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format(|buf, record| {
            let secs = START_TIME.get().unwrap().elapsed().as_secs();
            writeln!(
                buf,
                "[{:02}:{:02}:{:02}] {:<5} {}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60,
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
