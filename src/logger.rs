// Logging setup for the command line driver
// Compact single-line records: wall clock, padded level, module target
use chrono::Local;
use env_logger::{Builder, Env};
use std::io::Write;

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install the env_logger backend. `RUST_LOG` wins over `verbose`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger(verbose: bool) {
    let _ = Builder::from_env(Env::default().default_filter_or(default_filter(verbose)))
        .format(|buf, record| {
            let style = buf.default_level_style(record.level());
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} {}: {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
}
