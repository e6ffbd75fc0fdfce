use env_logger::{Builder, Env};
use log::debug;
use std::io::Write;

/// Installs the process-wide logger. `RUST_LOG` overrides the default `info` level.
/// A second call keeps the logger already installed.
pub fn init_logger() {
    let installed = Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init();
    if let Err(e) = installed {
        debug!("Logger already installed: {}", e);
    }
}
