use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};
use log::SetLoggerError;

/// Installs the global logger.
///
/// `RUST_LOG` wins over `default_level` when it is set. Every line carries a
/// local RFC 3339 timestamp.
pub fn init(default_level: &str) -> Result<(), SetLoggerError> {
    let env = Env::default().default_filter_or(default_level);
    Builder::from_env(env)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}: {}",
                Local::now().to_rfc3339(),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()?;

    log::info!("Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let _ = init("debug");
        assert!(init("debug").is_err());
    }
}
