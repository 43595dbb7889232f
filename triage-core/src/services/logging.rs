//! Logging service

use crate::models::LogLevel;

/// Initialize logging with the specified level
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match level {
        LogLevel::Error => "triage=error,triage_core=error",
        LogLevel::Warn => "triage=warn,triage_core=warn",
        LogLevel::Info => "triage=info,triage_core=info",
        LogLevel::Debug => "triage=debug,triage_core=debug",
        LogLevel::Trace => "triage=trace,triage_core=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_initialization_does_not_panic() {
        // A second init in the same process returns an error; both are fine
        let _ = init_logging(LogLevel::Info);
        let _ = init_logging(LogLevel::Debug);
    }
}
