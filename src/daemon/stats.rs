use crate::core::error::StatsError;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Source of the daemon's named traffic counters.
///
/// Implementations must be thread-safe (`Send + Sync`); they are shared by
/// every request that reads traffic.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Read the counter called `name`, in bytes
    async fn query(&self, name: &str) -> Result<u64, StatsError>;
}

/// Counter name for one user and direction (`uplink` / `downlink`)
pub fn stat_name(identity_token: &str, direction: &str) -> String {
    format!("user>>>{}>>>traffic>>>{}", identity_token, direction)
}

/// Parse the decimal text the stats CLI prints for a single counter
pub fn parse_counter(output: &str) -> Result<u64, StatsError> {
    let trimmed = output.trim();
    trimmed
        .parse::<u64>()
        .map_err(|_| StatsError::Malformed(trimmed.to_string()))
}

/// Queries counters through the daemon's command-line API client
pub struct CliStatsSource {
    command: String,
    server: String,
}

impl CliStatsSource {
    pub fn new(command: String, server: String) -> Self {
        Self { command, server }
    }
}

#[async_trait]
impl StatsSource for CliStatsSource {
    async fn query(&self, name: &str) -> Result<u64, StatsError> {
        debug!(stat = name, server = %self.server, "Querying daemon statistics");

        let output = Command::new(&self.command)
            .arg("api")
            .arg("stats")
            .arg(format!("--server={}", self.server))
            .arg(name)
            .output()
            .await
            .map_err(|e| StatsError::Unreachable(format!("failed to run {}: {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StatsError::Unreachable(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        parse_counter(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_name() {
        assert_eq!(
            stat_name("abc-123", "uplink"),
            "user>>>abc-123>>>traffic>>>uplink"
        );
    }

    #[test]
    fn test_parse_counter() {
        assert_eq!(parse_counter("1024\n").unwrap(), 1024);
        assert_eq!(parse_counter("  0 ").unwrap(), 0);
    }

    #[test]
    fn test_parse_counter_rejects_garbage() {
        assert!(matches!(parse_counter("not a number"), Err(StatsError::Malformed(_))));
        assert!(matches!(parse_counter("-5"), Err(StatsError::Malformed(_))));
        assert!(matches!(parse_counter(""), Err(StatsError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_cli_source_non_numeric_output() {
        // `echo` exits 0 and prints its arguments back, which is not a counter
        let source = CliStatsSource::new("echo".to_string(), "127.0.0.1:10085".to_string());
        assert!(matches!(
            source.query("user>>>x>>>traffic>>>uplink").await,
            Err(StatsError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_cli_source_missing_binary() {
        let source = CliStatsSource::new(
            "/nonexistent/xray".to_string(),
            "127.0.0.1:10085".to_string(),
        );
        assert!(matches!(
            source.query("user>>>x>>>traffic>>>uplink").await,
            Err(StatsError::Unreachable(_))
        ));
    }
}
