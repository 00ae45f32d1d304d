use std::time::Duration;

use tokio::{process::Command, time::timeout};
use tracing::{debug, warn};

const VCGENCMD_TIMEOUT: Duration = Duration::from_secs(2);

/// Battery voltage of the RTC backup cell, when the firmware tool is present.
pub async fn read_rtc_vbat() -> Option<f64> {
    let stdout = run_tool("vcgencmd", &["pmic_read_adc", "BATT_V"], VCGENCMD_TIMEOUT).await?;
    parse_vbat(&stdout)
}

/// Stdout of a successful run; `None` on failure or after `limit`, in which
/// case the child is killed.
async fn run_tool(program: &str, args: &[&str], limit: Duration) -> Option<String> {
    let run = Command::new(program).args(args).kill_on_drop(true).output();
    let output = match timeout(limit, run).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            debug!("{program} exited with {}", output.status);
            return None;
        }
        Ok(Err(err)) => {
            debug!("{program} unavailable: {err}");
            return None;
        }
        Err(_) => {
            warn!("{program} did not finish within {limit:?}");
            return None;
        }
    };
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `BATT_V volt(24)=3.12345600V` into volts rounded to millivolts.
pub fn parse_vbat(output: &str) -> Option<f64> {
    let (_, value) = output.split_once('=')?;
    let volts = value.trim().trim_end_matches('V').trim().parse::<f64>().ok()?;
    Some((volts * 1000.0).round() / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_rounds_voltage() {
        assert_eq!(parse_vbat("BATT_V volt(24)=3.12345600V\n"), Some(3.123));
    }

    #[test]
    fn rejects_unexpected_output() {
        assert_eq!(parse_vbat("error: unknown command"), None);
        assert_eq!(parse_vbat("BATT_V volt(24)=?V"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_tool_is_abandoned_after_limit() {
        let started = std::time::Instant::now();
        let stdout = run_tool("sleep", &["5"], Duration::from_millis(100)).await;
        assert_eq!(stdout, None);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_output_is_captured() {
        let stdout = run_tool("echo", &["volt(24)=3.2V"], Duration::from_secs(2)).await;
        assert_eq!(stdout.as_deref().and_then(parse_vbat), Some(3.2));
    }
}
