use std::process::{Command, Stdio};

use anyhow::{Context, bail};
use tracing::{info, instrument};

/// Kills every process whose name is exactly `process_name`, for example `dogecoind` instances
/// left behind by an aborted test run.
///
/// This is a maintenance utility and deliberately not part of the controller: it affects processes
/// the controller does not own. Returns whether anything was killed.
#[instrument(level = "info", err)]
pub fn kill_stray_instances(process_name: &str) -> anyhow::Result<bool> {
    let status = Command::new("pkill")
        .arg("-KILL")
        .arg("-x")
        .arg(process_name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("Failed to run pkill")?;

    // pkill exits with 1 when no process matched.
    match status.code() {
        Some(0) => {
            info!("Killed stray instances");
            Ok(true)
        }
        Some(1) => Ok(false),
        _ => bail!("pkill -x {process_name} failed with {status}"),
    }
}
