use crate::services::MonitorLogBuffer;
use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Launch `command` through the platform shell on a detached task.
///
/// The caller does not wait for the process. Its exit status is logged, and a
/// spawn failure or non-zero exit is reported on `notifier`.
///
/// # Errors
/// Fails only when called outside a tokio runtime.
pub fn spawn_detached(command: &str, notifier: MonitorLogBuffer) -> Result<JoinHandle<()>> {
    let handle = Handle::try_current().context("No async runtime to launch external process")?;
    let command = command.to_string();

    Ok(handle.spawn(async move {
        tracing::info!("Executing: {}", command);

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command.as_str()]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command.as_str()]);
            c
        };

        match cmd.status().await {
            Ok(status) if status.success() => {
                tracing::info!("Command finished: {}", command);
            }
            Ok(status) => {
                notifier.error(format!(
                    "Command `{}` exited with code {}",
                    command,
                    status.code().unwrap_or(-1)
                ));
            }
            Err(e) => {
                notifier.error(format!("Failed to launch `{}`: {}", command, e));
            }
        }
    }))
}
