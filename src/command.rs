// Subprocess runner with a mandatory timeout

use std::time::Duration;
use tokio::process::Command;

/// Captured output of a finished subprocess.
#[derive(Debug)]
pub struct CmdOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Run a command, capturing stdout/stderr, under an explicit deadline.
/// On timeout the child is killed (kill_on_drop) and an error is returned;
/// callers degrade to their failure default rather than propagating.
pub async fn run(program: &str, args: &[&str], timeout: Duration) -> anyhow::Result<CmdOutput> {
    let child = Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| anyhow::anyhow!("`{}` timed out after {:?}", program, timeout))??;

    Ok(CmdOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
