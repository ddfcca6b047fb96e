//! Platform backends for [`DesktopInput`](crate::input::DesktopInput)
//!
//! With the `native` feature the desktop is driven through rdev (injection)
//! and xcap (capture). Without it every operation reports `Unsupported`.

#[cfg(feature = "native")]
pub mod native;

#[cfg(not(feature = "native"))]
pub mod unsupported;

// Re-export the current backend
#[cfg(feature = "native")]
pub use native as current;

#[cfg(not(feature = "native"))]
pub use unsupported as current;

use crate::error::{Error, Result};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, warn};

/// Platform command that launches an application by name.
pub(crate) fn launch_command(name: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", "start", "", name]);
        cmd
    } else if cfg!(target_os = "macos") {
        let mut cmd = Command::new("open");
        cmd.args(["-a", name]);
        cmd
    } else {
        Command::new(name)
    }
}

/// Start an application without waiting for it. A detached thread waits on
/// the child so it is reaped when it exits.
pub(crate) fn launch_application(name: &str) -> Result<()> {
    let mut child = launch_command(name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::interaction(&format!("open {}", name), e))?;

    let app = name.to_string();
    let reaper = thread::Builder::new()
        .name("app-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => debug!(app = %app, %status, "application process exited"),
            Err(e) => warn!(app = %app, "failed to wait on application process: {}", e),
        });
    if let Err(e) = reaper {
        warn!("could not watch {}: {}", name, e);
    }
    Ok(())
}
