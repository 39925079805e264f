//! Opening the product page on the operator's desktop.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[async_trait]
pub trait BrowserOpener: Send + Sync {
    /// Launch the default browser on `url`. Returns once the launcher has started.
    async fn open(&self, url: &str) -> io::Result<()>;
}

/// Hands the URL to the platform's URL launcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl SystemBrowser {
    fn command(url: &str) -> Command {
        #[cfg(target_os = "macos")]
        let mut cmd = {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        };

        #[cfg(windows)]
        let mut cmd = {
            use std::os::windows::process::CommandExt;

            let mut cmd = Command::new("cmd");
            // `start` treats its first quoted argument as a window title.
            cmd.args(["/C", "start", ""]).arg(url);
            cmd.as_std_mut().creation_flags(CREATE_NO_WINDOW);
            cmd
        };

        #[cfg(not(any(target_os = "macos", windows)))]
        let mut cmd = {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        };

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

#[async_trait]
impl BrowserOpener for SystemBrowser {
    async fn open(&self, url: &str) -> io::Result<()> {
        let child = Self::command(url).spawn()?;
        debug!(pid = ?child.id(), url, "Launched browser");
        Ok(())
    }
}
