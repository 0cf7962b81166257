//! chromedriver process management: spawning and health checking

use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Budget;
use crate::error::{E2eError, E2eResult};
use crate::wait::{self, Probe};

const STATUS_POLL: Duration = Duration::from_millis(100);

/// Handle to a chromedriver this run started
#[derive(Debug)]
pub struct ChromeDriverProcess {
    child: Child,
    url: String,
    stopped: bool,
}

impl ChromeDriverProcess {
    pub async fn spawn(binary: &Path, startup_timeout: Duration) -> E2eResult<Self> {
        let port = find_free_port()?;
        let url = format!("http://127.0.0.1:{}", port);

        info!("Spawning {} on port {}", binary.display(), port);

        let child = Command::new(binary)
            .arg(format!("--port={port}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                E2eError::WebDriverStartup(format!("Failed to spawn {}: {}", binary.display(), e))
            })?;

        let process = ChromeDriverProcess {
            child,
            url,
            stopped: false,
        };
        wait_for_ready(&process.url, startup_timeout).await?;

        info!("chromedriver ready at {}", process.url);
        Ok(process)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn stop(&mut self) -> E2eResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;
        info!("Stopping chromedriver (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(300));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for ChromeDriverProcess {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Polls `/status` until chromedriver reports ready.
async fn wait_for_ready(url: &str, timeout: Duration) -> E2eResult<()> {
    let status_url = format!("{}/status", url);
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    let client = &client;
    let status_url = status_url.as_str();

    let ready = wait::until(Budget::new(timeout, STATUS_POLL), "chromedriver /status", move || async move {
        let resp = match client.get(status_url).send().await {
            Ok(resp) => resp,
            // Connection refused until it binds
            Err(e) if e.is_connect() => return Ok(Probe::Pending("not listening".to_string())),
            Err(e) => {
                debug!("chromedriver status error: {}", e);
                return Ok(Probe::Pending(e.to_string()));
            }
        };
        if !resp.status().is_success() {
            return Ok(Probe::Pending(format!("status {}", resp.status())));
        }
        let ready = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.pointer("/value/ready").and_then(|r| r.as_bool()))
            .unwrap_or(true);
        Ok(if ready {
            Probe::Ready(())
        } else {
            Probe::Pending("ready: false".to_string())
        })
    })
    .await;

    match ready {
        Err(E2eError::Timeout { last, .. }) => Err(E2eError::WebDriverStartup(format!(
            "not ready after {:?} (last: {})",
            timeout, last
        ))),
        other => other,
    }
}

fn find_free_port() -> E2eResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
