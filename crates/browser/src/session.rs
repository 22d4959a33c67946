//! Browser process lifecycle.
//!
//! Each conversion run launches its own browser with a throwaway profile,
//! connects to it over CDP, and tears it down again. The session is never
//! shared or reused; `close` (or `Drop` as the backstop) guarantees the OS
//! process does not outlive the run.

use crate::cdp::CdpClient;
use iro2tm_core::{Error, Result};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Supported browser engines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
    Firefox,
}

impl BrowserEngine {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "firefox" | "ff" => Self::Firefox,
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
        }
    }
}

/// An exclusively-owned browser instance with its CDP connection.
pub struct BrowserSession {
    pub engine: BrowserEngine,
    /// Remote debugging port used to discover the page WebSocket URL.
    pub debug_port: u16,
    /// Browser child process.
    process: Child,
    /// CDP client connected to the page target.
    pub cdp: CdpClient,
    /// Throwaway profile directory, removed at close.
    profile_dir: PathBuf,
    closed: bool,
}

impl BrowserSession {
    /// Launch a browser and connect to its first page target.
    pub async fn launch(
        engine: BrowserEngine,
        headed: bool,
        binary_override: Option<&str>,
        profile_base: &Path,
    ) -> Result<Self> {
        let browser_path = match binary_override {
            Some(path) => path.to_string(),
            None => find_browser_binary(engine).ok_or_else(|| {
                Error::Browser(format!("{} not found. Please install it.", engine.name()))
            })?,
        };

        let debug_port = find_free_port().await?;

        let profile_dir = profile_base.join(format!("run-{}", debug_port));
        std::fs::create_dir_all(&profile_dir)
            .map_err(|e| Error::Browser(format!("Failed to create profile dir: {}", e)))?;

        let args = build_browser_args(engine, debug_port, &profile_dir, headed);

        info!(
            port = debug_port,
            headed = headed,
            browser = engine.name(),
            "Launching browser"
        );

        let process = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", engine.name(), e)))?;

        // Wait for the CDP endpoint, then attach to the page target
        // (not browser-level) so Page/Runtime commands work.
        wait_for_cdp_ready(debug_port, 15).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;

        let cdp = CdpClient::connect(&page_ws_url).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;

        debug!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(Self {
            engine,
            debug_port,
            process,
            cdp,
            profile_dir,
            closed: false,
        })
    }

    /// Close the session: graceful CDP shutdown, then kill, then profile
    /// cleanup. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        if let Err(e) = self.process.kill().await {
            debug!("Browser process kill failed (may have exited): {}", e);
        }
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            warn!(
                "Failed to remove profile dir {}: {}",
                self.profile_dir.display(),
                e
            );
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        // Best-effort kill on drop
        let _ = self.process.start_kill();
    }
}

/// Build engine-specific command line arguments.
fn build_browser_args(
    engine: BrowserEngine,
    debug_port: u16,
    profile_dir: &Path,
    headed: bool,
) -> Vec<String> {
    match engine {
        BrowserEngine::Firefox => {
            let mut args = vec![
                "--remote-debugging-port".to_string(),
                debug_port.to_string(),
                "--profile".to_string(),
                profile_dir.display().to_string(),
                "--no-remote".to_string(),
            ];
            if !headed {
                args.push("--headless".to_string());
            }
            args.push("about:blank".to_string());
            args
        }
        BrowserEngine::Chrome | BrowserEngine::Edge => {
            let mut args = vec![
                format!("--remote-debugging-port={}", debug_port),
                format!("--user-data-dir={}", profile_dir.display()),
                "--no-first-run".to_string(),
                "--no-default-browser-check".to_string(),
                "--disable-background-networking".to_string(),
                "--disable-extensions".to_string(),
                "--disable-sync".to_string(),
                "--metrics-recording-only".to_string(),
                "--password-store=basic".to_string(),
            ];
            if !headed {
                args.push("--headless=new".to_string());
            }
            args.push("--window-size=1280,720".to_string());
            args.push("about:blank".to_string());
            args
        }
    }
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome",
                    "google-chrome-stable",
                    "chromium",
                    "chromium-browser",
                    "/usr/bin/google-chrome",
                    "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec![
                    "microsoft-edge",
                    "microsoft-edge-stable",
                    "/usr/bin/microsoft-edge",
                ]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
        BrowserEngine::Firefox => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Firefox.app/Contents/MacOS/firefox"]
            } else if cfg!(target_os = "linux") {
                vec!["firefox", "/usr/bin/firefox"]
            } else {
                vec![
                    r"C:\Program Files\Mozilla Firefox\firefox.exe",
                    r"C:\Program Files (x86)\Mozilla Firefox\firefox.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

/// List all browser engines available on this system.
pub fn list_available_engines() -> Vec<(BrowserEngine, String)> {
    let mut result = Vec::new();
    for engine in [
        BrowserEngine::Chrome,
        BrowserEngine::Edge,
        BrowserEngine::Firefox,
    ] {
        if let Some(path) = find_browser_binary(engine) {
            result.push((engine, path));
        }
    }
    result
}

/// Find a free TCP port.
async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Browser(format!("Failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Browser(format!("Failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Wait for the browser's CDP endpoint to become available.
/// Polls /json/version until it responds, up to `timeout_secs`.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<()> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Browser(format!(
                "CDP endpoint not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if body.get("webSocketDebuggerUrl").is_some() {
                    return Ok(());
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Resolve the first page target's WebSocket URL via /json/list.
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Browser(
        "No page target found after retries".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!(BrowserEngine::from_str("firefox"), BrowserEngine::Firefox);
        assert_eq!(BrowserEngine::from_str("ff"), BrowserEngine::Firefox);
        assert_eq!(BrowserEngine::from_str("msedge"), BrowserEngine::Edge);
        assert_eq!(BrowserEngine::from_str("chrome"), BrowserEngine::Chrome);
        assert_eq!(BrowserEngine::from_str("anything"), BrowserEngine::Chrome);
    }

    #[test]
    fn test_chrome_args_headless() {
        let args = build_browser_args(
            BrowserEngine::Chrome,
            9222,
            Path::new("/tmp/profile"),
            false,
        );
        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
    }

    #[test]
    fn test_chrome_args_headed() {
        let args =
            build_browser_args(BrowserEngine::Chrome, 9222, Path::new("/tmp/profile"), true);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_firefox_args() {
        let args = build_browser_args(
            BrowserEngine::Firefox,
            9333,
            Path::new("/tmp/profile"),
            false,
        );
        assert!(args.contains(&"--remote-debugging-port".to_string()));
        assert!(args.contains(&"9333".to_string()));
        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--no-remote".to_string()));
    }

    #[tokio::test]
    async fn test_find_free_port() {
        let port = find_free_port().await.unwrap();
        assert!(port > 0);
    }
}
