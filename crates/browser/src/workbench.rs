//! Scripted interaction with the hosted Iro workbench.
//!
//! The workbench exposes no API; this module reproduces the UI sequence a
//! human performs: dismiss the consent overlay, paste the grammar into the
//! source editor, press run, read the generated grammar from the output
//! editor. The sequence runs forward exactly once per browser session, with
//! no retries, and the session is released on every exit path.

use crate::page::PageDriver;
use iro2tm_core::{Config, Error, Result, WaitMode};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Class marker of the consent overlay's accept button.
pub const CONSENT_BUTTON_CLASS: &str = "rionx_button";
/// Class marker of the compile/run control.
pub const RUN_BUTTON_CLASS: &str = "fa-play";
/// Position of the grammar source editor in the page's editor list.
pub const SOURCE_EDITOR: usize = 0;
/// Position of the generated-grammar editor in the page's editor list.
pub const TARGET_EDITOR: usize = 2;

/// The workbench is considered ready once the output editor exists.
const MIN_EDITORS: usize = TARGET_EDITOR + 1;

/// Run one conversion: feed `input` through the workbench at `url` and
/// return the generated grammar.
///
/// Takes ownership of the driver and closes it exactly once, whether the
/// sequence succeeds or fails at any step. A close failure is logged but
/// never masks the sequence's own outcome.
pub async fn convert<D: PageDriver>(
    mut driver: D,
    url: &str,
    input: &str,
    config: &Config,
) -> Result<String> {
    let result = run_sequence(&mut driver, url, input, config).await;
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    result
}

async fn run_sequence<D: PageDriver>(
    driver: &mut D,
    url: &str,
    input: &str,
    config: &Config,
) -> Result<String> {
    let timing = &config.timing;
    let poll_interval = Duration::from_millis(timing.poll_interval_ms);

    info!(url = url, "Opening workbench");
    driver.goto(url).await?;

    // Wait until the page has built its editor widgets rather than trusting
    // a fixed page-load delay.
    let deadline = Instant::now() + Duration::from_millis(timing.resolve_timeout_ms);
    loop {
        let count = driver.editor_count().await?;
        if count >= MIN_EDITORS {
            debug!(editors = count, "Workbench editors present");
            break;
        }
        if Instant::now() > deadline {
            return Err(Error::Timeout(format!(
                "Workbench not ready: {} editor widgets after {}ms (need {})",
                count, timing.resolve_timeout_ms, MIN_EDITORS
            )));
        }
        tokio::time::sleep(poll_interval).await;
    }
    tokio::time::sleep(Duration::from_millis(timing.page_settle_ms)).await;

    // The overlay only exists on first visit; a profile that has already
    // accepted it has nothing to dismiss.
    if driver.click_class(CONSENT_BUTTON_CLASS).await? {
        debug!("Dismissed consent overlay");
    } else {
        debug!("Consent overlay not present, continuing");
    }
    tokio::time::sleep(Duration::from_millis(timing.action_settle_ms)).await;

    info!(bytes = input.len(), "Injecting grammar into source editor");
    driver.set_editor_text(SOURCE_EDITOR, input).await?;
    tokio::time::sleep(Duration::from_millis(timing.action_settle_ms)).await;

    // Baseline taken before the run so Poll mode can detect the change.
    let baseline = driver.editor_text(TARGET_EDITOR).await?;

    if !driver.click_class(RUN_BUTTON_CLASS).await? {
        return Err(Error::ElementMissing(format!(
            "Run control ('{}') not found in workbench",
            RUN_BUTTON_CLASS
        )));
    }
    info!("Triggered workbench compile");

    match config.wait_mode {
        WaitMode::Fixed => {
            // Blind wait: whatever the output editor holds afterwards is the
            // result, stale or not.
            tokio::time::sleep(Duration::from_millis(timing.compile_wait_ms)).await;
        }
        WaitMode::Poll => {
            let deadline =
                Instant::now() + Duration::from_millis(timing.output_poll_timeout_ms);
            loop {
                tokio::time::sleep(poll_interval).await;
                let current = driver.editor_text(TARGET_EDITOR).await?;
                if current != baseline {
                    break;
                }
                if Instant::now() > deadline {
                    return Err(Error::Timeout(format!(
                        "Output editor unchanged after {}ms",
                        timing.output_poll_timeout_ms
                    )));
                }
            }
        }
    }

    let output = driver.editor_text(TARGET_EDITOR).await?;
    info!(bytes = output.len(), "Read generated grammar");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// When the stand-in workbench applies the editor-0 -> editor-2 echo
    /// after the run control is clicked.
    #[derive(Clone, Copy)]
    enum Echo {
        /// Applied as soon as run is clicked.
        Immediate,
        /// Applied on the nth read of the output editor after run.
        AfterReads(usize),
        /// Never applied.
        Never,
    }

    #[derive(Clone, Copy, PartialEq)]
    enum FailPoint {
        Goto,
        SetEditor,
        ReadEditor,
    }

    struct FakeInner {
        consent_present: bool,
        run_present: bool,
        editors: Vec<String>,
        echo: Echo,
        fail_at: Option<FailPoint>,
        consent_clicks: usize,
        run_clicks: usize,
        close_calls: usize,
        reads_until_echo: Option<usize>,
    }

    /// In-memory stand-in for the workbench page.
    #[derive(Clone)]
    struct FakePage {
        inner: Arc<Mutex<FakeInner>>,
    }

    impl FakePage {
        fn new(echo: Echo) -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeInner {
                    consent_present: true,
                    run_present: true,
                    editors: vec![String::new(), String::new(), String::new()],
                    echo,
                    fail_at: None,
                    consent_clicks: 0,
                    run_clicks: 0,
                    close_calls: 0,
                    reads_until_echo: None,
                })),
            }
        }

        fn with<F: FnOnce(&mut FakeInner)>(self, f: F) -> Self {
            f(&mut self.inner.lock().unwrap());
            self
        }

        fn handle(&self) -> Arc<Mutex<FakeInner>> {
            self.inner.clone()
        }
    }

    #[async_trait]
    impl PageDriver for FakePage {
        async fn goto(&mut self, _url: &str) -> iro2tm_core::Result<()> {
            if self.inner.lock().unwrap().fail_at == Some(FailPoint::Goto) {
                return Err(Error::Navigation("fake navigation failure".into()));
            }
            Ok(())
        }

        async fn click_class(&mut self, class: &str) -> iro2tm_core::Result<bool> {
            let mut inner = self.inner.lock().unwrap();
            match class {
                CONSENT_BUTTON_CLASS => {
                    if inner.consent_present {
                        inner.consent_clicks += 1;
                        inner.consent_present = false;
                        Ok(true)
                    } else {
                        Ok(false)
                    }
                }
                RUN_BUTTON_CLASS => {
                    if !inner.run_present {
                        return Ok(false);
                    }
                    inner.run_clicks += 1;
                    match inner.echo {
                        Echo::Immediate => {
                            let src = inner.editors[SOURCE_EDITOR].clone();
                            inner.editors[TARGET_EDITOR] = src;
                        }
                        Echo::AfterReads(n) => inner.reads_until_echo = Some(n),
                        Echo::Never => {}
                    }
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn editor_count(&mut self) -> iro2tm_core::Result<usize> {
            Ok(self.inner.lock().unwrap().editors.len())
        }

        async fn set_editor_text(&mut self, index: usize, text: &str) -> iro2tm_core::Result<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_at == Some(FailPoint::SetEditor) {
                return Err(Error::Cdp("fake injection failure".into()));
            }
            inner.editors[index] = text.to_string();
            Ok(())
        }

        async fn editor_text(&mut self, index: usize) -> iro2tm_core::Result<String> {
            let mut inner = self.inner.lock().unwrap();
            if inner.fail_at == Some(FailPoint::ReadEditor) {
                return Err(Error::Cdp("fake read failure".into()));
            }
            if let Some(n) = inner.reads_until_echo {
                if n <= 1 {
                    inner.reads_until_echo = None;
                    let src = inner.editors[SOURCE_EDITOR].clone();
                    inner.editors[TARGET_EDITOR] = src;
                } else {
                    inner.reads_until_echo = Some(n - 1);
                }
            }
            Ok(inner.editors[index].clone())
        }

        async fn close(&mut self) -> iro2tm_core::Result<()> {
            self.inner.lock().unwrap().close_calls += 1;
            Ok(())
        }
    }

    /// Config with millisecond-scale timings so tests run fast.
    fn test_config() -> Config {
        let mut config = Config::default();
        config.timing.page_settle_ms = 1;
        config.timing.action_settle_ms = 1;
        config.timing.compile_wait_ms = 1;
        config.timing.resolve_timeout_ms = 50;
        config.timing.poll_interval_ms = 1;
        config.timing.output_poll_timeout_ms = 50;
        config
    }

    const SAMPLE_GRAMMAR: &str = "name: test\n\\b\\w+\\b => keyword";

    #[tokio::test]
    async fn test_round_trip_identity() {
        let page = FakePage::new(Echo::Immediate);
        let output = convert(page, "http://fake", SAMPLE_GRAMMAR, &test_config())
            .await
            .unwrap();
        assert_eq!(output, SAMPLE_GRAMMAR);
    }

    #[tokio::test]
    async fn test_consent_overlay_clicked_once() {
        let page = FakePage::new(Echo::Immediate);
        let state = page.handle();
        convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap();
        assert_eq!(state.lock().unwrap().consent_clicks, 1);
        assert_eq!(state.lock().unwrap().run_clicks, 1);
    }

    #[tokio::test]
    async fn test_absent_consent_overlay_is_not_an_error() {
        let page = FakePage::new(Echo::Immediate).with(|s| s.consent_present = false);
        let output = convert(page, "http://fake", SAMPLE_GRAMMAR, &test_config())
            .await
            .unwrap();
        assert_eq!(output, SAMPLE_GRAMMAR);
    }

    #[tokio::test]
    async fn test_missing_run_control_fails_fast() {
        let page = FakePage::new(Echo::Immediate).with(|s| s.run_present = false);
        let err = convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementMissing(_)));
    }

    #[tokio::test]
    async fn test_too_few_editors_times_out() {
        let page = FakePage::new(Echo::Immediate)
            .with(|s| s.editors = vec![String::new(), String::new()]);
        let err = convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_fixed_wait_returns_stale_content_when_compile_is_slow() {
        // The echo lands on the second post-run read, but Fixed mode reads
        // only once after its sleep: the pre-run content comes back.
        let page = FakePage::new(Echo::AfterReads(2))
            .with(|s| s.editors[TARGET_EDITOR] = "// previous output".to_string());
        let output = convert(page, "http://fake", SAMPLE_GRAMMAR, &test_config())
            .await
            .unwrap();
        assert_eq!(output, "// previous output");
    }

    #[tokio::test]
    async fn test_poll_wait_survives_a_slow_compile() {
        let mut config = test_config();
        config.wait_mode = WaitMode::Poll;
        let page = FakePage::new(Echo::AfterReads(3))
            .with(|s| s.editors[TARGET_EDITOR] = "// previous output".to_string());
        let output = convert(page, "http://fake", SAMPLE_GRAMMAR, &config)
            .await
            .unwrap();
        assert_eq!(output, SAMPLE_GRAMMAR);
    }

    #[tokio::test]
    async fn test_poll_wait_times_out_when_output_never_changes() {
        let mut config = test_config();
        config.wait_mode = WaitMode::Poll;
        let page = FakePage::new(Echo::Never);
        let err = convert(page, "http://fake", "x", &config).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_session_released_once_on_success() {
        let page = FakePage::new(Echo::Immediate);
        let state = page.handle();
        convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap();
        assert_eq!(state.lock().unwrap().close_calls, 1);
    }

    #[tokio::test]
    async fn test_session_released_once_on_navigation_failure() {
        let page = FakePage::new(Echo::Immediate).with(|s| s.fail_at = Some(FailPoint::Goto));
        let state = page.handle();
        let err = convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Navigation(_)));
        assert_eq!(state.lock().unwrap().close_calls, 1);
    }

    #[tokio::test]
    async fn test_session_released_once_on_injection_failure() {
        let page = FakePage::new(Echo::Immediate).with(|s| s.fail_at = Some(FailPoint::SetEditor));
        let state = page.handle();
        let err = convert(page, "http://fake", "x", &test_config())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cdp(_)));
        assert_eq!(state.lock().unwrap().close_calls, 1);
    }

    #[tokio::test]
    async fn test_session_released_once_on_read_failure() {
        let page = FakePage::new(Echo::Immediate).with(|s| s.fail_at = Some(FailPoint::ReadEditor));
        let state = page.handle();
        assert!(convert(page, "http://fake", "x", &test_config())
            .await
            .is_err());
        assert_eq!(state.lock().unwrap().close_calls, 1);
    }
}
