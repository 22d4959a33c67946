//! Page driver seam.
//!
//! The conversion sequence is written against [`PageDriver`] so tests can
//! substitute an in-memory stand-in for the live workbench page. The real
//! implementation, [`CdpPage`], scripts the page over CDP: clicks go through
//! DOM lookups by class marker, and editor content moves through the Ace
//! editor API rather than simulated keystrokes.

use crate::session::BrowserSession;
use async_trait::async_trait;
use iro2tm_core::{Error, Result};
use tracing::debug;

/// The page-level capabilities the conversion sequence needs.
#[async_trait]
pub trait PageDriver: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Click the first element carrying `class`. Returns false when no such
    /// element is present (the click is then a no-op, not an error).
    async fn click_class(&mut self, class: &str) -> Result<bool>;

    /// Number of embedded code editor widgets currently in the page.
    async fn editor_count(&mut self) -> Result<usize>;

    /// Overwrite the full content of the editor at `index`.
    async fn set_editor_text(&mut self, index: usize, text: &str) -> Result<()>;

    /// Read the full content of the editor at `index`.
    async fn editor_text(&mut self, index: usize) -> Result<String>;

    /// Release the underlying browser resources. Must be called exactly once
    /// per run; implementations should tolerate a second call.
    async fn close(&mut self) -> Result<()>;
}

/// Embed a Rust string as a JavaScript string literal. JSON encoding covers
/// quotes, backslashes, newlines, and control characters.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn click_class_js(class: &str) -> String {
    format!(
        r#"(function() {{
    var els = document.getElementsByClassName({cls});
    if (els.length === 0) return false;
    els[0].click();
    return true;
}})()"#,
        cls = js_str(class)
    )
}

const EDITOR_COUNT_JS: &str = "document.getElementsByClassName('ace_editor').length";

fn set_editor_text_js(index: usize, text: &str) -> String {
    format!(
        r#"(function() {{
    var editors = document.getElementsByClassName('ace_editor');
    if (editors.length <= {index}) return false;
    ace.edit(editors[{index}]).session.setValue({text});
    return true;
}})()"#,
        index = index,
        text = js_str(text)
    )
}

fn editor_text_js(index: usize) -> String {
    format!(
        r#"(function() {{
    var editors = document.getElementsByClassName('ace_editor');
    if (editors.length <= {index}) return null;
    return ace.edit(editors[{index}]).session.getValue();
}})()"#,
        index = index
    )
}

/// [`PageDriver`] backed by a live browser session.
pub struct CdpPage {
    session: BrowserSession,
}

impl CdpPage {
    pub fn new(session: BrowserSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl PageDriver for CdpPage {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.session.cdp.navigate(url).await
    }

    async fn click_class(&mut self, class: &str) -> Result<bool> {
        let result = self.session.cdp.evaluate_js(&click_class_js(class)).await?;
        let clicked = result.as_bool().unwrap_or(false);
        debug!(class = class, clicked = clicked, "click_class");
        Ok(clicked)
    }

    async fn editor_count(&mut self) -> Result<usize> {
        let result = self.session.cdp.evaluate_js(EDITOR_COUNT_JS).await?;
        Ok(result.as_u64().unwrap_or(0) as usize)
    }

    async fn set_editor_text(&mut self, index: usize, text: &str) -> Result<()> {
        let result = self
            .session
            .cdp
            .evaluate_js(&set_editor_text_js(index, text))
            .await?;
        if result.as_bool() != Some(true) {
            return Err(Error::ElementMissing(format!(
                "Editor widget {} not present in page",
                index
            )));
        }
        Ok(())
    }

    async fn editor_text(&mut self, index: usize) -> Result<String> {
        let result = self.session.cdp.evaluate_js(&editor_text_js(index)).await?;
        result.as_str().map(|s| s.to_string()).ok_or_else(|| {
            Error::ElementMissing(format!("Editor widget {} not present in page", index))
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await;
        Ok(())
    }
}
