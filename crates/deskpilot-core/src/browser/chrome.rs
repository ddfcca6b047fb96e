//! Chromium over the DevTools protocol (chromiumoxide)
//!
//! Each session owns a small tokio runtime; the sync [`BrowserSession`]
//! methods block on it. Clicks and text reads are done in page script so
//! CSS selectors and XPath share one path.

use super::{BrowserLauncher, BrowserSession};
use crate::error::{Error, ErrorCode, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct ChromeLauncher {
    headless: bool,
}

impl ChromeLauncher {
    pub fn new(headless: bool) -> Self {
        Self { headless }
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| Error::interaction("launch browser", e))?;

        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| Error::interaction("launch browser", e))?;

        let (browser, page, handler) = runtime.block_on(async {
            let (browser, mut handler) = Browser::launch(config)
                .await
                .map_err(|e| Error::interaction("launch browser", e))?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        debug!("devtools handler stopped: {}", e);
                        break;
                    }
                }
            });
            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| Error::interaction("open page", e))?;
            Ok::<_, Error>((browser, page, handler))
        })?;

        Ok(Box::new(ChromeSession {
            runtime,
            browser: Some(browser),
            page,
            handler,
        }))
    }
}

pub struct ChromeSession {
    runtime: Runtime,
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    fn eval(&self, script: String) -> Result<Value> {
        let page = self.page.clone();
        self.runtime.block_on(async move {
            let result = page
                .evaluate(script)
                .await
                .map_err(|e| Error::interaction("evaluate script", e))?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        })
    }
}

/// JS expression yielding the first node for `selector`.
fn lookup_expr(selector: &str) -> String {
    let quoted = Value::String(selector.to_string()).to_string();
    if selector.starts_with('/') || selector.starts_with("(/") {
        format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            quoted
        )
    } else {
        format!("document.querySelector({})", quoted)
    }
}

impl BrowserSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<()> {
        let page = self.page.clone();
        let url = url.to_string();
        self.runtime.block_on(async move {
            page.goto(url.as_str()).await.map_err(|e| match e {
                chromiumoxide::error::CdpError::Timeout => Error::new(
                    ErrorCode::Timeout,
                    format!("Timeout while loading {}", url),
                ),
                other => Error::interaction(&format!("navigate to {}", url), other),
            })?;
            Ok(())
        })
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        let script = format!(
            "(() => {{ const el = {}; if (!el) return false; el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
            lookup_expr(selector)
        );
        match self.eval(script)? {
            Value::Bool(true) => Ok(()),
            _ => Err(Error::new(
                ErrorCode::InteractionFailure,
                format!("Element not found: {}", selector),
            )),
        }
    }

    fn extract_text(&mut self, selector: Option<&str>) -> Result<String> {
        let script = match selector {
            Some(sel) => format!(
                "(() => {{ const el = {}; return el ? (el.innerText ?? el.textContent) : null; }})()",
                lookup_expr(sel)
            ),
            None => "document.body ? document.body.innerText : ''".to_string(),
        };
        match self.eval(script)? {
            Value::String(text) => Ok(text),
            Value::Null => Err(Error::new(
                ErrorCode::InteractionFailure,
                format!("Element not found: {}", selector.unwrap_or("body")),
            )),
            other => Ok(other.to_string()),
        }
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        let result = self.runtime.block_on(async {
            browser
                .close()
                .await
                .map_err(|e| Error::interaction("close browser", e))?;
            if let Err(e) = browser.wait().await {
                warn!("browser process did not exit cleanly: {}", e);
            }
            Ok(())
        });
        self.handler.abort();
        result
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            if let Err(e) = self.close() {
                warn!("failed to close browser: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_and_xpath_lookups() {
        assert_eq!(lookup_expr("#go"), r##"document.querySelector("#go")"##);
        assert!(lookup_expr("//button[@id='go']").starts_with("document.evaluate("));
    }
}
