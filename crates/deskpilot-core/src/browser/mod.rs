//! Controlled browser sessions
//!
//! At most one session is open at a time. [`BrowserManager`] launches it on
//! first use, hands it out under a lock, and closes it on [`BrowserManager::close`]
//! or drop. A close that finds the session busy is deferred to whoever holds
//! it, so a caller abandoned by a deadline still releases the browser.

#[cfg(feature = "chrome")]
pub mod chrome;

use crate::error::{Error, ErrorCode, Result};
use parking_lot::Mutex;
use reqwest::Url;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// A live browser page.
pub trait BrowserSession: Send {
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Click the first element matching a CSS selector, or an XPath when the
    /// selector starts with `/`.
    fn click(&mut self, selector: &str) -> Result<()>;

    /// Visible text of the matching element, or of the whole page.
    fn extract_text(&mut self, selector: Option<&str>) -> Result<String>;

    fn close(&mut self) -> Result<()>;
}

pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Launcher used when no browser backend is compiled in.
#[derive(Debug, Default)]
pub struct UnavailableLauncher;

impl BrowserLauncher for UnavailableLauncher {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        Err(Error::unsupported("Browser control", "chrome"))
    }
}

/// The launcher for this build: Chromium with the `chrome` feature.
pub fn default_launcher(headless: bool) -> Box<dyn BrowserLauncher> {
    #[cfg(feature = "chrome")]
    {
        Box::new(chrome::ChromeLauncher::new(headless))
    }
    #[cfg(not(feature = "chrome"))]
    {
        let _ = headless;
        Box::new(UnavailableLauncher)
    }
}

pub struct BrowserManager {
    launcher: Box<dyn BrowserLauncher>,
    slot: Mutex<Option<Box<dyn BrowserSession>>>,
    lock_timeout: Duration,
    close_pending: AtomicBool,
}

impl BrowserManager {
    pub fn new(launcher: Box<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            slot: Mutex::new(None),
            lock_timeout: Duration::from_secs(60),
            close_pending: AtomicBool::new(false),
        }
    }

    /// How long to wait for a session another caller is using.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Run `f` against the session, launching one if none is open.
    pub fn with_session<T>(
        &self,
        f: impl FnOnce(&mut dyn BrowserSession) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self
            .slot
            .try_lock_for(self.lock_timeout)
            .ok_or_else(|| Error::timeout("browser session", self.lock_timeout))?;
        let result = self.run(&mut slot, f);
        if self.close_pending.swap(false, Ordering::SeqCst) {
            info!("closing browser after deferred close");
            close_slot(&mut slot);
        }
        result
    }

    fn run<T>(
        &self,
        slot: &mut Option<Box<dyn BrowserSession>>,
        f: impl FnOnce(&mut dyn BrowserSession) -> Result<T>,
    ) -> Result<T> {
        if slot.is_none() {
            info!("launching browser");
            *slot = Some(self.launcher.launch()?);
        }
        match slot.as_mut() {
            Some(session) => f(session.as_mut()),
            None => Err(Error::new(ErrorCode::Unknown, "browser session unavailable")),
        }
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Close the open session, if any. When another caller still holds the
    /// session after the lock timeout, the close is handed to that caller and
    /// happens as soon as it lets go.
    pub fn close(&self) -> Result<()> {
        self.close_pending.store(true, Ordering::SeqCst);
        let session = match self.slot.try_lock_for(self.lock_timeout) {
            Some(mut slot) => {
                self.close_pending.store(false, Ordering::SeqCst);
                slot.take()
            }
            None => {
                warn!(
                    "browser still busy after {:?}, closing it when released",
                    self.lock_timeout
                );
                return Ok(());
            }
        };
        match session {
            Some(mut session) => {
                info!("closing browser");
                session.close()
            }
            None => Ok(()),
        }
    }
}

fn close_slot(slot: &mut Option<Box<dyn BrowserSession>>) {
    if let Some(mut session) = slot.take() {
        if let Err(e) = session.close() {
            warn!("failed to close browser: {}", e);
        }
    }
}

/// Add `https://` to bare host names.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.contains("://") || url.starts_with("about:") || url.starts_with("data:") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

pub fn search_url(query: &str) -> Result<String> {
    Url::parse_with_params("https://www.google.com/search", &[("q", query.trim())])
        .map(String::from)
        .map_err(|e| Error::invalid_action("search_google", e))
}

impl Drop for BrowserManager {
    fn drop(&mut self) {
        close_slot(self.slot.get_mut());
    }
}
