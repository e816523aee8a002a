//! Browser session plumbing.
//!
//! The rest of the evaluator talks to the page through the narrow
//! [`ChatSurface`] trait; the navigation detector, stabilizer and runner
//! are all written against it so tests can drive them with in-memory
//! stubs. [`BrowserSession`] is the chromiumoxide-backed implementation
//! that owns the real browser process.

use crate::config::EvalConfig;
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Minimal page surface the evaluator needs: bounded visibility waits,
/// the current URL, form interaction, and text extraction.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Wait up to `timeout` for an element matching `locator` to become
    /// visible. Returns false on timeout rather than erroring; the callers
    /// decide whether absence is fatal.
    async fn wait_visible(&self, locator: &str, timeout: Duration) -> SessionResult<bool>;

    async fn current_url(&self) -> SessionResult<String>;

    async fn fill(&self, locator: &str, text: &str) -> SessionResult<()>;

    async fn click(&self, locator: &str) -> SessionResult<()>;

    /// Rendered text of the last element (in document order) matching
    /// `locator`. Empty string if none match yet.
    async fn read_text(&self, locator: &str) -> SessionResult<String>;

    async fn screenshot(&self, path: &Path) -> SessionResult<()>;
}

fn browser_err(e: impl std::fmt::Display) -> SessionError {
    SessionError::Browser {
        message: e.to_string(),
    }
}

/// Chromiumoxide-backed session: one headless browser, one active page.
pub struct BrowserSession {
    browser: Mutex<Browser>,
    page: Mutex<Page>,
    handler_task: JoinHandle<()>,
}

impl BrowserSession {
    /// Launch a headless browser and open the configured base URL.
    pub async fn launch(base_url: &str) -> SessionResult<Self> {
        let config = BrowserConfig::builder().build().map_err(browser_err)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;

        // The handler stream must be polled for the websocket to stay alive.
        let handler_task = tokio::task::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page(base_url).await.map_err(browser_err)?;
        info!(base_url, "browser session started");

        Ok(Self {
            browser: Mutex::new(browser),
            page: Mutex::new(page),
            handler_task,
        })
    }

    /// Click through from the home page to the chat entry point. The chat
    /// UI may open in a new tab; if one appeared, it becomes the active
    /// page.
    pub async fn open_chat_from_home(&self, config: &EvalConfig) -> SessionResult<()> {
        let start_chat = &config.selectors.home_page.start_chat.locator;

        if !self
            .wait_visible(start_chat, config.timeouts.page())
            .await?
        {
            return Err(SessionError::ElementNotFound {
                locator: start_chat.clone(),
            });
        }
        self.click(start_chat).await?;

        // Give a possible new tab time to attach before adopting it.
        tokio::time::sleep(Duration::from_millis(500)).await;

        let browser = self.browser.lock().await;
        let pages = browser.pages().await.map_err(browser_err)?;
        if pages.len() > 1 {
            if let Some(newest) = pages.into_iter().last() {
                debug!("chat opened in a new tab, switching to it");
                *self.page.lock().await = newest;
            }
        }

        Ok(())
    }

    /// Tear the browser down. Best effort; a dead browser is already shut
    /// down as far as the run is concerned.
    pub async fn close(self) -> SessionResult<()> {
        let mut browser = self.browser.into_inner();
        if let Err(e) = browser.close().await {
            warn!("browser close failed: {}", e);
        }
        self.handler_task.abort();
        Ok(())
    }
}

#[async_trait]
impl ChatSurface for BrowserSession {
    async fn wait_visible(&self, locator: &str, timeout: Duration) -> SessionResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let found = {
                let page = self.page.lock().await;
                page.find_element(locator).await.is_ok()
            };
            if found {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn current_url(&self) -> SessionResult<String> {
        let page = self.page.lock().await;
        let url = page.url().await.map_err(browser_err)?;
        Ok(url.unwrap_or_default())
    }

    async fn fill(&self, locator: &str, text: &str) -> SessionResult<()> {
        let page = self.page.lock().await;
        let element = page
            .find_element(locator)
            .await
            .map_err(|_| SessionError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        element.click().await.map_err(browser_err)?;
        element.type_str(text).await.map_err(browser_err)?;
        Ok(())
    }

    async fn click(&self, locator: &str) -> SessionResult<()> {
        let page = self.page.lock().await;
        let element = page
            .find_element(locator)
            .await
            .map_err(|_| SessionError::ElementNotFound {
                locator: locator.to_string(),
            })?;
        element.click().await.map_err(browser_err)?;
        Ok(())
    }

    async fn read_text(&self, locator: &str) -> SessionResult<String> {
        let page = self.page.lock().await;
        let elements = page.find_elements(locator).await.unwrap_or_default();
        let Some(last) = elements.last() else {
            return Ok(String::new());
        };

        let text = last.inner_text().await.map_err(browser_err)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn screenshot(&self, path: &Path) -> SessionResult<()> {
        let page = self.page.lock().await;
        page.save_screenshot(
            ScreenshotParams::builder().full_page(true).build(),
            path,
        )
        .await
        .map_err(browser_err)?;
        info!(path = %path.display(), "saved screenshot");
        Ok(())
    }
}

/// Credentials for the login form, read from the environment. Credential
/// storage itself is outside this system.
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn from_env() -> SessionResult<Self> {
        let username =
            std::env::var("LOGIN_USER").map_err(|_| SessionError::MissingCredential {
                var: "LOGIN_USER".to_string(),
            })?;
        let password =
            std::env::var("LOGIN_PASS").map_err(|_| SessionError::MissingCredential {
                var: "LOGIN_PASS".to_string(),
            })?;
        Ok(Self { username, password })
    }
}


/// Fill and submit the login form, then require the chat input to appear.
/// Failure here is fatal to the run.
pub async fn login(
    surface: &dyn ChatSurface,
    config: &EvalConfig,
    credentials: &Credentials,
) -> SessionResult<()> {
    let login_selectors = &config.selectors.login;

    surface
        .fill(&login_selectors.username_field.locator, &credentials.username)
        .await?;
    surface
        .fill(&login_selectors.password_field.locator, &credentials.password)
        .await?;
    surface.click(&login_selectors.submit_button.locator).await?;

    tokio::time::sleep(Duration::from_millis(config.delays.after_login_ms)).await;

    let chat_input = &config.selectors.chat_page.prompt_input.locator;
    if !surface
        .wait_visible(chat_input, config.timeouts.page())
        .await?
    {
        return Err(SessionError::AuthenticationFailed {
            message: "chat input did not appear after login".to_string(),
        });
    }

    info!("login completed, chat UI visible");
    Ok(())
}
