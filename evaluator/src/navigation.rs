//! Page state detection.
//!
//! A freshly navigated page is resolved to either the login form or the
//! chat UI through a strict priority cascade: DOM marker probes first
//! (most reliable), URL heuristics second, and a fatal ambiguity error if
//! nothing matches. The probes are evaluated in order with independent
//! timeouts; they are never raced against each other, which avoids false
//! positives while both markers flicker during a page transition.

use crate::config::Selectors;
use crate::error::{SessionError, SessionResult};
use crate::session::ChatSurface;
use std::time::Duration;
use tracing::{debug, info};

/// Resolved page state. Detection starts unresolved and must end in one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    Login,
    Chat,
}

impl std::fmt::Display for PageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageState::Login => write!(f, "login"),
            PageState::Chat => write!(f, "chat"),
        }
    }
}

/// URL substrings checked by the fallback probe, in order.
const LOGIN_URL_MARKERS: &[&str] = &["login"];
const CHAT_URL_MARKERS: &[&str] = &["chat", "conversation"];

/// Resolve the state of the current page.
///
/// Cascade order:
/// 1. login marker element visible within `probe_timeout` → `Login`
/// 2. chat input element visible within `probe_timeout` → `Chat`
/// 3. URL contains a login marker → `Login`; a chat marker → `Chat`
/// 4. otherwise [`SessionError::AmbiguousNavigation`]; fatal, no retry.
pub async fn detect_state(
    surface: &dyn ChatSurface,
    selectors: &Selectors,
    probe_timeout: Duration,
) -> SessionResult<PageState> {
    if surface
        .wait_visible(&selectors.login.username_field.locator, probe_timeout)
        .await?
    {
        info!("detected login page via username field");
        return Ok(PageState::Login);
    }

    if surface
        .wait_visible(&selectors.chat_page.prompt_input.locator, probe_timeout)
        .await?
    {
        info!("detected chat page via prompt input");
        return Ok(PageState::Chat);
    }

    let url = surface.current_url().await?.to_lowercase();
    debug!(url, "no DOM marker matched, falling back to URL heuristics");

    if LOGIN_URL_MARKERS.iter().any(|m| url.contains(m)) {
        info!(url, "detected login page via URL");
        return Ok(PageState::Login);
    }
    if CHAT_URL_MARKERS.iter().any(|m| url.contains(m)) {
        info!(url, "detected chat page via URL");
        return Ok(PageState::Chat);
    }

    Err(SessionError::AmbiguousNavigation)
}
