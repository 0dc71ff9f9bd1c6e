//! The controllable browser page.
//!
//! [`AutomationSurface`] is the seam between the decision logic and the
//! browser. Lookups report absence as an empty result; only a broken
//! connection or protocol failure is an `Err`. Callers treat both as an
//! ordinary outcome and never assume a call is instantaneous.

pub mod chrome;

pub use chrome::ChromeSurface;

use serde::Deserialize;
use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Poll interval of [`AutomationSurface::wait_for_clickable`].
pub const CLICKABLE_POLL: Duration = Duration::from_millis(250);

/// How many matches of a selector are inspected before giving up.
pub const MAX_CANDIDATES: usize = 3;

/// Errors raised by an automation surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("browser is not connected: {0}")]
    NotConnected(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser call timed out after {0:?}")]
    Timeout(Duration),
}

/// Element query understood by the surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    XPath(Cow<'static, str>),
    Css(Cow<'static, str>),
}

impl Selector {
    pub const fn xpath(expr: &'static str) -> Self {
        Self::XPath(Cow::Borrowed(expr))
    }

    pub const fn css(expr: &'static str) -> Self {
        Self::Css(Cow::Borrowed(expr))
    }

    pub fn xpath_owned(expr: String) -> Self {
        Self::XPath(Cow::Owned(expr))
    }

    /// The raw query expression.
    pub fn expr(&self) -> &str {
        match self {
            Self::XPath(expr) | Self::Css(expr) => expr,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XPath(expr) => write!(f, "xpath:{expr}"),
            Self::Css(expr) => write!(f, "css:{expr}"),
        }
    }
}

/// Visibility and interactivity of one element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ElementState {
    pub visible: bool,
    pub enabled: bool,
}

impl ElementState {
    pub fn clickable(self) -> bool {
        self.visible && self.enabled
    }
}

/// A controllable browser page.
///
/// Implementations hold exactly one page; no two tasks should drive the same
/// surface concurrently.
pub trait AutomationSurface: Send + Sync {
    type Element: Send + Sync;

    /// Whether the underlying page still answers.
    fn is_valid(&self) -> impl Future<Output = bool> + Send;

    /// Drop the current connection and build a new one.
    fn reconnect(&self) -> impl Future<Output = Result<(), SurfaceError>> + Send;

    /// URL of the page.
    fn current_location(&self) -> impl Future<Output = Result<String, SurfaceError>> + Send;

    /// Every element matching `selector`, in document order.
    fn find_all(
        &self,
        selector: &Selector,
    ) -> impl Future<Output = Result<Vec<Self::Element>, SurfaceError>> + Send;

    fn element_state(
        &self,
        element: &Self::Element,
    ) -> impl Future<Output = Result<ElementState, SurfaceError>> + Send;

    /// Click an element. `false` when the click could not be delivered.
    fn click(&self, element: &Self::Element) -> impl Future<Output = bool> + Send;

    /// Rendered text of an element, trimmed.
    fn read_text(&self, element: &Self::Element) -> impl Future<Output = Option<String>> + Send;

    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), SurfaceError>> + Send;

    /// First element matching `selector`.
    fn find(&self, selector: &Selector) -> impl Future<Output = Option<Self::Element>> + Send {
        async move {
            match self.find_all(selector).await {
                Ok(elements) => elements.into_iter().next(),
                Err(e) => {
                    tracing::debug!("Lookup of {} failed: {}", selector, e);
                    None
                }
            }
        }
    }

    /// First of the leading matches that is both visible and enabled.
    fn find_visible_clickable(
        &self,
        selector: &Selector,
    ) -> impl Future<Output = Option<Self::Element>> + Send {
        async move {
            let elements = match self.find_all(selector).await {
                Ok(elements) => elements,
                Err(e) => {
                    tracing::debug!("Lookup of {} failed: {}", selector, e);
                    return None;
                }
            };

            for element in elements.into_iter().take(MAX_CANDIDATES) {
                match self.element_state(&element).await {
                    Ok(state) if state.clickable() => return Some(element),
                    _ => {}
                }
            }
            None
        }
    }

    /// Whether the first match of `selector` is displayed.
    fn is_visible(&self, selector: &Selector) -> impl Future<Output = bool> + Send {
        async move {
            match self.find(selector).await {
                Some(element) => self
                    .element_state(&element)
                    .await
                    .map(|state| state.visible)
                    .unwrap_or(false),
                None => false,
            }
        }
    }

    /// Whether some leading match of `selector` can be clicked right now.
    fn is_clickable(&self, selector: &Selector) -> impl Future<Output = bool> + Send {
        async move { self.find_visible_clickable(selector).await.is_some() }
    }

    /// Text of the first visible match of `selector`.
    fn selector_text(&self, selector: &Selector) -> impl Future<Output = Option<String>> + Send {
        async move {
            let element = self.find(selector).await?;
            let state = self.element_state(&element).await.ok()?;
            if !state.visible {
                return None;
            }
            self.read_text(&element).await
        }
    }

    /// Whether the page URL starts with `prefix`. Lookup failures read as `false`.
    fn location_starts_with(&self, prefix: &str) -> impl Future<Output = bool> + Send {
        async move {
            self.current_location()
                .await
                .map(|location| location.starts_with(prefix))
                .unwrap_or(false)
        }
    }

    /// Poll until `selector` yields a clickable element or `timeout` elapses.
    fn wait_for_clickable(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> impl Future<Output = Option<Self::Element>> + Send {
        async move {
            let deadline = Instant::now() + timeout;
            loop {
                if let Some(element) = self.find_visible_clickable(selector).await {
                    return Some(element);
                }
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                tokio::time::sleep((deadline - now).min(CLICKABLE_POLL)).await;
            }
        }
    }
}

/// A page with nothing on it.
#[cfg(test)]
pub(crate) struct BlankPage;

#[cfg(test)]
impl AutomationSurface for BlankPage {
    type Element = ();

    async fn is_valid(&self) -> bool {
        true
    }

    async fn reconnect(&self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        Ok(String::new())
    }

    async fn find_all(&self, _selector: &Selector) -> Result<Vec<()>, SurfaceError> {
        Ok(Vec::new())
    }

    async fn element_state(&self, _element: &()) -> Result<ElementState, SurfaceError> {
        Ok(ElementState::default())
    }

    async fn click(&self, _element: &()) -> bool {
        false
    }

    async fn read_text(&self, _element: &()) -> Option<String> {
        None
    }

    async fn navigate(&self, _url: &str) -> Result<(), SurfaceError> {
        Ok(())
    }
}
