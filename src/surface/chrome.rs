//! [`AutomationSurface`] over the Chrome DevTools Protocol.
//!
//! Attaches to a browser the user already runs with
//! `--remote-debugging-port`, so the game session (login, cookies) is reused.

use super::{AutomationSurface, ElementState, Selector, SurfaceError};
use crate::models::{BrowserSettings, SiteConfig};
use chromiumoxide::{Browser, Element, Page};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Upper bound for any single protocol call.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Time given to the handler to attach existing tabs after target discovery.
const TARGET_DISCOVERY_SETTLE: Duration = Duration::from_millis(500);

const ELEMENT_STATE_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    const rect = this.getBoundingClientRect();
    const visible = style.display !== 'none'
        && style.visibility !== 'hidden'
        && rect.width > 0
        && rect.height > 0;
    const enabled = !this.disabled && this.getAttribute('aria-disabled') !== 'true';
    return JSON.stringify({ visible: visible, enabled: enabled });
}"#;

struct Connection {
    // Kept alive for the page's lifetime; dropping it closes the websocket.
    _browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// A single page of an already-running Chromium-family browser.
pub struct ChromeSurface {
    debug_address: String,
    start_url: String,
    site_base: String,
    connection: Mutex<Option<Connection>>,
}

impl ChromeSurface {
    /// Create a surface without connecting; call [`AutomationSurface::reconnect`]
    /// or [`ChromeSurface::connect`] before use.
    pub fn new(browser: &BrowserSettings, site: &SiteConfig) -> Self {
        Self {
            debug_address: browser.debug_address.clone(),
            start_url: browser.start_url.clone(),
            site_base: site.base_url.clone(),
            connection: Mutex::new(None),
        }
    }

    /// Create and connect in one go.
    pub async fn connect(browser: &BrowserSettings, site: &SiteConfig) -> Result<Self, SurfaceError> {
        let surface = Self::new(browser, site);
        surface.reconnect().await?;
        Ok(surface)
    }

    async fn open(&self) -> Result<Connection, SurfaceError> {
        let endpoint = if self.debug_address.contains("://") {
            self.debug_address.clone()
        } else {
            format!("http://{}", self.debug_address)
        };

        tracing::info!("Connecting to browser at {}", endpoint);

        let (mut browser, mut handler) = bounded(Browser::connect(endpoint.as_str()))
            .await?
            .map_err(|e| SurfaceError::NotConnected(e.to_string()))?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        bounded(browser.fetch_targets())
            .await?
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;
        tokio::time::sleep(TARGET_DISCOVERY_SETTLE).await;

        let pages = bounded(browser.pages())
            .await?
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;

        let mut chosen = None;
        for page in pages {
            if let Ok(Ok(Some(url))) = bounded(page.url()).await {
                if url.starts_with(&self.site_base) {
                    tracing::debug!("Attaching to existing tab at {}", url);
                    chosen = Some(page);
                    break;
                }
            }
        }

        let page = match chosen {
            Some(page) => page,
            None => {
                tracing::info!("No game tab open, opening {}", self.start_url);
                bounded(browser.new_page(self.start_url.as_str()))
                    .await?
                    .map_err(|e| SurfaceError::Navigation {
                        url: self.start_url.clone(),
                        reason: e.to_string(),
                    })?
            }
        };

        Ok(Connection {
            _browser: browser,
            page,
            handler,
        })
    }

    async fn page(&self) -> Result<Page, SurfaceError> {
        self.connection
            .lock()
            .await
            .as_ref()
            .map(|connection| connection.page.clone())
            .ok_or_else(|| SurfaceError::NotConnected("no active page".to_string()))
    }
}

/// Apply [`CALL_TIMEOUT`] to a protocol call.
async fn bounded<T>(call: impl Future<Output = T>) -> Result<T, SurfaceError> {
    tokio::time::timeout(CALL_TIMEOUT, call)
        .await
        .map_err(|_| SurfaceError::Timeout(CALL_TIMEOUT))
}

impl AutomationSurface for ChromeSurface {
    type Element = Element;

    async fn is_valid(&self) -> bool {
        {
            let connection = self.connection.lock().await;
            match connection.as_ref() {
                Some(connection) if !connection.handler.is_finished() => {}
                _ => return false,
            }
        }

        match self.page().await {
            Ok(page) => matches!(bounded(page.url()).await, Ok(Ok(_))),
            Err(_) => false,
        }
    }

    async fn reconnect(&self) -> Result<(), SurfaceError> {
        let mut connection = self.connection.lock().await;
        // Drop the old handler before opening a new websocket
        connection.take();
        *connection = Some(self.open().await?);
        tracing::info!("Browser connection established");
        Ok(())
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        let page = self.page().await?;
        let url = bounded(page.url())
            .await?
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;
        Ok(url.unwrap_or_default())
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<Element>, SurfaceError> {
        let page = self.page().await?;
        let found = match selector {
            Selector::XPath(expr) => bounded(page.find_xpaths(expr.to_string())).await?,
            Selector::Css(expr) => bounded(page.find_elements(expr.to_string())).await?,
        };
        found.map_err(|e| SurfaceError::Protocol(e.to_string()))
    }

    async fn element_state(&self, element: &Element) -> Result<ElementState, SurfaceError> {
        let returns = bounded(element.call_js_fn(ELEMENT_STATE_JS, false))
            .await?
            .map_err(|e| SurfaceError::Protocol(e.to_string()))?;

        let encoded = returns
            .result
            .value
            .as_ref()
            .and_then(|value| value.as_str())
            .ok_or_else(|| SurfaceError::Protocol("element state was not returned".to_string()))?;

        serde_json::from_str(encoded).map_err(|e| SurfaceError::Protocol(e.to_string()))
    }

    async fn click(&self, element: &Element) -> bool {
        match bounded(element.click()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!("Click failed: {}", e);
                false
            }
            Err(e) => {
                tracing::debug!("Click failed: {}", e);
                false
            }
        }
    }

    async fn read_text(&self, element: &Element) -> Option<String> {
        match bounded(element.inner_text()).await {
            Ok(Ok(Some(text))) => Some(text.trim().to_string()),
            _ => None,
        }
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        let page = self.page().await?;
        bounded(page.goto(url))
            .await?
            .map_err(|e| SurfaceError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}
