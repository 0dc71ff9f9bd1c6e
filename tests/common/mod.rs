//! Scriptable in-memory page shared by the integration tests.

#![allow(dead_code)]

use mmo_pilot::models::Settings;
use mmo_pilot::surface::{AutomationSurface, ElementState, Selector, SurfaceError};
use mmo_pilot::{BotContext, StateManager};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One element of the page, addressed by the selector that finds it.
#[derive(Debug, Clone)]
pub struct FakeNode {
    pub visible: bool,
    pub enabled: bool,
    pub text: Option<String>,
}

impl FakeNode {
    pub fn clickable() -> Self {
        Self {
            visible: true,
            enabled: true,
            text: None,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            enabled: true,
            text: None,
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            visible: true,
            enabled: true,
            text: Some(text.to_string()),
        }
    }
}

#[derive(Debug, Default)]
pub struct PageModel {
    pub location: String,
    pub nodes: HashMap<String, FakeNode>,
}

impl PageModel {
    pub fn show(&mut self, selector: &Selector) {
        self.nodes.insert(selector.expr().to_string(), FakeNode::clickable());
    }

    pub fn put(&mut self, selector: &Selector, node: FakeNode) {
        self.nodes.insert(selector.expr().to_string(), node);
    }

    pub fn remove(&mut self, selector: &Selector) {
        self.nodes.remove(selector.expr());
    }
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub key: String,
}

type ClickHook = Box<dyn FnMut(&mut PageModel) -> bool + Send>;

/// [`AutomationSurface`] over a [`PageModel`].
///
/// Every lookup, click and navigation is recorded. Clicking an element runs
/// the hook registered for its selector, which may rewrite the page and
/// decides whether the click was delivered.
#[derive(Default)]
pub struct FakeSurface {
    page: Mutex<PageModel>,
    hooks: Mutex<HashMap<String, ClickHook>>,
    queries: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
    invalid: AtomicBool,
    reconnects: AtomicUsize,
    location_errors: AtomicUsize,
}

impl FakeSurface {
    pub fn at(location: &str) -> Self {
        let surface = Self::default();
        surface.edit(|page| page.location = location.to_string());
        surface
    }

    pub fn edit<R>(&self, f: impl FnOnce(&mut PageModel) -> R) -> R {
        f(&mut self.page.lock().unwrap())
    }

    pub fn show(&self, selector: &Selector) {
        self.edit(|page| page.show(selector));
    }

    pub fn put(&self, selector: &Selector, node: FakeNode) {
        self.edit(|page| page.put(selector, node));
    }

    pub fn location(&self) -> String {
        self.edit(|page| page.location.clone())
    }

    pub fn on_click(&self, selector: &Selector, hook: impl FnMut(&mut PageModel) -> bool + Send + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .insert(selector.expr().to_string(), Box::new(hook));
    }

    pub fn set_valid(&self, valid: bool) {
        self.invalid.store(!valid, Ordering::SeqCst);
    }

    /// Make the next `count` location lookups fail.
    pub fn fail_locations(&self, count: usize) {
        self.location_errors.store(count, Ordering::SeqCst);
    }

    pub fn reconnects(&self) -> usize {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn queried(&self, selector: &Selector) -> bool {
        self.queries.lock().unwrap().iter().any(|q| q == selector.expr())
    }

    pub fn queried_containing(&self, fragment: &str) -> bool {
        self.queries.lock().unwrap().iter().any(|q| q.contains(fragment))
    }

    pub fn clicks_on(&self, selector: &Selector) -> usize {
        self.clicks
            .lock()
            .unwrap()
            .iter()
            .filter(|c| *c == selector.expr())
            .count()
    }

    pub fn total_clicks(&self) -> usize {
        self.clicks.lock().unwrap().len()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

impl AutomationSurface for FakeSurface {
    type Element = FakeElement;

    async fn is_valid(&self) -> bool {
        !self.invalid.load(Ordering::SeqCst)
    }

    async fn reconnect(&self) -> Result<(), SurfaceError> {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        self.invalid.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn current_location(&self) -> Result<String, SurfaceError> {
        let failing = self
            .location_errors
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SurfaceError::Protocol("target closed".to_string()));
        }
        Ok(self.location())
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<FakeElement>, SurfaceError> {
        let key = selector.expr().to_string();
        self.queries.lock().unwrap().push(key.clone());
        let present = self.edit(|page| page.nodes.contains_key(&key));
        Ok(if present { vec![FakeElement { key }] } else { Vec::new() })
    }

    async fn element_state(&self, element: &FakeElement) -> Result<ElementState, SurfaceError> {
        self.edit(|page| {
            page.nodes
                .get(&element.key)
                .map(|node| ElementState {
                    visible: node.visible,
                    enabled: node.enabled,
                })
                .ok_or_else(|| SurfaceError::Protocol("stale element".to_string()))
        })
    }

    async fn click(&self, element: &FakeElement) -> bool {
        self.clicks.lock().unwrap().push(element.key.clone());
        let mut hooks = self.hooks.lock().unwrap();
        match hooks.get_mut(&element.key) {
            Some(hook) => hook(&mut self.page.lock().unwrap()),
            None => true,
        }
    }

    async fn read_text(&self, element: &FakeElement) -> Option<String> {
        self.edit(|page| page.nodes.get(&element.key).and_then(|node| node.text.clone()))
    }

    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.navigations.lock().unwrap().push(url.to_string());
        self.edit(|page| page.location = url.to_string());
        Ok(())
    }
}

/// Settings with the default site layout.
pub fn settings() -> Settings {
    Settings::default()
}

/// A running headless context.
pub fn context() -> BotContext {
    let ctx = BotContext::headless(settings());
    ctx.state.set_running(true);
    ctx
}

pub fn travel_url() -> String {
    settings().site.travel_url()
}

pub fn gather_url() -> String {
    format!("{}1234", settings().site.gather_prefix())
}

pub fn attack_url() -> String {
    format!("{}5678", settings().site.attack_prefix())
}

pub fn fresh_state() -> StateManager {
    StateManager::new()
}

pub fn shared(surface: FakeSurface) -> Arc<FakeSurface> {
    Arc::new(surface)
}
