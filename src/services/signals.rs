//! Page signals of the target site.
//!
//! Selectors must match the live site exactly; change them only together
//! with the site's markup.

use crate::surface::{AutomationSurface, Selector};
use regex::Regex;
use std::sync::LazyLock;

/// Verification challenge on the travel page.
pub const CHALLENGE: Selector = Selector::xpath(r#"//a[contains(text(), "I'm a person!")]"#);

/// Verification challenge inside a combat.
pub const COMBAT_CHALLENGE: Selector =
    Selector::xpath("//a[@href='/i-am-not-a-bot' and contains(text(), 'Press here to verify')]");

/// Shown while the character is defeated.
pub const DEFEATED: Selector = Selector::xpath("//a[contains(text(), 'How do I heal?')]");

pub const HEAL_BUTTON: Selector = Selector::xpath("//button[contains(text(), 'Heal Character')]");

pub const ENERGY: Selector = Selector::css("span.energy-text");

pub const COLLECT_BUTTON: Selector =
    Selector::xpath("//button[@id='crafting_button' and .//span[text()='Press here to gather']]");

pub const CLOSE_BUTTON: Selector = Selector::xpath("//button[.//span[text()='Press here to close']]");

pub const INSUFFICIENT_LEVEL: Selector = Selector::xpath(
    "//div[contains(@class, 'text-red-800') and contains(text(), 'Your skill level isn')]",
);

pub const AVAILABLE_AMOUNT: Selector = Selector::xpath(
    "//div[contains(@class, 'text-gray-500') and contains(@class, 'font-semibold') and @x-text='available_amount']",
);

/// Attack entry on the travel page.
pub const ATTACK_ENTRY: Selector =
    Selector::xpath("//a[contains(text(), 'Attack')] | //button[contains(text(), 'Attack')]");

/// Attack control inside a combat.
pub const ATTACK_BUTTON: Selector =
    Selector::xpath("//button[normalize-space(text())='Attack' and not(@disabled)]");

pub const LEAVE_BUTTON: Selector = Selector::xpath("//button[contains(text(), 'Leave')]");

pub const STEP_BUTTON: Selector = Selector::xpath("//button[contains(., 'Take a step')]");

pub const STEP_LINK: Selector = Selector::xpath("//a[contains(., 'Take a step')]");

/// Labels of the gather entries on the travel page, in preference order.
pub const GATHER_ENTRIES: [&str; 4] = ["Chop", "Mine", "Salvage", "Catch"];

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("Invalid number regex"));

/// First run of digits in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    NUMBER.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Button with the given label, as used by the travel page's entries.
pub fn button_with_text(label: &str) -> Selector {
    Selector::xpath_owned(format!("//button[contains(text(), '{label}')]"))
}

/// Link with the given label, the fallback for [`button_with_text`].
pub fn link_with_text(label: &str) -> Selector {
    Selector::xpath_owned(format!("//a[contains(text(), '{label}')]"))
}

/// Current energy, when the gauge is readable.
pub async fn energy<S: AutomationSurface>(surface: &S) -> Option<u32> {
    let element = surface.find(&ENERGY).await?;
    let text = surface.read_text(&element).await?;
    first_number(&text)
}

/// Remaining materials of the open node, when shown.
pub async fn available_amount<S: AutomationSurface>(surface: &S) -> Option<u32> {
    let element = surface.find(&AVAILABLE_AMOUNT).await?;
    let text = surface.read_text(&element).await?;
    first_number(&text)
}

pub async fn challenge_present<S: AutomationSurface>(surface: &S) -> bool {
    surface.is_visible(&CHALLENGE).await
}

pub async fn combat_challenge_present<S: AutomationSurface>(surface: &S) -> bool {
    surface.is_visible(&COMBAT_CHALLENGE).await
}

pub async fn defeated<S: AutomationSurface>(surface: &S) -> bool {
    surface.is_visible(&DEFEATED).await
}

pub async fn insufficient_level<S: AutomationSurface>(surface: &S) -> bool {
    surface.is_visible(&INSUFFICIENT_LEVEL).await
}

/// Whether the "close" control of a collection interface can be clicked.
pub async fn close_available<S: AutomationSurface>(surface: &S) -> bool {
    surface.is_clickable(&CLOSE_BUTTON).await
}

/// Readiness of the collect control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectButton {
    Ready,
    Hidden,
    Disabled,
    Missing,
}

pub async fn collect_button<S: AutomationSurface>(surface: &S) -> CollectButton {
    let Some(element) = surface.find(&COLLECT_BUTTON).await else {
        return CollectButton::Missing;
    };
    match surface.element_state(&element).await {
        Ok(state) if !state.visible => CollectButton::Hidden,
        Ok(state) if !state.enabled => CollectButton::Disabled,
        Ok(_) => CollectButton::Ready,
        Err(_) => CollectButton::Missing,
    }
}

/// First clickable element labelled `label`: buttons first, then links.
pub async fn find_labelled<S: AutomationSurface>(surface: &S, label: &str) -> Option<S::Element> {
    if let Some(element) = surface.find_visible_clickable(&button_with_text(label)).await {
        return Some(element);
    }
    surface.find_visible_clickable(&link_with_text(label)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("42"), Some(42));
        assert_eq!(first_number("  7 left "), Some(7));
        assert_eq!(first_number("Energy: 15/50"), Some(15));
        assert_eq!(first_number("none"), None);
    }

    #[test]
    fn test_labelled_selectors() {
        assert_eq!(button_with_text("Chop").expr(), "//button[contains(text(), 'Chop')]");
        assert_eq!(link_with_text("Mine").expr(), "//a[contains(text(), 'Mine')]");
    }

    #[test]
    fn test_challenge_selector_is_exact() {
        assert_eq!(CHALLENGE.expr(), r#"//a[contains(text(), "I'm a person!")]"#);
    }
}
