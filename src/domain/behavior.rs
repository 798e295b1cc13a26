//! Annotation behavior settings and their scope-merge rules.
//!
//! Settings are declared per scope (the server-wide root and any number of
//! directory prefixes). Every field of [`BehaviorOverrides`] is optional: `None`
//! means "inherit from the broader scope". Once the scopes matching a request
//! are folded together with [`merge`], [`BehaviorOverrides::resolve`] fills the
//! remaining gaps with defaults and yields an immutable [`BehaviorConfig`].

use super::types::{BehaviorAction, LinkStatus};

/// Settings declared at one scope. `None` leaves the inherited value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorOverrides {
    pub enabled: Option<bool>,
    pub store_location: Option<String>,
    pub behavior_up: Option<BehaviorAction>,
    pub behavior_down: Option<BehaviorAction>,
    pub hover_delay_up: Option<u32>,
    pub hover_delay_down: Option<u32>,
    pub country: Option<String>,
    pub country_behavior_up: Option<BehaviorAction>,
    pub country_behavior_down: Option<BehaviorAction>,
    pub country_hover_delay_up: Option<u32>,
    pub country_hover_delay_down: Option<u32>,
    pub cache_delivery: Option<bool>,
}

/// Fold a narrower scope onto a broader one. Explicit child values win.
pub fn merge(parent: &BehaviorOverrides, child: &BehaviorOverrides) -> BehaviorOverrides {
    BehaviorOverrides {
        enabled: child.enabled.or(parent.enabled),
        store_location: child
            .store_location
            .clone()
            .or_else(|| parent.store_location.clone()),
        behavior_up: child.behavior_up.or(parent.behavior_up),
        behavior_down: child.behavior_down.or(parent.behavior_down),
        hover_delay_up: child.hover_delay_up.or(parent.hover_delay_up),
        hover_delay_down: child.hover_delay_down.or(parent.hover_delay_down),
        country: child.country.clone().or_else(|| parent.country.clone()),
        country_behavior_up: child.country_behavior_up.or(parent.country_behavior_up),
        country_behavior_down: child.country_behavior_down.or(parent.country_behavior_down),
        country_hover_delay_up: child.country_hover_delay_up.or(parent.country_hover_delay_up),
        country_hover_delay_down: child
            .country_hover_delay_down
            .or(parent.country_hover_delay_down),
        cache_delivery: child.cache_delivery.or(parent.cache_delivery),
    }
}

impl BehaviorOverrides {
    /// Produce the per-request configuration, defaulting anything still unset.
    pub fn resolve(&self) -> BehaviorConfig {
        BehaviorConfig {
            enabled: self.enabled.unwrap_or(false),
            store_location: self.store_location.clone().unwrap_or_default(),
            behavior_up: self.behavior_up.unwrap_or_default(),
            behavior_down: self.behavior_down.unwrap_or_default(),
            hover_delay_up: self.hover_delay_up.unwrap_or(0),
            hover_delay_down: self.hover_delay_down.unwrap_or(0),
            country: self.country.clone().filter(|code| !code.trim().is_empty()),
            country_behavior_up: self.country_behavior_up.unwrap_or_default(),
            country_behavior_down: self.country_behavior_down.unwrap_or_default(),
            country_hover_delay_up: self.country_hover_delay_up.unwrap_or(0),
            country_hover_delay_down: self.country_hover_delay_down.unwrap_or(0),
            cache_delivery: self.cache_delivery.unwrap_or(false),
        }
    }
}

/// Fully resolved behavior for one request. Never mutated after resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BehaviorConfig {
    pub enabled: bool,
    pub store_location: String,
    pub behavior_up: BehaviorAction,
    pub behavior_down: BehaviorAction,
    pub hover_delay_up: u32,
    pub hover_delay_down: u32,
    pub country: Option<String>,
    pub country_behavior_up: BehaviorAction,
    pub country_behavior_down: BehaviorAction,
    pub country_hover_delay_up: u32,
    pub country_hover_delay_down: u32,
    pub cache_delivery: bool,
}

impl BehaviorConfig {
    /// Primary action and hover delay for links in the given state.
    pub fn behavior_for(&self, status: LinkStatus) -> (BehaviorAction, u32) {
        match status {
            LinkStatus::Up => (self.behavior_up, self.hover_delay_up),
            LinkStatus::Down => (self.behavior_down, self.hover_delay_down),
        }
    }

    /// Country-specific action and hover delay for links in the given state.
    pub fn country_behavior_for(&self, status: LinkStatus) -> (BehaviorAction, u32) {
        match status {
            LinkStatus::Up => (self.country_behavior_up, self.country_hover_delay_up),
            LinkStatus::Down => (self.country_behavior_down, self.country_hover_delay_down),
        }
    }
}
