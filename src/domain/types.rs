//! Shared domain enumerations aligned with persisted store values.

use serde::{Deserialize, Serialize};

/// Client-side fallback strategy advertised for a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorAction {
    #[default]
    None,
    Hover,
    Popup,
    Cache,
}

impl BehaviorAction {
    /// Interpret a configuration value. Anything unrecognised disables the behavior.
    pub fn from_directive(value: &str) -> Self {
        match value.trim() {
            "cache" => BehaviorAction::Cache,
            "popup" => BehaviorAction::Popup,
            "hover" => BehaviorAction::Hover,
            _ => BehaviorAction::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorAction::None => "none",
            BehaviorAction::Hover => "hover",
            BehaviorAction::Popup => "popup",
            BehaviorAction::Cache => "cache",
        }
    }
}

/// Reachability of the live resource as last recorded by the link checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Down,
    Up,
}

impl LinkStatus {
    /// Map the checker's integer column (`1` = reachable) onto a status.
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Down => "down",
            LinkStatus::Up => "up",
        }
    }
}
