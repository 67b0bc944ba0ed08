use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

impl Priority {
    /// Numeric level on the -2..=2 scale used by desktop notification centers.
    pub fn level(self) -> i8 {
        match self {
            Priority::Normal => 0,
            Priority::High => 2,
        }
    }
}

/// A user-visible alert handed to every configured notification sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: String,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    #[serde(default)]
    pub require_interaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeColor {
    Neutral,
    Alert,
}

impl BadgeColor {
    pub fn hex(self) -> &'static str {
        match self {
            BadgeColor::Neutral => "#4caf50",
            BadgeColor::Alert => "#f44336",
        }
    }
}

/// Aggregate low-balance indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeState {
    pub count: usize,
    pub color: BadgeColor,
    /// Badge label: the low-balance count, or empty when nothing is low.
    pub text: String,
    pub tooltip_lines: Vec<String>,
}

impl BadgeState {
    pub fn tooltip(&self) -> String {
        self.tooltip_lines.join("\n")
    }
}
