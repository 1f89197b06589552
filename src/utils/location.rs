//! Location keys and control-site classification
//!
//! Every source spells sampling sites a little differently (`"WPN 1"`,
//! `" wpn  1"`). A `Location` keeps the first spelling it saw for display and
//! compares on a folded key, so joins never split one site into two rows.
//!
//! The control/other split is a pure function of the location and is always
//! computed through `GroupClassifier`, before and after merging.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Sampling site identity
#[derive(Debug, Clone, Serialize)]
pub struct Location {
    /// Trimmed, whitespace-collapsed, lowercased; used for equality and joins
    key: String,
    /// Trimmed, whitespace-collapsed, original casing
    display: String,
}

impl Location {
    /// Canonicalize raw cell text. Blank text has no location.
    pub fn parse(raw: &str) -> Option<Self> {
        let display = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if display.is_empty() {
            return None;
        }
        let key = display.to_lowercase();
        Some(Self { key, display })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Location {}

impl Hash for Location {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

/// Which side of the comparison a location belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupLabel {
    Control,
    Other,
}

/// Marker-substring rule separating the control site from everything else
///
/// The marker is folded the same way as location keys, so the label depends
/// only on `Location::key` and never on which spelling was seen first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupClassifier {
    /// Substring identifying the control site (e.g. "WPN")
    pub control_marker: String,
    #[serde(default = "default_control_label")]
    pub control_label: String,
    #[serde(default = "default_other_label")]
    pub other_label: String,
}

fn default_control_label() -> String {
    "WPN (control)".to_string()
}

fn default_other_label() -> String {
    "Other locations".to_string()
}

impl Default for GroupClassifier {
    fn default() -> Self {
        Self {
            control_marker: "WPN".to_string(),
            control_label: default_control_label(),
            other_label: default_other_label(),
        }
    }
}

impl GroupClassifier {
    pub fn new(control_marker: impl Into<String>) -> Self {
        Self {
            control_marker: control_marker.into(),
            ..Self::default()
        }
    }

    /// Marker in key form: whitespace collapsed, lowercased
    fn marker_key(&self) -> String {
        self.control_marker
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    pub fn classify(&self, location: &Location) -> GroupLabel {
        if location.key().contains(&self.marker_key()) {
            GroupLabel::Control
        } else {
            GroupLabel::Other
        }
    }

    /// Human-readable label for reports
    pub fn label(&self, group: GroupLabel) -> &str {
        match group {
            GroupLabel::Control => &self.control_label,
            GroupLabel::Other => &self.other_label,
        }
    }
}
