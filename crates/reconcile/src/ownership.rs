//! Ownership tagging
//!
//! Every container and network hivekeep creates carries the label
//! `managed-by=hivekeep`. The label is checked when state is read, never
//! assumed: a resource without the exact value is foreign and is left alone.
//!
//! Packages have no attachable label. Package ownership is whatever the
//! desired-state list declares.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Label key stamped on managed resources
pub const LABEL_KEY: &str = "managed-by";

/// The single recognized owner value
pub const LABEL_VALUE: &str = "hivekeep";

/// Owner of a live resource, as read from its labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "owner", content = "value", rename_all = "lowercase")]
pub enum Owner {
    /// Labeled `managed-by=hivekeep`
    Managed,
    /// Labeled with some other manager
    Foreign(String),
    /// No `managed-by` label at all
    Unlabeled,
}

impl Owner {
    /// Read the owner from a label map
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        Self::from_label_value(labels.get(LABEL_KEY).map(String::as_str))
    }

    /// Read the owner from the raw `managed-by` value, if any
    pub fn from_label_value(value: Option<&str>) -> Self {
        match value {
            None => Self::Unlabeled,
            Some(v) if v == LABEL_VALUE => Self::Managed,
            Some(v) => Self::Foreign(v.to_string()),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed)
    }

    /// Label value for display, `"unknown"` when unlabeled
    pub fn label_value(&self) -> &str {
        match self {
            Self::Managed => LABEL_VALUE,
            Self::Foreign(v) => v,
            Self::Unlabeled => "unknown",
        }
    }
}

/// Labels to stamp on a resource at creation
pub fn managed_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_KEY.to_string(), LABEL_VALUE.to_string())])
}
