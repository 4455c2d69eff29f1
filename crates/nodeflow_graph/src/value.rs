// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values flowing out of node outputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value held by one node output.
///
/// Outputs are either absent (not computed, or the computation failed),
/// a plain scalar, or a scalar tagged with its meaning, such as the
/// quotient/remainder pair of a division node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value
    #[default]
    Absent,
    /// Integer scalar
    Scalar(i64),
    /// Value with a meaning tag
    Tagged {
        /// Wrapped value
        value: Box<Value>,
        /// Meaning of the value
        #[serde(rename = "type")]
        tag: String,
    },
}

impl Value {
    /// Create a tagged value
    pub fn tagged(value: Value, tag: impl Into<String>) -> Self {
        Self::Tagged {
            value: Box::new(value),
            tag: tag.into(),
        }
    }

    /// Strip every level of tagging
    pub fn normalized(&self) -> &Value {
        let mut current = self;
        while let Self::Tagged { value, .. } = current {
            current = value.as_ref();
        }
        current
    }

    /// The scalar behind this value, if any
    pub fn as_scalar(&self) -> Option<i64> {
        match self.normalized() {
            Self::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    /// The tag, if this is a tagged value
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Tagged { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Whether no usable value is present
    pub fn is_absent(&self) -> bool {
        matches!(self.normalized(), Self::Absent)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "None"),
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Tagged { value, tag } => write!(f, "{value} ({tag})"),
        }
    }
}

/// Extract the value meant for output `index` from a node's output list.
///
/// Tagged values are unwrapped; an index past the end yields
/// [`Value::Absent`].
pub fn extract_output(values: &[Value], index: usize) -> Value {
    values
        .get(index)
        .map(|v| v.normalized().clone())
        .unwrap_or_default()
}
