//! Document-side types shared by the migrator and write batches.

use crate::error::{TraversalError, TraversalResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::fmt::Debug;

/// Field/value pairs applied by an update; keys may be dotted field paths
pub type UpdateData = serde_json::Map<String, Value>;

/// A traversed item that can be addressed by a write batch
pub trait Document: Send + Sync + 'static {
    type Ref: Clone + Debug + Send + Sync + 'static;

    fn reference(&self) -> Self::Ref;
}

/// Path to a possibly nested field, e.g. `address.city`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn from_segments<I, T>(segments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn validate(&self) -> TraversalResult<()> {
        if self.0.is_empty() || self.0.iter().any(String::is_empty) {
            return Err(TraversalError::validation(format!(
                "invalid field path '{self}': segments must be non-empty"
            )));
        }
        Ok(())
    }

    /// Write `value` at this path, creating intermediate objects as needed
    ///
    /// A non-object value found on the way is replaced by an object.
    pub fn set_in(&self, target: &mut UpdateData, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };

        let mut current = target;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(UpdateData::new()));
            if !entry.is_object() {
                *entry = Value::Object(UpdateData::new());
            }
            let Value::Object(map) = entry else {
                return;
            };
            current = map;
        }
        current.insert(last.clone(), value);
    }

    /// Read the value at this path
    pub fn get_in<'a>(&self, source: &'a UpdateData) -> Option<&'a Value> {
        let (first, rest) = self.0.split_first()?;
        rest.iter()
            .try_fold(source.get(first)?, |value, segment| value.get(segment))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::from_segments(path.split('.'))
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self::from(path.as_str())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
