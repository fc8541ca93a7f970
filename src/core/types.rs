use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identity of a chart state object.
///
/// Pools key their membership registry by this id; multigraph controllers
/// derive it as `multigrapher-{id}-{index}` so drag targets can be addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartId(String);

impl ChartId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ChartId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
