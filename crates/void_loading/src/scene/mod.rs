//! Scene subsystem seam
//!
//! Load units never talk to an engine directly. They go through a
//! [`SceneSystem`], which performs the actual load/unload and reports its own
//! progress into the subject it is handed.

mod simulated;

pub use simulated::SimulatedSceneSystem;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::Subject;
use crate::error::InvalidTarget;

/// Scene identifier, resolved once when a unit is built
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SceneTarget {
    /// Scene addressed by name
    ByName(String),
    /// Scene addressed by build index
    ByIndex(usize),
}

impl fmt::Display for SceneTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByName(name) => write!(f, "{}", name),
            Self::ByIndex(index) => write!(f, "#{}", index),
        }
    }
}

impl From<&str> for SceneTarget {
    fn from(name: &str) -> Self {
        Self::ByName(name.to_string())
    }
}

impl From<String> for SceneTarget {
    fn from(name: String) -> Self {
        Self::ByName(name)
    }
}

impl From<usize> for SceneTarget {
    fn from(index: usize) -> Self {
        Self::ByIndex(index)
    }
}

impl TryFrom<&serde_json::Value> for SceneTarget {
    type Error = InvalidTarget;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::String(name) if !name.is_empty() => Ok(Self::ByName(name.clone())),
            Value::String(_) => Err(InvalidTarget::new("empty scene name")),
            Value::Number(number) => number
                .as_u64()
                .and_then(|index| usize::try_from(index).ok())
                .map(Self::ByIndex)
                .ok_or_else(|| InvalidTarget::new(format!("number {}", number))),
            Value::Null => Err(InvalidTarget::new("null")),
            Value::Bool(flag) => Err(InvalidTarget::new(format!("boolean {}", flag))),
            Value::Array(_) => Err(InvalidTarget::new("array")),
            Value::Object(_) => Err(InvalidTarget::new("object")),
        }
    }
}

/// How a loaded scene combines with the scenes already present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSceneMode {
    /// Replace every loaded scene
    Single,
    /// Load alongside the scenes already present
    Additive,
}

impl Default for LoadSceneMode {
    fn default() -> Self {
        Self::Single
    }
}

/// Scene subsystem errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("Scene not found: {0}")]
    NotFound(String),

    #[error("Scene is not loaded: {0}")]
    NotLoaded(String),

    #[error("Scene operation failed: {0}")]
    Failed(String),
}

/// Engine scene manager as seen by load units
///
/// Implementations report progress in `[0, 1]` through `progress` while the
/// operation runs. Cancellation is handled by the calling unit, which drops
/// the returned future when its token fires.
#[async_trait]
pub trait SceneSystem: Send + Sync {
    /// Load a scene
    async fn load_scene(
        &self,
        target: &SceneTarget,
        mode: LoadSceneMode,
        progress: &Subject<f32>,
    ) -> Result<(), SceneError>;

    /// Unload a scene
    async fn unload_scene(
        &self,
        target: &SceneTarget,
        progress: &Subject<f32>,
    ) -> Result<(), SceneError>;
}
