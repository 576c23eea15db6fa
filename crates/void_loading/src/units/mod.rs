//! Concrete load units

mod scene;
mod task;

pub use scene::{SceneLoadUnit, SceneUnloadUnit};
pub use task::{IntoLoadUnit, TaskUnit};
