//! # Void Loading
//!
//! Loading orchestration for the Void Engine.
//!
//! Coordinates batches of asynchronous load units (scene loads, scene unloads,
//! arbitrary futures):
//! - Sequential and parallel batches
//! - One aggregated, non-decreasing progress stream per batch
//! - An observable `Idle`/`Loading` state machine with cooldown
//! - Cooperative cancellation that can be re-armed
//!
//! ## Usage
//!
//! ```ignore
//! let scenes: Arc<dyn SceneSystem> = Arc::new(SimulatedSceneSystem::new(["menu", "level_1"]));
//! let service = LoadingService::new();
//!
//! let mut unload = SceneUnloadUnit::new(scenes.clone(), "menu");
//! let mut load = SceneLoadUnit::new(scenes.clone(), "level_1", LoadSceneMode::Single);
//! let mut warmup = async { build_navmesh().await }.into_load_unit();
//!
//! service
//!     .begin_loading(
//!         LoadingOptions::typed("tips").with_cooldown_secs(0.5),
//!         &mut [&mut unload, &mut load, &mut warmup],
//!     )
//!     .await?;
//!
//! let navmesh = warmup.take_result();
//! ```

pub mod cell;
pub mod config;
pub mod error;
pub mod progress;
pub mod scene;
pub mod service;
pub mod unit;
pub mod units;

pub mod prelude {
    pub use crate::cell::{ObservableCell, Receiver, Subject, Subscription};
    pub use crate::config::{ConfigError, LoadingConfig, ParallelStateMode};
    pub use crate::error::{BoxError, InvalidTarget, LoadError, LoadResult};
    pub use crate::scene::{LoadSceneMode, SceneError, SceneSystem, SceneTarget, SimulatedSceneSystem};
    pub use crate::service::{LoadingOptions, LoadingPhase, LoadingService, LoadingState, LoadingStats};
    pub use crate::unit::{LoadUnit, LoadUnitResult};
    pub use crate::units::{IntoLoadUnit, SceneLoadUnit, SceneUnloadUnit, TaskUnit};
}

pub use prelude::*;

pub use tokio_util::sync::CancellationToken;
