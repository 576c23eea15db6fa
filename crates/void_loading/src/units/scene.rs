//! Scene load and unload units

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cell::Subject;
use crate::error::{InvalidTarget, LoadError, LoadResult};
use crate::scene::{LoadSceneMode, SceneError, SceneSystem, SceneTarget};
use crate::unit::{settle, LoadUnit, DEFAULT_SETTLE_DELAY};

fn label(kind: &str, target: &Result<SceneTarget, InvalidTarget>) -> String {
    match target {
        Ok(target) => format!("{}({})", kind, target),
        Err(_) => format!("{}(<invalid>)", kind),
    }
}

fn resolve<'a>(
    label: &str,
    target: &'a Result<SceneTarget, InvalidTarget>,
) -> LoadResult<&'a SceneTarget> {
    target.as_ref().map_err(|invalid| {
        log::error!("{}: {}", label, invalid);
        LoadError::from(invalid.clone())
    })
}

/// Race a scene operation against cancellation, then settle
async fn drive<F>(
    cancel: &CancellationToken,
    target: &SceneTarget,
    settle_delay: Duration,
    operation: F,
) -> LoadResult<()>
where
    F: Future<Output = Result<(), SceneError>> + Send,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(LoadError::Cancelled),
        result = operation => result.map_err(|source| LoadError::Scene {
            target: target.to_string(),
            source,
        })?,
    }

    settle(cancel, settle_delay).await
}

/// Loads one scene through a [`SceneSystem`]
pub struct SceneLoadUnit {
    scenes: Arc<dyn SceneSystem>,
    target: Result<SceneTarget, InvalidTarget>,
    mode: LoadSceneMode,
    settle_delay: Duration,
    progress: Subject<f32>,
    label: String,
}

impl SceneLoadUnit {
    /// Create a unit loading `target` with `mode`
    pub fn new(
        scenes: Arc<dyn SceneSystem>,
        target: impl Into<SceneTarget>,
        mode: LoadSceneMode,
    ) -> Self {
        Self::with_target(scenes, Ok(target.into()), mode)
    }

    /// Create a unit from a dynamic identifier
    ///
    /// The identifier is resolved here, once. An unsupported shape makes
    /// [`load`](LoadUnit::load) fail with [`LoadError::InvalidTarget`] without
    /// touching the scene system.
    pub fn from_value(
        scenes: Arc<dyn SceneSystem>,
        value: &serde_json::Value,
        mode: LoadSceneMode,
    ) -> Self {
        Self::with_target(scenes, SceneTarget::try_from(value), mode)
    }

    fn with_target(
        scenes: Arc<dyn SceneSystem>,
        target: Result<SceneTarget, InvalidTarget>,
        mode: LoadSceneMode,
    ) -> Self {
        Self {
            label: label("SceneLoadUnit", &target),
            scenes,
            target,
            mode,
            settle_delay: DEFAULT_SETTLE_DELAY,
            progress: Subject::new(),
        }
    }

    /// Override the post-completion settle delay (zero disables it)
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// The resolved target
    pub fn target(&self) -> Result<&SceneTarget, &InvalidTarget> {
        self.target.as_ref()
    }

    /// Load mode
    pub fn mode(&self) -> LoadSceneMode {
        self.mode
    }
}

#[async_trait]
impl LoadUnit for SceneLoadUnit {
    fn name(&self) -> &str {
        &self.label
    }

    fn progress(&self) -> &Subject<f32> {
        &self.progress
    }

    async fn load(&mut self, cancel: &CancellationToken) -> LoadResult<()> {
        let target = resolve(&self.label, &self.target)?;
        let operation = self.scenes.load_scene(target, self.mode, &self.progress);
        drive(cancel, target, self.settle_delay, operation).await
    }
}

/// Unloads one scene through a [`SceneSystem`]
pub struct SceneUnloadUnit {
    scenes: Arc<dyn SceneSystem>,
    target: Result<SceneTarget, InvalidTarget>,
    settle_delay: Duration,
    progress: Subject<f32>,
    label: String,
}

impl SceneUnloadUnit {
    /// Create a unit unloading `target`
    pub fn new(scenes: Arc<dyn SceneSystem>, target: impl Into<SceneTarget>) -> Self {
        Self::with_target(scenes, Ok(target.into()))
    }

    /// Create a unit from a dynamic identifier, resolved once here
    pub fn from_value(scenes: Arc<dyn SceneSystem>, value: &serde_json::Value) -> Self {
        Self::with_target(scenes, SceneTarget::try_from(value))
    }

    fn with_target(scenes: Arc<dyn SceneSystem>, target: Result<SceneTarget, InvalidTarget>) -> Self {
        Self {
            label: label("SceneUnloadUnit", &target),
            scenes,
            target,
            settle_delay: DEFAULT_SETTLE_DELAY,
            progress: Subject::new(),
        }
    }

    /// Override the post-completion settle delay (zero disables it)
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// The resolved target
    pub fn target(&self) -> Result<&SceneTarget, &InvalidTarget> {
        self.target.as_ref()
    }
}

#[async_trait]
impl LoadUnit for SceneUnloadUnit {
    fn name(&self) -> &str {
        &self.label
    }

    fn progress(&self) -> &Subject<f32> {
        &self.progress
    }

    async fn load(&mut self, cancel: &CancellationToken) -> LoadResult<()> {
        let target = resolve(&self.label, &self.target)?;
        let operation = self.scenes.unload_scene(target, &self.progress);
        drive(cancel, target, self.settle_delay, operation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SimulatedSceneSystem;
    use serde_json::json;

    fn system() -> Arc<SimulatedSceneSystem> {
        Arc::new(SimulatedSceneSystem::new(["menu", "level_1"]).with_step_delay(Duration::from_millis(10)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_then_unload() {
        let scenes = system();
        let token = CancellationToken::new();

        let mut load = SceneLoadUnit::new(scenes.clone(), "level_1", LoadSceneMode::Additive);
        let mut progress = load.progress().subscribe();
        load.load(&token).await.unwrap();

        assert!(scenes.is_loaded("level_1"));
        assert_eq!(progress.drain().last(), Some(&1.0));

        let mut unload = SceneUnloadUnit::new(scenes.clone(), 1usize);
        unload.load(&token).await.unwrap();
        assert!(!scenes.is_loaded("level_1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_target_never_reaches_scene_system() {
        let scenes = system();
        let token = CancellationToken::new();

        let mut unit = SceneLoadUnit::from_value(scenes.clone(), &json!(1.5), LoadSceneMode::Single);
        assert_eq!(unit.name(), "SceneLoadUnit(<invalid>)");
        assert!(unit.target().is_err());

        let err = unit.load(&token).await.unwrap_err();
        assert!(err.is_invalid_target());
        assert_eq!(scenes.completed_operations(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scene_error_is_wrapped() {
        let scenes = system();
        let token = CancellationToken::new();

        let mut unit = SceneUnloadUnit::new(scenes, "menu");
        match unit.load(&token).await {
            Err(LoadError::Scene { target, source }) => {
                assert_eq!(target, "menu");
                assert_eq!(source, SceneError::NotLoaded("menu".into()));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_load() {
        let scenes = system();
        let token = CancellationToken::new();

        let mut unit = SceneLoadUnit::new(scenes.clone(), "menu", LoadSceneMode::Single);
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            canceller.cancel();
        });

        let err = unit.load(&token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!scenes.is_loaded("menu"));
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut unit = SceneLoadUnit::new(system(), "menu", LoadSceneMode::Single);
        let _rx = unit.progress().subscribe();

        unit.dispose();
        unit.dispose();
        assert_eq!(unit.progress().listener_count(), 0);
    }
}
