//! In-memory scene system
//!
//! Stands in for an engine scene manager: a catalogue of scene names in build
//! order, a list of loaded scenes, and progress reported in fixed steps.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LoadSceneMode, SceneError, SceneSystem, SceneTarget};
use crate::cell::Subject;

/// Scene system backed by a fixed catalogue
pub struct SimulatedSceneSystem {
    /// Scene names, index = build index
    catalogue: Vec<String>,
    /// Loaded scenes (catalogue indices) in load order
    loaded: Mutex<Vec<usize>>,
    /// Progress notifications per operation
    steps: u32,
    /// Delay between progress notifications
    step_delay: Duration,
    /// Completed operations
    operations: Mutex<u64>,
}

impl SimulatedSceneSystem {
    /// Create a scene system knowing `scenes`, in build order
    pub fn new<I, S>(scenes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            catalogue: scenes.into_iter().map(Into::into).collect(),
            loaded: Mutex::new(Vec::new()),
            steps: 4,
            step_delay: Duration::from_millis(25),
            operations: Mutex::new(0),
        }
    }

    /// Set how many progress notifications an operation emits
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    /// Set the delay between progress notifications
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Names of the loaded scenes in load order
    pub fn loaded_scenes(&self) -> Vec<String> {
        self.loaded
            .lock()
            .iter()
            .map(|&index| self.catalogue[index].clone())
            .collect()
    }

    /// Whether a scene with this name is loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded_scenes().iter().any(|loaded| loaded == name)
    }

    /// Number of load/unload operations that ran to completion
    pub fn completed_operations(&self) -> u64 {
        *self.operations.lock()
    }

    fn resolve(&self, target: &SceneTarget) -> Result<usize, SceneError> {
        match target {
            SceneTarget::ByName(name) => self
                .catalogue
                .iter()
                .position(|scene| scene == name)
                .ok_or_else(|| SceneError::NotFound(name.clone())),
            SceneTarget::ByIndex(index) if *index < self.catalogue.len() => Ok(*index),
            SceneTarget::ByIndex(index) => Err(SceneError::NotFound(format!("#{}", index))),
        }
    }

    async fn run_steps(&self, progress: &Subject<f32>) {
        for step in 1..=self.steps {
            tokio::time::sleep(self.step_delay).await;
            progress.publish(step as f32 / self.steps as f32);
        }
    }
}

#[async_trait]
impl SceneSystem for SimulatedSceneSystem {
    async fn load_scene(
        &self,
        target: &SceneTarget,
        mode: LoadSceneMode,
        progress: &Subject<f32>,
    ) -> Result<(), SceneError> {
        let index = self.resolve(target)?;
        log::debug!("Simulated load of '{}' ({:?})", self.catalogue[index], mode);

        self.run_steps(progress).await;

        let mut loaded = self.loaded.lock();
        if mode == LoadSceneMode::Single {
            loaded.clear();
        }
        loaded.push(index);
        *self.operations.lock() += 1;
        Ok(())
    }

    async fn unload_scene(
        &self,
        target: &SceneTarget,
        progress: &Subject<f32>,
    ) -> Result<(), SceneError> {
        let index = self.resolve(target)?;
        if !self.loaded.lock().contains(&index) {
            return Err(SceneError::NotLoaded(self.catalogue[index].clone()));
        }
        log::debug!("Simulated unload of '{}'", self.catalogue[index]);

        self.run_steps(progress).await;

        let mut loaded = self.loaded.lock();
        match loaded.iter().position(|&loaded_index| loaded_index == index) {
            Some(position) => {
                loaded.remove(position);
                *self.operations.lock() += 1;
                Ok(())
            }
            // Unloaded by someone else while we were stepping
            None => Err(SceneError::NotLoaded(self.catalogue[index].clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenes() -> SimulatedSceneSystem {
        SimulatedSceneSystem::new(["boot", "menu", "level_1"]).with_step_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_single_replaces_loaded_scenes() {
        let system = scenes();
        let progress = Subject::new();

        system.load_scene(&"menu".into(), LoadSceneMode::Single, &progress).await.unwrap();
        system.load_scene(&SceneTarget::ByIndex(2), LoadSceneMode::Additive, &progress).await.unwrap();
        assert_eq!(system.loaded_scenes(), vec!["menu", "level_1"]);

        system.load_scene(&"boot".into(), LoadSceneMode::Single, &progress).await.unwrap();
        assert_eq!(system.loaded_scenes(), vec!["boot"]);
        assert_eq!(system.completed_operations(), 3);
    }

    #[tokio::test]
    async fn test_progress_steps() {
        let system = scenes().with_steps(4);
        let progress = Subject::new();
        let mut rx = progress.subscribe();

        system.load_scene(&"menu".into(), LoadSceneMode::Single, &progress).await.unwrap();

        assert_eq!(rx.drain(), vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[tokio::test]
    async fn test_unknown_scene() {
        let system = scenes();
        let progress = Subject::new();

        let err = system
            .load_scene(&"credits".into(), LoadSceneMode::Single, &progress)
            .await
            .unwrap_err();
        assert_eq!(err, SceneError::NotFound("credits".into()));

        let err = system
            .load_scene(&SceneTarget::ByIndex(9), LoadSceneMode::Single, &progress)
            .await
            .unwrap_err();
        assert_eq!(err, SceneError::NotFound("#9".into()));
    }

    #[tokio::test]
    async fn test_unload() {
        let system = scenes();
        let progress = Subject::new();

        let err = system.unload_scene(&"menu".into(), &progress).await.unwrap_err();
        assert_eq!(err, SceneError::NotLoaded("menu".into()));

        system.load_scene(&"menu".into(), LoadSceneMode::Single, &progress).await.unwrap();
        system.unload_scene(&"menu".into(), &progress).await.unwrap();
        assert!(!system.is_loaded("menu"));
    }
}
