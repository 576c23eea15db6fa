//! Demo batches
//!
//! Each batch exercises one path through the loading service against the
//! simulated scene system.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use void_loading::prelude::*;
use void_loading_view::LoadingView;

/// Shared state of the demo run
pub struct Demo {
    pub service: Arc<LoadingService>,
    pub view: LoadingView,
    pub scenes: Arc<SimulatedSceneSystem>,
    pub catalogue: Vec<String>,
    pub settle_delay: Duration,
}

impl Demo {
    fn load(&self, target: &serde_json::Value, mode: LoadSceneMode) -> SceneLoadUnit {
        SceneLoadUnit::from_value(self.scenes.clone(), target, mode).with_settle_delay(self.settle_delay)
    }

    fn unload(&self, target: impl Into<SceneTarget>) -> SceneUnloadUnit {
        SceneUnloadUnit::new(self.scenes.clone(), target).with_settle_delay(self.settle_delay)
    }

    /// Boot scene, first level by index, then a warmup task producing a value
    pub async fn sequential(&self) -> LoadResult<()> {
        log::info!("=== Sequential batch ===");

        let mut boot = self.load(&serde_json::Value::from(self.catalogue[0].as_str()), LoadSceneMode::Single);
        let mut level = self.load(&json!(1), LoadSceneMode::Additive);
        let mut warmup = TaskUnit::reporting(|progress| async move {
            let mut compiled = 0u32;
            for step in 1..=4u32 {
                tokio::time::sleep(Duration::from_millis(50)).await;
                compiled += step * 16;
                progress.publish(step as f32 / 4.0);
            }
            compiled
        })
        .with_label("ShaderWarmup");

        self.service
            .begin_loading(
                LoadingOptions::default()
                    .with_cooldown_secs(0.5)
                    .with_cancel_reveal_secs(2.0),
                &mut [&mut boot, &mut level, &mut warmup],
            )
            .await?;

        log::info!(
            "Loaded scenes: {:?}, warmed {} shaders",
            self.scenes.loaded_scenes(),
            warmup.take_result().unwrap_or_default()
        );
        Ok(())
    }

    /// Long batch cancelled through the view once its cancel affordance shows
    pub async fn cancelled(&self) -> LoadResult<()> {
        log::info!("=== Cancelled batch ===");

        let mut units: Vec<SceneLoadUnit> = self
            .catalogue
            .iter()
            .skip(2)
            .map(|name| self.load(&json!(name), LoadSceneMode::Additive))
            .collect();
        let mut stall = TaskUnit::new(tokio::time::sleep(Duration::from_secs(60))).with_label("Stall");

        let mut batch: Vec<&mut dyn LoadUnit> = units
            .iter_mut()
            .map(|unit| unit as &mut dyn LoadUnit)
            .collect();
        batch.push(&mut stall);

        let mut reveal = self.view.snapshot().subscribe();
        let options = LoadingOptions::typed("tips").with_cancel_reveal_secs(1.0);
        let run = self.service.begin_loading(options, &mut batch);
        tokio::pin!(run);

        let mut requested = false;
        loop {
            tokio::select! {
                outcome = &mut run => return outcome,
                snapshot = reveal.recv() => match snapshot {
                    Some(snapshot) if snapshot.cancel_visible && !requested => {
                        requested = true;
                        self.view.request_cancel();
                    }
                    Some(_) => {}
                    None => return run.await,
                },
            }
        }
    }

    /// Unload everything that is loaded, in parallel
    pub async fn parallel(&self) -> LoadResult<()> {
        log::info!("=== Parallel batch ===");

        let mut units: Vec<SceneUnloadUnit> = self
            .scenes
            .loaded_scenes()
            .into_iter()
            .map(|name| self.unload(name))
            .collect();
        let mut batch: Vec<&mut dyn LoadUnit> = units
            .iter_mut()
            .map(|unit| unit as &mut dyn LoadUnit)
            .collect();

        self.service.begin_loading_parallel(&mut batch).await
    }
}
