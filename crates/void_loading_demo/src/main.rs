//! Void Engine Loading Demo
//!
//! Drives the loading service through a sequential batch, a batch cancelled
//! from the loading view, and a parallel batch, against a simulated scene
//! system. Progress and view changes are logged.
//!
//! Run with: cargo run -p void_loading_demo
//!       or: RUST_LOG=debug cargo run --bin loading-demo

mod batches;
mod config;

use std::error::Error;
use std::sync::Arc;

use void_loading::{LoadingService, SimulatedSceneSystem};
use void_loading_view::{LoadingView, ViewSnapshot};

use crate::batches::Demo;
use crate::config::DemoConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let config = DemoConfig::load()?;
    if config.scenes.catalogue.len() < 2 {
        return Err("the demo needs at least two scenes in [scenes].catalogue".into());
    }

    let scenes = Arc::new(
        SimulatedSceneSystem::new(config.scenes.catalogue.clone())
            .with_steps(config.scenes.steps)
            .with_step_delay(config.scenes.step_delay()),
    );
    let service = Arc::new(LoadingService::with_config(config.loading.clone()));
    let view = LoadingView::new(config.view.clone());
    let _driver = view.attach(&service);

    let _progress_log = service.progress().subscribe_fn(|value: &f32| {
        log::info!("Progress: {:>5.1}%", value * 100.0);
    });
    let _view_log = view.snapshot().subscribe_fn(|snapshot: &ViewSnapshot| {
        log::debug!(
            "View: default={} surface={:?} cancel={} progress={:.2}",
            snapshot.default_visible,
            snapshot.active_surface,
            snapshot.cancel_visible,
            snapshot.progress
        );
    });

    let settle = config.view.debounce() * 2;
    let demo = Demo {
        service: Arc::clone(&service),
        view,
        scenes,
        catalogue: config.scenes.catalogue.clone(),
        settle_delay: config.loading.settle_delay(),
    };

    demo.sequential().await?;
    tokio::time::sleep(settle).await;

    match demo.cancelled().await {
        Err(err) if err.is_cancelled() => log::info!("Batch cancelled from the view as expected"),
        Err(err) => return Err(err.into()),
        Ok(()) => log::warn!("Batch finished before the cancel affordance showed"),
    }
    tokio::time::sleep(settle).await;

    demo.parallel().await?;
    tokio::time::sleep(settle).await;

    log::info!("Loading stats: {}", serde_json::to_string(&service.stats())?);
    Ok(())
}
