//! Headless loading view
//!
//! Mirrors what a loading screen would show without rendering anything. The
//! driver task reacts to the service's debounced state, picks the surfaces to
//! show and reveals the cancel affordance once the state's cancel delay has
//! passed. Cancel requests flow back to the service through a [`Subject`].

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use void_loading::{LoadingService, LoadingState, ObservableCell, Receiver, Subject};

use crate::config::ViewConfig;
use crate::debounce::Debouncer;
use crate::surface::SurfaceSet;

/// Everything a renderer would need to draw the loading screen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewSnapshot {
    pub default_visible: bool,
    pub active_surface: Option<String>,
    pub cancel_visible: bool,
    pub progress: f32,
}

impl ViewSnapshot {
    /// Whether any loading surface is shown
    pub fn is_shown(&self) -> bool {
        self.default_visible || self.active_surface.is_some()
    }
}

pub struct LoadingView {
    config: ViewConfig,
    surfaces: SurfaceSet,
    cancel_requests: Subject<()>,
    show_cancel_requests: Subject<()>,
    snapshot: ObservableCell<ViewSnapshot>,
}

impl LoadingView {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            surfaces: SurfaceSet::new(config.surfaces.iter().cloned()),
            config,
            cancel_requests: Subject::new(),
            show_cancel_requests: Subject::new(),
            snapshot: ObservableCell::new(ViewSnapshot::default()),
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn surfaces(&self) -> &SurfaceSet {
        &self.surfaces
    }

    /// Current snapshot plus change notifications
    pub fn snapshot(&self) -> &ObservableCell<ViewSnapshot> {
        &self.snapshot
    }

    pub fn current(&self) -> ViewSnapshot {
        self.snapshot.get()
    }

    /// Signal fired for every cancel request
    pub fn cancel_requests(&self) -> &Subject<()> {
        &self.cancel_requests
    }

    /// The user asked to cancel the current loading
    pub fn request_cancel(&self) {
        log::info!("Loading view requested cancel");
        self.cancel_requests.publish(());
    }

    /// Show the cancel affordance now, regardless of the state's delay
    ///
    /// Handled by the attached driver, which owns every snapshot write. The
    /// next state change hides it again.
    pub fn show_cancel(&self) {
        self.show_cancel_requests.publish(());
    }

    /// Bind to `service` and start driving the snapshot
    ///
    /// Cancel requests stay bound to the service after the handle is dropped;
    /// use [`LoadingService::clear_cancel_bindings`] to detach them.
    pub fn attach(&self, service: &LoadingService) -> ViewHandle {
        service.bind_cancel_requests(&self.cancel_requests);

        let states = service.state().subscribe();
        let progress = service.progress().subscribe();
        let show_cancel = self.show_cancel_requests.subscribe();
        let driver = Driver {
            debouncer: Debouncer::new(self.config.debounce()),
            surfaces: self.surfaces.clone(),
            snapshot: self.snapshot.clone(),
            cancel_deadline: None,
        };

        log::info!(
            "Loading view attached: {} surface(s), debounce {:?}",
            self.surfaces.names().len(),
            self.config.debounce()
        );
        ViewHandle {
            task: tokio::spawn(driver.run(states, progress, show_cancel, self.config.tick())),
        }
    }
}

/// Running view driver; stops the driver when dropped
#[must_use = "dropping a ViewHandle stops the view driver"]
pub struct ViewHandle {
    task: JoinHandle<()>,
}

impl ViewHandle {
    pub fn stop(self) {
        drop(self);
    }

    /// Whether the driver has exited (the service is gone)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Driver {
    debouncer: Debouncer<LoadingState>,
    surfaces: SurfaceSet,
    snapshot: ObservableCell<ViewSnapshot>,
    cancel_deadline: Option<Instant>,
}

impl Driver {
    async fn run(
        mut self,
        mut states: Receiver<LoadingState>,
        mut progress: Receiver<f32>,
        mut show_cancel: Receiver<()>,
        tick: Duration,
    ) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut progress_open = true;
        let mut show_open = true;

        loop {
            tokio::select! {
                state = states.recv() => match state {
                    Some(state) => self.debouncer.push(state, Instant::now()),
                    None => break,
                },
                value = progress.recv(), if progress_open => match value {
                    Some(value) => self.update(|snapshot| snapshot.progress = value),
                    None => progress_open = false,
                },
                request = show_cancel.recv(), if show_open => match request {
                    Some(()) => {
                        self.cancel_deadline = None;
                        self.update(|snapshot| snapshot.cancel_visible = true);
                    }
                    None => show_open = false,
                },
                _ = ticker.tick() => self.on_tick(Instant::now()),
            }
        }
        log::debug!("Loading view driver stopped");
    }

    fn on_tick(&mut self, now: Instant) {
        if let Some(state) = self.debouncer.poll(now) {
            self.apply(&state, now);
        }

        if let Some(deadline) = self.cancel_deadline {
            if now >= deadline {
                self.cancel_deadline = None;
                self.update(|snapshot| snapshot.cancel_visible = true);
            }
        }
    }

    fn apply(&mut self, state: &LoadingState, now: Instant) {
        let visibility = self.surfaces.resolve(state);
        self.cancel_deadline = match state.cancel_reveal {
            Some(delay) if state.is_loading() => Some(now + delay),
            _ => None,
        };

        log::debug!("Loading view state: {:?}", state.phase);
        self.update(|snapshot| {
            snapshot.default_visible = visibility.default_visible;
            snapshot.active_surface = visibility.active_surface;
            snapshot.cancel_visible = false;
        });
    }

    fn update(&self, change: impl FnOnce(&mut ViewSnapshot)) {
        let mut next = self.snapshot.get();
        change(&mut next);
        self.snapshot.set_if_changed(next);
    }
}
