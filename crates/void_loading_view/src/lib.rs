//! # Void Loading View
//!
//! Headless presentation binding for the loading service.
//!
//! Computes what a loading screen should show (default or typed surface,
//! cancel affordance, progress) from the service's debounced state, and feeds
//! cancel requests back into the service. Rendering is left to whoever
//! observes the [`ViewSnapshot`].
//!
//! ## Usage
//!
//! ```ignore
//! let service = LoadingService::new();
//! let view = LoadingView::new(ViewConfig::default().with_surfaces(["tips"]));
//! let _driver = view.attach(&service);
//!
//! let _redraw = view.snapshot().subscribe_fn(|snapshot| renderer.draw(snapshot));
//! cancel_button.on_click(move || view.request_cancel());
//! ```

pub mod config;
pub mod debounce;
pub mod surface;
pub mod view;

pub use config::ViewConfig;
pub use debounce::Debouncer;
pub use surface::{SurfaceSet, SurfaceVisibility};
pub use view::{LoadingView, ViewHandle, ViewSnapshot};
