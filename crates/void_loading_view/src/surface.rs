//! Loading surfaces
//!
//! A loading screen has one default surface plus any number of named ones.
//! The loading type of a state selects the named surface to show.

use void_loading::LoadingState;

/// What should be visible for a given state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurfaceVisibility {
    pub default_visible: bool,
    pub active_surface: Option<String>,
}

/// Known surface names
#[derive(Debug, Clone, Default)]
pub struct SurfaceSet {
    names: Vec<String>,
}

impl SurfaceSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|known| known == name)
    }

    /// Resolve the surfaces to show for `state`
    ///
    /// An unknown loading type falls back to the default surface.
    pub fn resolve(&self, state: &LoadingState) -> SurfaceVisibility {
        if !state.is_loading() {
            return SurfaceVisibility::default();
        }

        match state.loading_type.as_deref() {
            Some(name) if self.contains(name) => SurfaceVisibility {
                default_visible: false,
                active_surface: Some(name.to_string()),
            },
            Some(name) => {
                log::warn!("Unknown loading surface '{}', using the default", name);
                SurfaceVisibility {
                    default_visible: true,
                    active_surface: None,
                }
            }
            None => SurfaceVisibility {
                default_visible: true,
                active_surface: None,
            },
        }
    }
}
