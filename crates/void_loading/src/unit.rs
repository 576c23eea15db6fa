//! Load unit contract
//!
//! A load unit is one cancellable, progress-reporting piece of asynchronous
//! work. Batches are built from units; the loading service only ever sees
//! them through this trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cell::Subject;
use crate::error::{LoadError, LoadResult};

/// Post-completion delay applied by scene units unless configured otherwise
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(16);

/// One unit of loading work
///
/// Progress is published on [`progress`](Self::progress) in `[0, 1]` while
/// [`load`](Self::load) runs, strictly before it returns. Nothing is replayed,
/// so observers attach before calling `load`.
#[async_trait]
pub trait LoadUnit: Send {
    /// Label used in log lines
    fn name(&self) -> &str;

    /// Raw progress of this unit
    fn progress(&self) -> &Subject<f32>;

    /// Run the unit to completion, failure or cancellation
    ///
    /// Implementations must observe `cancel` at their own await points and
    /// return [`LoadError::Cancelled`] when it fires.
    async fn load(&mut self, cancel: &CancellationToken) -> LoadResult<()>;

    /// Release listeners and anything else the unit holds. Idempotent.
    fn dispose(&mut self) {
        self.progress().clear();
    }
}

/// A load unit that produces a value
pub trait LoadUnitResult<T>: LoadUnit {
    /// The value, once the unit has completed successfully
    fn result(&self) -> Option<&T>;
}

/// Wait out a post-completion delay unless cancelled first
///
/// Scene operations report completion a tick before the engine has actually
/// activated the scene; units pad their completion with this delay.
pub(crate) async fn settle(cancel: &CancellationToken, delay: Duration) -> LoadResult<()> {
    if delay.is_zero() {
        return Ok(());
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(LoadError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
