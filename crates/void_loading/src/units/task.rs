//! Units wrapping arbitrary futures

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::cell::Subject;
use crate::error::{BoxError, LoadError, LoadResult};
use crate::unit::{LoadUnit, LoadUnitResult};

/// Wraps a pre-existing asynchronous computation
///
/// The wrapped future is raced against the batch's cancellation token. If it
/// produces a value, the value is available through [`LoadUnitResult::result`]
/// after a successful load. Progress is best-effort: the computation may
/// report through [`reporter`](Self::reporter), and nothing waits for anyone
/// to observe it.
pub struct TaskUnit<T> {
    task: Option<BoxFuture<'static, Result<T, BoxError>>>,
    result: Option<T>,
    progress: Subject<f32>,
    label: String,
}

impl<T: Send + 'static> TaskUnit<T> {
    /// Wrap an infallible future
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::from_task(future.map(Ok).boxed())
    }

    /// Wrap a fallible future; its error becomes [`LoadError::UnitFailed`]
    pub fn fallible<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_task(future.map(|result| result.map_err(Into::into)).boxed())
    }

    /// Wrap a future built around the unit's progress reporter
    pub fn reporting<M, F>(make: M) -> Self
    where
        M: FnOnce(Subject<f32>) -> F,
        F: Future<Output = T> + Send + 'static,
    {
        let progress = Subject::new();
        let mut unit = Self::new(make(progress.clone()));
        unit.progress = progress;
        unit
    }

    fn from_task(task: BoxFuture<'static, Result<T, BoxError>>) -> Self {
        Self {
            task: Some(task),
            result: None,
            progress: Subject::new(),
            label: format!("TaskUnit<{}>", short_type_name::<T>()),
        }
    }

    /// Name shown in log lines
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Handle the wrapped computation can report progress through
    pub fn reporter(&self) -> Subject<f32> {
        self.progress.clone()
    }

    /// Take the produced value out of the unit
    pub fn take_result(&mut self) -> Option<T> {
        self.result.take()
    }

    /// Consume the unit, returning the produced value
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// Whether the wrapped computation has been consumed
    pub fn has_run(&self) -> bool {
        self.task.is_none()
    }
}

fn short_type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    match name.find('<') {
        Some(generic_start) => name[..generic_start].rsplit("::").next().unwrap_or(name),
        None => name.rsplit("::").next().unwrap_or(name),
    }
}

#[async_trait]
impl<T: Send + 'static> LoadUnit for TaskUnit<T> {
    fn name(&self) -> &str {
        &self.label
    }

    fn progress(&self) -> &Subject<f32> {
        &self.progress
    }

    async fn load(&mut self, cancel: &CancellationToken) -> LoadResult<()> {
        let task = self
            .task
            .take()
            .ok_or_else(|| LoadError::AlreadyRun(self.label.clone()))?;

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            result = task => result.map_err(|source| LoadError::UnitFailed {
                unit: self.label.clone(),
                source,
            })?,
        };

        self.result = Some(value);
        Ok(())
    }

    fn dispose(&mut self) {
        self.task = None;
        self.progress.clear();
    }
}

impl<T: Send + 'static> LoadUnitResult<T> for TaskUnit<T> {
    fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }
}

/// Turn any future into a [`TaskUnit`]
pub trait IntoLoadUnit: Future + Send + Sized + 'static {
    /// Wrap this future as a load unit
    fn into_load_unit(self) -> TaskUnit<Self::Output>
    where
        Self::Output: Send + 'static,
    {
        TaskUnit::new(self)
    }
}

impl<F: Future + Send + 'static> IntoLoadUnit for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_result_is_exposed() {
        let token = CancellationToken::new();
        let mut unit = async { 42u32 }.into_load_unit();

        assert!(unit.result().is_none());
        unit.load(&token).await.unwrap();

        assert_eq!(unit.result(), Some(&42));
        assert_eq!(unit.take_result(), Some(42));
    }

    #[tokio::test]
    async fn test_failure_is_wrapped() {
        let token = CancellationToken::new();
        let mut unit = TaskUnit::fallible(async {
            Err::<(), _>(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire"))
        })
        .with_label("save-warmup");

        match unit.load(&token).await {
            Err(LoadError::UnitFailed { unit, source }) => {
                assert_eq!(unit, "save-warmup");
                assert_eq!(source.to_string(), "disk on fire");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let token = CancellationToken::new();
        let mut unit = TaskUnit::new(async {});

        unit.load(&token).await.unwrap();
        assert!(unit.has_run());
        assert!(matches!(unit.load(&token).await, Err(LoadError::AlreadyRun(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_forwarded() {
        let token = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let finished_clone = Arc::clone(&finished);
        let mut unit = TaskUnit::new(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            finished_clone.store(true, Ordering::SeqCst);
        });

        token.cancel();
        assert!(unit.load(&token).await.unwrap_err().is_cancelled());
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unobserved_progress_does_not_block() {
        let token = CancellationToken::new();
        let mut unit = TaskUnit::new(async {});
        let reporter = unit.reporter();

        reporter.publish(0.5);
        unit.load(&token).await.unwrap();
    }

    #[tokio::test]
    async fn test_reporting_unit_publishes_through_its_subject() {
        let token = CancellationToken::new();
        let mut unit = TaskUnit::reporting(|progress| async move {
            progress.publish(0.5);
            progress.publish(1.0);
            "warm"
        });
        let mut rx = unit.progress().subscribe();

        unit.load(&token).await.unwrap();

        assert_eq!(rx.drain(), vec![0.5, 1.0]);
        assert_eq!(unit.into_result(), Some("warm"));
    }

    #[test]
    fn test_default_label() {
        assert_eq!(TaskUnit::new(async { 1u8 }).name(), "TaskUnit<u8>");
        assert_eq!(TaskUnit::new(async { vec![1u8] }).name(), "TaskUnit<Vec>");
    }
}
