//! Awaitable completion handle for a queued task.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TaskError;
use crate::tasks::signal::{downcast_step, Step};

/// Completion handle returned by
/// [`TaskScheduler::queue_task`](crate::TaskScheduler::queue_task).
///
/// Resolves with the body's return value, or rejects with the body's error,
/// the removal error from `remove_tasks`, or [`TaskError::Shutdown`] if the
/// scheduler was dropped before the task settled.
///
/// Dropping the handle detaches it; the task keeps running.
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Step>,
    _result: PhantomData<fn() -> T>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Step>) -> Self {
        Self { rx, _result: PhantomData }
    }
}

impl<T: Send + 'static> Future for TaskHandle<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(step)) => Poll::Ready(step.and_then(downcast_step::<T>)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(TaskError::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}
