//! One-shot result carrier returned by `connect`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};

use crate::error::ClientError;

struct State {
    result: Option<Result<(), ClientError>>,
    waker: Option<Waker>,
}

/// Engine-side handle used to fulfil a [`Completion`].
///
/// Only the first `resolve` takes effect; later calls are ignored.
#[derive(Clone)]
pub(crate) struct CompletionHandle {
    state: Arc<Mutex<State>>,
}

impl CompletionHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn resolve(&self, result: Result<(), ClientError>) {
        let waker = {
            let mut state = self.lock();
            if state.result.is_some() {
                return;
            }
            state.result = Some(result);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// A one-shot completion resolved by the engine on the next terminal
/// connection-state transition.
///
/// Implements [`Future`], so it can be awaited on any executor; synchronous
/// callers can poll [`Completion::try_result`] instead.
pub struct Completion {
    state: Arc<Mutex<State>>,
}

impl Completion {
    pub(crate) fn new() -> (Self, CompletionHandle) {
        let state = Arc::new(Mutex::new(State { result: None, waker: None }));
        (Self { state: state.clone() }, CompletionHandle { state })
    }

    /// Creates an already-resolved completion.
    pub(crate) fn ready(result: Result<(), ClientError>) -> Self {
        let (completion, handle) = Self::new();
        handle.resolve(result);
        completion
    }

    /// Returns the result if the completion has been resolved.
    #[must_use]
    pub fn try_result(&self) -> Option<Result<(), ClientError>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).result.clone()
    }
}

impl Future for Completion {
    type Output = Result<(), ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(result) = state.result.clone() {
            Poll::Ready(result)
        } else {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}
