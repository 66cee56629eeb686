//! Composition transactions.
//!
//! Every navigation opens a transaction on its top-level composition. Each
//! composition step (including nested ones triggered by child routers)
//! increments the outstanding count on entry and decrements on exit, success
//! or failure alike. When the count crosses back to zero the registered
//! completion callbacks run, most recently registered first, so the deepest
//! compositions hear about completion before their ancestors.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use log::debug;

type CompletionCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct TransactionState {
    outstanding: usize,
    callbacks: Vec<CompletionCallback>,
}

/// One navigation's composition bookkeeping. Cheap to clone via `Arc`.
#[derive(Default)]
pub struct Transaction {
    state: Mutex<TransactionState>,
}

impl Transaction {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Enters a composition step.
    pub fn begin(&self) {
        let mut state = self.state.lock().unwrap();
        state.outstanding += 1;
        debug!("Composition depth now {}", state.outstanding);
    }

    /// Registers a callback for the next zero crossing. Registering while
    /// the callbacks are draining defers to the following crossing.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() -> BoxFuture<'static, ()> + Send + 'static,
    {
        self.state.lock().unwrap().callbacks.push(Box::new(callback));
    }

    pub fn outstanding(&self) -> usize {
        self.state.lock().unwrap().outstanding
    }

    /// Leaves a composition step. On the transition from one outstanding
    /// step to zero, drains the callbacks in reverse registration order.
    /// Callbacks registered during the drain wait for the next crossing.
    pub async fn end(&self) {
        let drained = {
            let mut state = self.state.lock().unwrap();
            state.outstanding = state.outstanding.saturating_sub(1);
            if state.outstanding == 0 && !state.callbacks.is_empty() {
                Some(std::mem::take(&mut state.callbacks))
            } else {
                None
            }
        };

        if let Some(callbacks) = drained {
            debug!("Composition complete, {} callback(s)", callbacks.len());
            for callback in callbacks.into_iter().rev() {
                callback().await;
            }
        }
    }
}
