//! In-memory transport fake (testing only)
//!
//! `MemoryTransport` answers each operation from a script and records every
//! call, so resource logic and convergence can be exercised without an AEM
//! instance. `RecordingObserver` keeps convergence progress events.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::convergence::{AttemptEvent, ConvergenceObserver};
use crate::error::TransportError;
use crate::operation::Operation;
use crate::params::CallParams;
use crate::response::Response;
use crate::transport::Transport;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Response),
    Fail(String),
}

#[derive(Debug, Default)]
struct Script {
    /// One-shot replies, consumed in order.
    queued: VecDeque<Scripted>,
    /// Reply used once the queue is drained.
    fallback: Option<Scripted>,
}

/// Scripted transport backed by per-operation reply queues.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    scripts: Mutex<HashMap<Operation, Script>>,
    calls: Mutex<Vec<(Operation, CallParams)>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call to `operation` with `response` (after any queued replies).
    pub fn respond(&self, operation: Operation, response: Response) {
        self.script(operation, |s| s.fallback = Some(Scripted::Reply(response)));
    }

    /// Answer the next call to `operation` with `response`.
    pub fn enqueue(&self, operation: Operation, response: Response) {
        self.script(operation, |s| s.queued.push_back(Scripted::Reply(response)));
    }

    /// Fail the next call to `operation` with a transport error.
    pub fn enqueue_failure(&self, operation: Operation, reason: &str) {
        let reason = reason.to_string();
        self.script(operation, |s| s.queued.push_back(Scripted::Fail(reason)));
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(Operation, CallParams)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    fn script(&self, operation: Operation, f: impl FnOnce(&mut Script)) {
        let mut scripts = self.scripts.lock().unwrap();
        f(scripts.entry(operation).or_default());
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn call(
        &self,
        operation: Operation,
        params: &CallParams,
    ) -> Result<Response, TransportError> {
        self.calls.lock().unwrap().push((operation, params.clone()));

        let next = {
            let mut scripts = self.scripts.lock().unwrap();
            scripts.get_mut(&operation).and_then(|script| {
                script
                    .queued
                    .pop_front()
                    .or_else(|| script.fallback.clone())
            })
        };

        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(reason)) => Err(TransportError::Http(reason)),
            None => Err(TransportError::UnexpectedOperation(operation.to_string())),
        }
    }
}

/// Convergence observer that keeps every event.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<AttemptEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConvergenceObserver for RecordingObserver {
    fn on_attempt(&self, event: &AttemptEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
