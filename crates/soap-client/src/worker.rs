//! Worker behind the blocking call path.
//!
//! Blocking callers enqueue a [`CallTask`] and wait on its completion signal.
//! A single dedicated thread drains the FIFO queue one task at a time, so at
//! most one synchronous call is in flight per client and completions follow
//! submission order. The thread owns a current-thread runtime that drives the
//! same asynchronous path `async_call` uses.
//!
//! The completion signal is a plain condition variable, so any thread may
//! block on it, including `spawn_blocking` threads of another runtime.

use parking_lot::{Condvar, Mutex};
use soap_envelope::Message;
use std::sync::Arc;
use std::thread;
use tokio::runtime::{self, Handle};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::call_id::CallId;
use crate::dispatcher::Dispatcher;
use crate::error::CallError;

const WORKER_THREAD_NAME: &str = "soap-sync-worker";

type CallResult = Result<Message, CallError>;

/// Result slot shared by one task and its blocked caller.
#[derive(Default)]
struct Signal {
    slot: Mutex<Option<CallResult>>,
    ready: Condvar,
}

impl Signal {
    fn deliver(&self, result: CallResult) {
        *self.slot.lock() = Some(result);
        self.ready.notify_one();
    }
}

/// Create the single-use signal pair for one blocking call.
pub(crate) fn completion_pair() -> (Completion, CompletionWaiter) {
    let signal = Arc::new(Signal::default());
    (Completion(Some(Arc::clone(&signal))), CompletionWaiter(signal))
}

/// Sending half of the completion signal. Released exactly once: by
/// [`Completion::complete`], or with `WorkerUnavailable` when dropped.
pub(crate) struct Completion(Option<Arc<Signal>>);

impl Completion {
    pub(crate) fn complete(mut self, result: CallResult) {
        if let Some(signal) = self.0.take() {
            signal.deliver(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(signal) = self.0.take() {
            debug!("Synchronous call dropped before completion");
            signal.deliver(Err(CallError::WorkerUnavailable(
                "task dropped before completion".into(),
            )));
        }
    }
}

/// Receiving half held by the blocked caller.
pub(crate) struct CompletionWaiter(Arc<Signal>);

impl CompletionWaiter {
    /// Block the calling thread until the task has been completed.
    pub(crate) fn wait(self) -> CallResult {
        let mut slot = self.0.slot.lock();
        loop {
            if let Some(result) = slot.take() {
                return result;
            }
            self.0.ready.wait(&mut slot);
        }
    }
}

/// One queued synchronous call.
pub(crate) struct CallTask {
    pub(crate) id: CallId,
    pub(crate) method: String,
    pub(crate) message: Message,
    pub(crate) action: Option<String>,
    pub(crate) completion: Completion,
}

struct WorkerThread {
    queue: mpsc::UnboundedSender<CallTask>,
    runtime: Handle,
    thread: thread::JoinHandle<()>,
}

impl WorkerThread {
    fn spawn(dispatcher: Arc<Dispatcher>) -> Result<Self, CallError> {
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CallError::WorkerUnavailable(e.to_string()))?;
        let handle = runtime.handle().clone();
        let (queue, rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.into())
            .spawn(move || {
                runtime.block_on(run(rx, dispatcher));
                debug!("Synchronous call worker stopped");
            })
            .map_err(|e| CallError::WorkerUnavailable(e.to_string()))?;

        info!("Started synchronous call worker");
        Ok(Self {
            queue,
            runtime: handle,
            thread,
        })
    }

    fn is_alive(&self) -> bool {
        !self.queue.is_closed()
    }
}

/// Drain the queue strictly in order; the next task starts only after the
/// previous one has completed.
async fn run(mut queue: mpsc::UnboundedReceiver<CallTask>, dispatcher: Arc<Dispatcher>) {
    let runtime = Handle::current();
    while let Some(task) = queue.recv().await {
        let CallTask {
            id,
            method,
            message,
            action,
            completion,
        } = task;
        debug!(call_id = %id, method = %method, "Processing synchronous call");

        let pending = dispatcher.start_call(&runtime, id, &method, &message, action.as_deref());
        completion.complete(pending.await);
    }
}

/// Lazily started owner of the worker thread.
pub(crate) struct SyncWorker {
    dispatcher: Arc<Dispatcher>,
    state: Mutex<Option<WorkerThread>>,
}

impl SyncWorker {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            state: Mutex::new(None),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.state.lock().as_ref().is_some_and(WorkerThread::is_alive)
    }

    /// Runtime of the worker thread, starting the worker if needed.
    pub(crate) fn runtime_handle(&self) -> Result<Handle, CallError> {
        let mut state = self.state.lock();
        let worker = self.ensure_started(&mut state)?;
        Ok(worker.runtime.clone())
    }

    pub(crate) fn enqueue(&self, task: CallTask) -> Result<(), CallError> {
        let mut state = self.state.lock();
        let worker = self.ensure_started(&mut state)?;
        worker
            .queue
            .send(task)
            .map_err(|_| CallError::WorkerUnavailable("call queue is closed".into()))
    }

    fn ensure_started<'a>(
        &self,
        state: &'a mut Option<WorkerThread>,
    ) -> Result<&'a WorkerThread, CallError> {
        if !state.as_ref().is_some_and(WorkerThread::is_alive) {
            *state = Some(WorkerThread::spawn(Arc::clone(&self.dispatcher))?);
        }
        state
            .as_ref()
            .ok_or_else(|| CallError::WorkerUnavailable("worker not started".into()))
    }

    /// Close the queue and wait for the worker to finish queued tasks.
    pub(crate) fn stop(&self) {
        let Some(worker) = self.state.lock().take() else {
            return;
        };
        drop(worker.queue);

        if worker.thread.thread().id() == thread::current().id() {
            // Stopping from inside the worker; it exits once this task returns.
            return;
        }
        if worker.thread.join().is_err() {
            error!("Synchronous call worker panicked");
        }
    }
}

impl Drop for SyncWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
