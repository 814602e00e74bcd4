//! Coordinator runtime: threads and channels around the facade.
//!
//! The facade is a pure state machine; this module gives it a pulse. A state
//! thread owns the facade and serializes commands, completions, and retry
//! timer fires. A worker thread owns the repository (which may block on the
//! network) and sends results back. Teardown rolls back whatever is still in
//! flight.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender, after, bounded, never, unbounded};

use crate::clock::{Clock, SystemClock};
use crate::config::CoordinatorConfig;
use crate::core::{CollectionItem, ObservableCollectionState, UpdateId};
use crate::error::RemoteError;
use crate::facade::{
    Completion, Invoked, MutationFacade, MutationIntent, Page, PageApplied, PageCall, PageRequest,
    RemoteCall,
};
use crate::ledger::Ledger;
use crate::reconcile::EntityPush;
use crate::telemetry::MetricsSink;

/// Blocking repository operations, executed on the worker thread.
pub trait Repository<T, Op>: Send + 'static {
    fn execute(&self, op: &Op) -> Result<Option<T>, RemoteError>;
    fn load_page(&self, request: &PageRequest) -> Result<Page<T>, RemoteError>;
}

/// Immediate answer to a submitted mutation.
#[derive(Clone, Debug)]
pub enum SubmitResult {
    Started(UpdateId),
    NoOp,
    Debounced,
    /// Refused before any optimistic change (duplicate active mutation,
    /// invalid input).
    Rejected(String),
}

/// Asynchronous outcomes pushed to the embedder.
#[derive(Clone, Debug)]
pub enum Notification {
    Mutation {
        update_id: UpdateId,
        completion: Completion,
    },
    Page(PageApplied),
}

/// Commands sent from the handle to the state thread.
enum Command<T, Op> {
    Mutate {
        intent: MutationIntent<T, Op>,
        respond: Sender<SubmitResult>,
    },
    Cancel(UpdateId),
    Push(EntityPush<T>),
    Refresh {
        limit: usize,
        debounce: Option<crate::facade::DebounceKey>,
    },
    LoadPage {
        offset: usize,
        limit: usize,
    },
    State {
        respond: Sender<ObservableCollectionState<T>>,
    },
    Seed(Vec<T>),
    Shutdown,
}

enum Work<Op> {
    Execute(RemoteCall<Op>),
    LoadPage(PageCall),
    Shutdown,
}

enum Done<T> {
    Mutation(UpdateId, Result<Option<T>, RemoteError>),
    Page(PageCall, Result<Page<T>, RemoteError>),
}

/// Handle to a running coordinator.
pub struct CoordinatorHandle<T, Op> {
    cmd_tx: Sender<Command<T, Op>>,
    state_thread: Option<JoinHandle<()>>,
    worker_thread: Option<JoinHandle<()>>,
}

impl<T, Op> CoordinatorHandle<T, Op>
where
    T: CollectionItem + Send + 'static,
    Op: Clone + Send + 'static,
{
    /// Submit a mutation and wait for its immediate disposition (the remote
    /// call itself completes later, via `Notification::Mutation`).
    pub fn mutate(&self, intent: MutationIntent<T, Op>) -> SubmitResult {
        let (respond, reply) = bounded(1);
        if self.cmd_tx.send(Command::Mutate { intent, respond }).is_err() {
            return SubmitResult::Rejected("coordinator stopped".to_string());
        }
        reply
            .recv()
            .unwrap_or_else(|_| SubmitResult::Rejected("coordinator stopped".to_string()))
    }

    pub fn cancel(&self, update_id: UpdateId) {
        let _ = self.cmd_tx.send(Command::Cancel(update_id));
    }

    /// Entry point for the real-time subscription callback.
    pub fn push(&self, push: EntityPush<T>) {
        let _ = self.cmd_tx.send(Command::Push(push));
    }

    pub fn refresh(&self, limit: usize, debounce: Option<crate::facade::DebounceKey>) {
        let _ = self.cmd_tx.send(Command::Refresh { limit, debounce });
    }

    pub fn load_page(&self, offset: usize, limit: usize) {
        let _ = self.cmd_tx.send(Command::LoadPage { offset, limit });
    }

    pub fn seed(&self, items: Vec<T>) {
        let _ = self.cmd_tx.send(Command::Seed(items));
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> Option<ObservableCollectionState<T>> {
        let (respond, reply) = bounded(1);
        self.cmd_tx.send(Command::State { respond }).ok()?;
        reply.recv().ok()
    }

    /// Roll back in-flight work and stop both threads.
    pub fn shutdown(mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
        if let Some(handle) = self.state_thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.worker_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Spawn a coordinator for one feature.
pub fn spawn<T, Op, R>(
    feature: &str,
    config: &CoordinatorConfig,
    repository: R,
    metrics: Arc<dyn MetricsSink>,
    notify_tx: Sender<Notification>,
) -> CoordinatorHandle<T, Op>
where
    T: CollectionItem + Send + 'static,
    Op: Clone + Send + 'static,
    R: Repository<T, Op>,
{
    spawn_with_clock(
        feature,
        config,
        repository,
        metrics,
        notify_tx,
        Arc::new(SystemClock),
    )
}

pub fn spawn_with_clock<T, Op, R>(
    feature: &str,
    config: &CoordinatorConfig,
    repository: R,
    metrics: Arc<dyn MetricsSink>,
    notify_tx: Sender<Notification>,
    clock: Arc<dyn Clock>,
) -> CoordinatorHandle<T, Op>
where
    T: CollectionItem + Send + 'static,
    Op: Clone + Send + 'static,
    R: Repository<T, Op>,
{
    let (cmd_tx, cmd_rx) = unbounded::<Command<T, Op>>();
    let (work_tx, work_rx) = unbounded::<Work<Op>>();
    let (done_tx, done_rx) = unbounded::<Done<T>>();

    let ledger = Arc::new(Ledger::new(config.ledger.retention()));
    let facade = MutationFacade::new(feature, config, ledger, clock.clone(), metrics);

    let worker_thread = std::thread::Builder::new()
        .name(format!("ladle-sync-worker-{feature}"))
        .spawn(move || worker_loop(repository, work_rx, done_tx))
        .expect("spawn worker thread");

    let state_thread = std::thread::Builder::new()
        .name(format!("ladle-sync-{feature}"))
        .spawn(move || state_loop(facade, clock, cmd_rx, work_tx, done_rx, notify_tx))
        .expect("spawn state thread");

    CoordinatorHandle {
        cmd_tx,
        state_thread: Some(state_thread),
        worker_thread: Some(worker_thread),
    }
}

fn worker_loop<T, Op, R>(repository: R, work_rx: Receiver<Work<Op>>, done_tx: Sender<Done<T>>)
where
    R: Repository<T, Op>,
{
    while let Ok(work) = work_rx.recv() {
        match work {
            Work::Execute(call) => {
                let result = repository.execute(&call.op);
                if done_tx.send(Done::Mutation(call.update_id, result)).is_err() {
                    break;
                }
            }
            Work::LoadPage(call) => {
                let result = repository.load_page(&call.request);
                if done_tx.send(Done::Page(call, result)).is_err() {
                    break;
                }
            }
            Work::Shutdown => break,
        }
    }
}

fn state_loop<T, Op>(
    mut facade: MutationFacade<T, Op>,
    clock: Arc<dyn Clock>,
    cmd_rx: Receiver<Command<T, Op>>,
    work_tx: Sender<Work<Op>>,
    done_rx: Receiver<Done<T>>,
    notify_tx: Sender<Notification>,
) where
    T: CollectionItem + Send + 'static,
    Op: Clone + Send + 'static,
{
    loop {
        // Arm the timer for the earliest scheduled retry, if any.
        let timer = match facade.next_due() {
            Some(due) => {
                let now = clock.now();
                after(Duration::from_millis(due.since(now)))
            }
            None => never(),
        };

        crossbeam::select! {
            recv(cmd_rx) -> cmd => {
                let Ok(cmd) = cmd else { break };
                match cmd {
                    Command::Mutate { intent, respond } => {
                        let result = match facade.invoke(intent) {
                            Ok(Invoked::Started(call)) => {
                                let update_id = call.update_id;
                                let _ = work_tx.send(Work::Execute(call));
                                SubmitResult::Started(update_id)
                            }
                            Ok(Invoked::NoOp) => SubmitResult::NoOp,
                            Ok(Invoked::Debounced) => SubmitResult::Debounced,
                            Err(e) => SubmitResult::Rejected(e.to_string()),
                        };
                        let _ = respond.send(result);
                    }
                    Command::Cancel(update_id) => facade.cancel(update_id),
                    Command::Push(push) => facade.absorb_push(push),
                    Command::Refresh { limit, debounce } => {
                        if let Some(call) = facade.begin_refresh(limit, debounce) {
                            let _ = work_tx.send(Work::LoadPage(call));
                        }
                    }
                    Command::LoadPage { offset, limit } => {
                        let call = facade.begin_load_page(offset, limit);
                        let _ = work_tx.send(Work::LoadPage(call));
                    }
                    Command::State { respond } => {
                        let _ = respond.send(facade.state().clone());
                    }
                    Command::Seed(items) => facade.seed(items),
                    Command::Shutdown => {
                        facade.teardown();
                        let _ = work_tx.send(Work::Shutdown);
                        break;
                    }
                }
            }
            recv(done_rx) -> done => {
                let Ok(done) = done else { break };
                match done {
                    Done::Mutation(update_id, result) => {
                        let completion = facade.complete(update_id, result);
                        if completion != Completion::Ignored {
                            let _ = notify_tx.send(Notification::Mutation { update_id, completion });
                        }
                    }
                    Done::Page(call, result) => {
                        let applied = facade.apply_page(call, result);
                        let _ = notify_tx.send(Notification::Page(applied));
                    }
                }
                facade.maintain();
            }
            recv(timer) -> _ => {
                for call in facade.due_retries(clock.now()) {
                    let _ = work_tx.send(Work::Execute(call));
                }
            }
        }
    }
}
