// SPDX-License-Identifier: AGPL-3.0-or-later

//! Task queue for executing work in the background. Tasks get queued up and eventually get
//! processed in worker pools where one worker executes the task.
//!
//! A task queue allows control over a) order of operations b) amount of work being done per time
//! c) avoiding duplicate work.
//!
//! A worker can be defined by any sort of async function which returns a result, indicating if it
//! succeeded, failed or crashed critically. Tasks are smaller work units which hold individual
//! input values used as function arguments for the worker, for example the id of a scroll whose
//! DOI still needs to be registered. Every dispatched task is moved into a FIFO queue where it
//! waits until it gets processed in a worker pool.
//!
//! Tasks can also dispatch subsequent tasks as soon as they finished successfully.
//!
//! The `Factory` struct is the main interface in this module, managing all workers and tasks. It
//! registers worker pools with the regarding worker functions, adds new tasks to queues, schedules
//! and processes them.
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use deadqueue::unlimited::Queue;
use log::{debug, error, info};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::{channel, Receiver, Sender};
use tokio::task;
use triggered::{Listener, Trigger};

/// A task holding a generic input value and the name of the worker which will process it
/// eventually.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Task<IN>(WorkerName, IN);

impl<IN> Task<IN> {
    /// Returns a new task.
    pub fn new(worker_name: &str, input: IN) -> Self {
        Self(worker_name.into(), input)
    }

    /// Returns worker name of task.
    pub fn worker_name(&self) -> &WorkerName {
        &self.0
    }

    /// Returns task input.
    pub fn input(&self) -> &IN {
        &self.1
    }
}

/// Return value of every processed task indicating if it succeeded or failed.
///
/// When a task succeeds it has the option to dispatch subsequent tasks.
pub type TaskResult<IN> = Result<Option<Vec<Task<IN>>>, TaskError>;

/// Possible return values of a failed task.
#[derive(Debug)]
pub enum TaskError {
    /// This task failed critically and will cause the whole program to panic.
    Critical(String),

    /// This task failed silently without any further effects.
    Failure(String),
}

/// Enum representing status of a task.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum TaskStatus<IN> {
    /// Task just got scheduled and waiting to be processed.
    Pending(Task<IN>),

    /// Task completed.
    Completed(Task<IN>),
}

/// Workers are identified by simple string values.
pub type WorkerName = String;

/// Every registered worker pool is managed by a `WorkerManager` which holds the task queue for
/// this registered work and an index of all current inputs in the task queue.
struct WorkerManager<IN>
where
    IN: Send + Sync + Clone + Hash + Eq + Display + 'static,
{
    /// Index of all current inputs inside the task queue organized in a hash map.
    ///
    /// This allows us to keep track of the number of tasks working on the same problem. Similar to
    /// an atomic reference counter dropping at 0, we can safely inform other layers about when we
    /// are "done" with working on the problem.
    input_index: Arc<Mutex<HashMap<IN, AtomicU64>>>,

    /// FIFO queue of all tasks for this worker pool.
    queue: Arc<Queue<QueueItem<IN>>>,
}

impl<IN> WorkerManager<IN>
where
    IN: Send + Sync + Clone + Hash + Eq + Display + 'static,
{
    /// Returns a new worker manager.
    pub fn new() -> Self {
        Self {
            input_index: Arc::new(Mutex::new(HashMap::new())),
            queue: Arc::new(Queue::new()),
        }
    }
}

/// This trait defines a generic async worker function receiving the task input and shared context
/// and returning a task result.
#[async_trait::async_trait]
pub trait Workable<IN, D>
where
    IN: Send + Sync + Clone + 'static,
    D: Send + Sync + 'static,
{
    async fn call(&self, context: D, input: IN) -> TaskResult<IN>;
}

/// Implements our `Workable` trait for a generic async function.
#[async_trait::async_trait]
impl<FN, F, IN, D> Workable<IN, D> for FN
where
    FN: Fn(D, IN) -> F + Sync,
    F: Future<Output = TaskResult<IN>> + Send + 'static,
    IN: Send + Sync + Clone + 'static,
    D: Send + Sync + 'static,
{
    async fn call(&self, context: D, input: IN) -> TaskResult<IN> {
        (self)(context, input).await
    }
}

/// Every queue consists of items which hold an unique identifier and the task input value.
#[derive(Debug)]
pub struct QueueItem<IN>
where
    IN: Send + Sync + Clone + Display + 'static,
{
    /// Unique task identifier.
    id: u64,

    /// Task input values which get passed over to the worker function.
    input: IN,
}

impl<IN> Display for QueueItem<IN>
where
    IN: Send + Sync + Clone + Display + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<QueueItem {} w. {}>", self.id, self.input)
    }
}

impl<IN> QueueItem<IN>
where
    IN: Send + Sync + Clone + Display + 'static,
{
    /// Returns a new queue item.
    pub fn new(id: u64, input: IN) -> Self {
        Self { id, input }
    }

    /// Returns generic input values of this queue item.
    pub fn input(&self) -> IN {
        self.input.clone()
    }
}

/// This factory serves as a main entry interface to dispatch, schedule and process tasks.
pub struct Factory<IN, D>
where
    IN: Send + Sync + Clone + Hash + Eq + Debug + Display + 'static,
    D: Send + Sync + Clone + 'static,
{
    /// Shared context between all tasks.
    context: D,

    /// Map of all registered worker pools.
    managers: HashMap<WorkerName, WorkerManager<IN>>,

    /// Broadcast channel to inform worker pools about new tasks.
    tx: Sender<Task<IN>>,

    /// Broadcast channel to inform callbacks about pending or completed tasks.
    tx_status: Sender<TaskStatus<IN>>,

    /// Sender of error signal.
    error_signal: Trigger,

    /// Receiver of error signal.
    ///
    /// This can be used to react to factory errors, for example by quitting the program.
    error_handle: Listener,
}

impl<IN, D> Factory<IN, D>
where
    IN: Send + Sync + Clone + Hash + Eq + Debug + Display + 'static,
    D: Send + Sync + Clone + 'static,
{
    /// Initialises a new factory.
    ///
    /// The capacity argument defines the maximum bound of incoming new tasks which get broadcasted
    /// across all worker pools which accordingly will pick up the task.
    pub fn new(context: D, capacity: usize) -> Self {
        let (tx, _) = channel(capacity);
        let (tx_status, _) = channel(capacity);
        let (error_signal, error_handle) = triggered::trigger();

        Self {
            context,
            managers: HashMap::new(),
            tx,
            tx_status,
            error_signal,
            error_handle,
        }
    }

    /// Registers a new worker pool with a dedicated worker function.
    ///
    /// As soon as a worker pool got registered it is ready to receive incoming tasks which get
    /// queued up and eventually processed by the regarding worker function.
    ///
    /// Ideally worker functions should be idempotent: meaning the function won't cause unintended
    /// effects even if called multiple times with the same arguments.
    pub fn register<W: Workable<IN, D> + Send + Sync + Copy + 'static>(
        &mut self,
        name: &str,
        pool_size: usize,
        work: W,
    ) {
        if self.managers.contains_key(name) {
            panic!("Can not create task manager twice");
        } else {
            self.managers.insert(name.into(), WorkerManager::new());
        }

        info!("Register {} worker with pool size {}", name, pool_size);

        self.spawn_dispatcher(name);
        self.spawn_workers(name, pool_size, work);
    }

    /// Queues up a new task in the regarding worker queue.
    pub fn queue(&mut self, task: Task<IN>) {
        if let Err(err) = self.tx.send(task) {
            error!("Error while broadcasting task: {}", err);
            self.error_signal.trigger();
        }
    }

    /// Returns true if there are no more tasks given for this worker pool.
    #[allow(dead_code)]
    pub fn is_empty(&self, name: &str) -> bool {
        match self.managers.get(name) {
            Some(manager) => manager.queue.is_empty(),
            None => false,
        }
    }

    /// Future which resolves as soon as factory returned a critical error.
    pub fn on_error(&self) -> Listener {
        self.error_handle.clone()
    }

    /// Subscribe to status changes of tasks.
    #[allow(dead_code)]
    pub fn on_task_status_change(&self) -> Receiver<TaskStatus<IN>> {
        self.tx_status.subscribe()
    }

    /// Spawns a task which listens to the broadcast channel for incoming new tasks which might be
    /// added to the worker queue.
    fn spawn_dispatcher(&self, name: &str) {
        // At this point we should already have a worker pool with this name
        let manager = self.managers.get(name).expect("Unknown worker name");

        let mut rx = self.tx.subscribe();
        let tx_status = self.tx_status.clone();

        // Initialise a new counter to provide unique task ids
        let counter = AtomicU64::new(0);

        // Increment references to move worker data safely into the async task
        let input_index = manager.input_index.clone();
        let name = String::from(name);
        let queue = manager.queue.clone();

        let error_signal = self.error_signal.clone();

        task::spawn(async move {
            // Inform status subscribers that we've just scheduled a new task. An error only occurs
            // when there are no subscribers, which we don't mind.
            let on_pending = |task: Task<IN>| {
                let _ = tx_status.send(TaskStatus::Pending(task));
            };

            loop {
                match rx.recv().await {
                    // A new task got announced in the broadcast channel!
                    Ok(task) => {
                        if task.worker_name() != &name {
                            continue; // This is not for us ..
                        }

                        // Check if a task with the same input values already exists in queue
                        match input_index.lock() {
                            Ok(mut index) => {
                                let index_value = index.get(&task.1);
                                if index_value.is_none() {
                                    on_pending(task.clone());
                                }

                                // Generate a unique id for this new task and add it to queue
                                let next_id = counter.fetch_add(1, Ordering::Relaxed);
                                queue.push(QueueItem::new(next_id, task.1.clone()));

                                // Keep count of how many tasks are duplicates
                                match index_value {
                                    None => {
                                        index.insert(task.1, AtomicU64::new(1));
                                    }
                                    Some(task_count) => {
                                        task_count.fetch_add(1, Ordering::Relaxed);
                                    }
                                }
                            }
                            Err(err) => {
                                error!("Error while locking input index: {}", err);
                                error_signal.trigger();
                            }
                        }
                    }
                    // The capacity of the broadcast channel is full, we're lagging behind and miss
                    // out on incoming tasks
                    Err(RecvError::Lagged(skipped_messages)) => {
                        error!("Channel lagging behind {} messages", skipped_messages);
                        error_signal.trigger();
                    }
                    // The channel got closed, nothing anymore to do here
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Spawns a worker pool of given size with a unique name and worker function.
    ///
    /// Every worker waits for a task inside the queue and processes its input values accordingly
    /// with the given worker function.
    fn spawn_workers<W: Workable<IN, D> + Send + Sync + Copy + 'static>(
        &self,
        name: &str,
        pool_size: usize,
        work: W,
    ) {
        // At this point we should already have a worker pool with this name
        let manager = self.managers.get(name).expect("Unknown worker name");

        // Spawn task for each worker inside the pool
        for _ in 0..pool_size {
            let context = self.context.clone();
            let queue = manager.queue.clone();
            let input_index = manager.input_index.clone();
            let tx = self.tx.clone();
            let name = name.to_string();

            let error_signal = self.error_signal.clone();
            let tx_status = self.tx_status.clone();

            task::spawn(async move {
                // Inform status subscribers that we just completed a task
                let on_complete = |input: IN| {
                    let _ = tx_status.send(TaskStatus::Completed(Task::new(&name, input)));
                };

                loop {
                    // Wait until there is a new task arriving in the queue
                    let item = queue.pop().await;

                    // Take this task and do work ..
                    let result = work.call(context.clone(), item.input()).await;

                    // Decrease task counter by one. If the counter hits zero we can safely remove
                    // the index, this tells us if there are still running tasks around working on
                    // the same problem.
                    match input_index.lock() {
                        Ok(mut index) => {
                            if let Some(task_count) = index.get(&item.input) {
                                task_count.fetch_sub(1, Ordering::Relaxed);

                                if task_count.load(Ordering::Relaxed) == 0 {
                                    index.remove(&item.input);
                                    on_complete(item.input());
                                }
                            }
                        }
                        Err(err) => {
                            error!(
                                "Error while locking input index in worker {} for task {}: {}",
                                name, item, err
                            );

                            error_signal.trigger();
                        }
                    }

                    // Check the result
                    match result {
                        Ok(Some(list)) => {
                            // Task succeeded and dispatches new, subsequent tasks
                            for task in list {
                                if let Err(err) = tx.send(task) {
                                    error!("Error while broadcasting task: {}", err);
                                    error_signal.trigger();
                                }
                            }
                        }
                        Err(TaskError::Critical(err)) => {
                            // Something really horrible happened, we need to crash!
                            error!(
                                "Critical error in worker {} with task {}: {}",
                                name, item, err
                            );

                            error_signal.trigger();
                        }
                        Err(TaskError::Failure(err)) => {
                            debug!(
                                "Silently failing worker {} with task {}: {}",
                                name, item, err
                            );
                        }
                        _ => (), // Task succeeded, but nothing to dispatch
                    }
                }
            });
        }
    }
}
