//! Task orchestrator: observable state plus serialized background writes.
//!
//! # Responsibility
//! - Hold the project list observable acquired by `init()`.
//! - Forward task observables from the task repository.
//! - Apply create/update/delete on one dedicated writer thread.
//! - Join tasks with their projects and order them for display.
//!
//! # Invariants
//! - Writes are applied in submission order and never interleave.
//! - `init()` acquires the project observable at most once.
//! - Write failures are logged by the worker and delivered to the
//!   [`WriteTicket`] holder; dropping the ticket keeps fire-and-forget
//!   semantics.
//! - Dropping the orchestrator drains queued writes, then joins the worker.

use crate::model::project::{Project, ProjectId, ProjectIndex};
use crate::model::sort::{sort_tasks, TaskOrder};
use crate::model::task::{Task, TaskId};
use crate::repo::project_repo::ProjectRepository;
use crate::repo::task_repo::TaskRepository;
use crate::store::{Observable, StoreError, StoreResult};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const WRITER_THREAD_NAME: &str = "todoc-writer";

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Orchestrator-level error.
#[derive(Debug)]
pub enum OrchestratorError {
    /// `get_all_projects()` was called before `init()`.
    NotInitialized,
    /// The writer thread could not be started.
    WorkerSpawn(std::io::Error),
    /// The writer thread stopped before answering.
    WorkerGone,
    Store(StoreError),
}

impl Display for OrchestratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "orchestrator used before init()"),
            Self::WorkerSpawn(err) => write!(f, "failed to start writer thread: {err}"),
            Self::WorkerGone => write!(f, "writer thread is no longer running"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::WorkerSpawn(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::NotInitialized | Self::WorkerGone => None,
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

enum WriteCommand {
    Create {
        task: Task,
        reply: SyncSender<StoreResult<()>>,
    },
    Update {
        task: Task,
        reply: SyncSender<StoreResult<usize>>,
    },
    Delete {
        id: TaskId,
        reply: SyncSender<StoreResult<usize>>,
    },
    Flush {
        reply: SyncSender<StoreResult<()>>,
    },
}

/// Handle to the result of one queued write.
///
/// Dropping it does not cancel the write.
#[must_use = "drop the ticket explicitly for fire-and-forget writes"]
#[derive(Debug)]
pub struct WriteTicket<T> {
    reply: Receiver<StoreResult<T>>,
}

impl<T> WriteTicket<T> {
    /// Blocks until the worker has applied (or rejected) the write.
    pub fn wait(self) -> OrchestratorResult<T> {
        match self.reply.recv() {
            Ok(result) => result.map_err(OrchestratorError::from),
            Err(_) => Err(OrchestratorError::WorkerGone),
        }
    }
}

/// A task joined with its project, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub task: Task,
    /// `None` when the snapshot used for the join has no such project.
    pub project: Option<Project>,
}

/// Connects repositories to the presentation layer.
pub struct TaskOrchestrator<P, T>
where
    P: ProjectRepository,
    T: TaskRepository + 'static,
{
    project_repo: P,
    task_repo: Arc<T>,
    projects: OnceCell<Observable<Vec<Project>>>,
    sender: Option<Sender<WriteCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl<P, T> TaskOrchestrator<P, T>
where
    P: ProjectRepository,
    T: TaskRepository + 'static,
{
    /// Creates the orchestrator and starts its writer thread.
    pub fn new(project_repo: P, task_repo: T) -> OrchestratorResult<Self> {
        let task_repo = Arc::new(task_repo);
        let (sender, receiver) = mpsc::channel::<WriteCommand>();
        let worker_repo = Arc::clone(&task_repo);

        let worker = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || run_writer(worker_repo.as_ref(), receiver))
            .map_err(OrchestratorError::WorkerSpawn)?;

        Ok(Self {
            project_repo,
            task_repo,
            projects: OnceCell::new(),
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Acquires the project list observable. Later calls do nothing.
    pub fn init(&self) {
        self.projects.get_or_init(|| {
            info!("event=orchestrator_init module=service status=ok");
            self.project_repo.get_all_projects()
        });
    }

    /// The project observable acquired by [`Self::init`].
    ///
    /// # Errors
    /// - [`OrchestratorError::NotInitialized`] before `init()`.
    pub fn get_all_projects(&self) -> OrchestratorResult<Observable<Vec<Project>>> {
        self.projects
            .get()
            .cloned()
            .ok_or(OrchestratorError::NotInitialized)
    }

    pub fn get_all_tasks(&self) -> Observable<Vec<Task>> {
        self.task_repo.get_all_tasks()
    }

    pub fn get_tasks(&self, project_id: ProjectId) -> Observable<Vec<Task>> {
        self.task_repo.get_tasks(project_id)
    }

    /// Queues insertion of `task` and returns immediately.
    pub fn create_task(&self, task: Task) -> WriteTicket<()> {
        self.submit(|reply| WriteCommand::Create { task, reply })
    }

    /// Queues a full replace of `task` and returns immediately.
    pub fn update_task(&self, task: Task) -> WriteTicket<usize> {
        self.submit(|reply| WriteCommand::Update { task, reply })
    }

    /// Queues deletion of task `id` and returns immediately.
    pub fn delete_task(&self, id: TaskId) -> WriteTicket<usize> {
        self.submit(|reply| WriteCommand::Delete { id, reply })
    }

    /// Blocks until every write submitted before this call has been applied.
    pub fn flush(&self) -> OrchestratorResult<()> {
        self.submit(|reply| WriteCommand::Flush { reply }).wait()
    }

    /// Id-keyed lookup over the latest project snapshot.
    ///
    /// Reads a fresh snapshot when nothing has been delivered to subscribers.
    pub fn project_index(&self) -> OrchestratorResult<ProjectIndex> {
        let projects = self.get_all_projects()?;
        let index = match projects.latest() {
            Some(snapshot) => ProjectIndex::from_projects(snapshot.iter()),
            None => ProjectIndex::from_projects(&projects.current()?),
        };
        Ok(index)
    }

    fn submit<R>(
        &self,
        build: impl FnOnce(SyncSender<StoreResult<R>>) -> WriteCommand,
    ) -> WriteTicket<R> {
        let (reply, receiver) = mpsc::sync_channel(1);
        let command = build(reply);

        let sent = self
            .sender
            .as_ref()
            .is_some_and(|sender| sender.send(command).is_ok());
        if !sent {
            error!("event=write_submit module=service status=error error_code=worker_gone");
        }
        WriteTicket { reply: receiver }
    }
}

impl<P, T> Drop for TaskOrchestrator<P, T>
where
    P: ProjectRepository,
    T: TaskRepository + 'static,
{
    fn drop(&mut self) {
        self.sender.take();
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            error!("event=writer_stop module=service status=error error_code=worker_panicked");
        }
    }
}

/// Joins a task snapshot with projects and orders it for display.
pub fn task_rows(tasks: &[Task], projects: &ProjectIndex, order: TaskOrder) -> Vec<TaskRow> {
    let mut ordered = tasks.to_vec();
    sort_tasks(&mut ordered, order);
    ordered
        .into_iter()
        .map(|task| {
            let project = projects.get(task.project_id).cloned();
            TaskRow { task, project }
        })
        .collect()
}

fn run_writer<T: TaskRepository + ?Sized>(repo: &T, receiver: Receiver<WriteCommand>) {
    info!("event=writer_start module=service status=ok");

    while let Ok(command) = receiver.recv() {
        match command {
            WriteCommand::Create { task, reply } => {
                let result = repo.create_task(&task);
                log_write_failure("task_create", &result);
                reply.send(result).ok();
            }
            WriteCommand::Update { task, reply } => {
                let result = repo.update_task(&task);
                log_write_failure("task_update", &result);
                reply.send(result).ok();
            }
            WriteCommand::Delete { id, reply } => {
                let result = repo.delete_task(id);
                log_write_failure("task_delete", &result);
                reply.send(result).ok();
            }
            WriteCommand::Flush { reply } => {
                reply.send(Ok(())).ok();
            }
        }
    }

    info!("event=writer_stop module=service status=ok");
}

fn log_write_failure<R>(event: &str, result: &StoreResult<R>) {
    if let Err(err) = result {
        warn!("event={event} module=service status=error error={err}");
    }
}
