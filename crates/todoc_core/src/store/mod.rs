//! Persistent project/task store with live queries.
//!
//! # Responsibility
//! - Own the SQLite connection and every SQL statement for projects and tasks.
//! - Expose command operations that return typed results.
//! - Expose observable reads that re-emit after every affecting write.
//! - Seed the fixed project list exactly once, when the schema is created.
//!
//! # Invariants
//! - Writes validate records before SQL and map foreign-key failures to
//!   [`StoreError::ConstraintViolation`].
//! - Task ids are assigned by SQLite and never reused.
//! - `creation_timestamp` is never rewritten by `update_task`.
//! - Notifications run after the connection lock is released.

use crate::db::{open_db, open_db_in_memory, DbError, OpenedDb};
use crate::model::project::{Project, ProjectId};
use crate::model::task::{Task, TaskId};
use crate::model::ModelValidationError;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub mod observable;
pub mod seed;

pub use observable::{Change, LiveQueryRegistry, Observable, QueryScope, Subscription};

const PROJECT_SELECT_SQL: &str = "SELECT id, name, color FROM projects";
const TASK_SELECT_SQL: &str =
    "SELECT id, project_id, name, creation_timestamp, selected FROM tasks";

static SHARED_STORE: OnceCell<TaskStore> = OnceCell::new();

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for persistence and query operations.
#[derive(Debug)]
pub enum StoreError {
    Validation(ModelValidationError),
    Db(DbError),
    /// A task write referenced a project that does not exist.
    ConstraintViolation {
        project_id: ProjectId,
    },
    InvalidData(String),
    /// The shared store is already open on a different location.
    SharedPathConflict {
        active: String,
        requested: String,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::ConstraintViolation { project_id } => {
                write!(f, "task references unknown project {project_id}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::SharedPathConflict { active, requested } => write!(
                f,
                "shared store already opened at `{active}`; refusing to switch to `{requested}`"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::ConstraintViolation { .. }
            | Self::InvalidData(_)
            | Self::SharedPathConflict { .. } => None,
        }
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoreLocation {
    File(PathBuf),
    Memory,
}

impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, ":memory:"),
        }
    }
}

struct StoreShared {
    conn: Mutex<Connection>,
    live: LiveQueryRegistry,
    location: StoreLocation,
}

impl StoreShared {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    fn notify(&self, change: Change) {
        let refreshed = self.live.notify(&change);
        debug!(
            "event=store_notify module=store status=ok change={:?} refreshed={}",
            change, refreshed
        );
    }
}

/// Handle to the project/task store. Cloning shares the same connection.
#[derive(Clone)]
pub struct TaskStore {
    shared: Arc<StoreShared>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("location", &self.shared.location)
            .finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Opens (or creates) a file-backed store seeded with the default projects.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_seed(path, &seed::default_projects())
    }

    /// Opens (or creates) a file-backed store with a custom seed list.
    ///
    /// `seed` is only written when the database schema is created by this
    /// call; an existing database is never re-seeded.
    pub fn open_with_seed(path: impl AsRef<Path>, seed: &[Project]) -> StoreResult<Self> {
        let path = path.as_ref();
        let opened = open_db(path)?;
        Ok(Self::from_opened(
            opened,
            StoreLocation::File(path.to_path_buf()),
            seed,
        ))
    }

    /// Opens a fresh in-memory store seeded with the default projects.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open_in_memory_with_seed(&seed::default_projects())
    }

    /// Opens a fresh in-memory store with a custom seed list.
    pub fn open_in_memory_with_seed(seed: &[Project]) -> StoreResult<Self> {
        let opened = open_db_in_memory()?;
        Ok(Self::from_opened(opened, StoreLocation::Memory, seed))
    }

    /// Returns the process-wide store, opening it on first use.
    ///
    /// Concurrent first callers block until exactly one instance is built.
    ///
    /// # Errors
    /// - Returns [`StoreError::SharedPathConflict`] when the shared store is
    ///   already open at a different path.
    /// - Returns open/bootstrap errors from the first construction.
    pub fn shared(path: impl AsRef<Path>) -> StoreResult<Self> {
        let requested = StoreLocation::File(path.as_ref().to_path_buf());
        let store = SHARED_STORE.get_or_try_init(|| Self::open(path.as_ref()))?;

        if store.shared.location != requested {
            return Err(StoreError::SharedPathConflict {
                active: store.shared.location.to_string(),
                requested: requested.to_string(),
            });
        }
        Ok(store.clone())
    }

    fn from_opened(opened: OpenedDb, location: StoreLocation, seed: &[Project]) -> Self {
        let OpenedDb { conn, schema } = opened;
        if schema.is_created() {
            seed_projects(&conn, seed);
        }

        Self {
            shared: Arc::new(StoreShared {
                conn: Mutex::new(conn),
                live: LiveQueryRegistry::new(),
                location,
            }),
        }
    }

    /// Inserts a project or replaces the one with the same id.
    pub fn create_project(&self, project: &Project) -> StoreResult<()> {
        project.validate()?;

        self.shared.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (id, name, color) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    color = excluded.color;",
                params![project.id, project.name.as_str(), i64::from(project.color)],
            )?;
            Ok(())
        })?;

        debug!(
            "event=project_upsert module=store status=ok project_id={}",
            project.id
        );
        self.shared.notify(Change::Projects(vec![project.id]));
        Ok(())
    }

    pub fn get_project(&self, id: ProjectId) -> Observable<Option<Project>> {
        let shared = Arc::clone(&self.shared);
        self.shared.live.register(QueryScope::Project(id), move || {
            shared.with_conn(|conn| query_project(conn, id))
        })
    }

    pub fn get_all_projects(&self) -> Observable<Vec<Project>> {
        let shared = Arc::clone(&self.shared);
        self.shared.live.register(QueryScope::AllProjects, move || {
            shared.with_conn(query_all_projects)
        })
    }

    /// Stores `task` under a freshly assigned id and returns that id.
    ///
    /// `task.id` is ignored.
    ///
    /// # Errors
    /// - [`StoreError::ConstraintViolation`] when `task.project_id` is unknown.
    /// - [`StoreError::Validation`] when the task name is empty.
    pub fn insert_task(&self, task: &Task) -> StoreResult<TaskId> {
        task.validate()?;

        let result = self.shared.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (project_id, name, creation_timestamp, selected)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    task.project_id,
                    task.name.as_str(),
                    task.creation_timestamp,
                    task.selected
                ],
            )
            .map_err(|err| map_task_write_error(err, task.project_id))?;
            Ok(conn.last_insert_rowid())
        });

        let id = match result {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    "event=task_insert module=store status=error project_id={} error={}",
                    task.project_id, err
                );
                return Err(err);
            }
        };

        debug!(
            "event=task_insert module=store status=ok task_id={} project_id={}",
            id, task.project_id
        );
        self.shared.notify(Change::Tasks(vec![task.project_id]));
        Ok(id)
    }

    /// Replaces the stored task matching `task.id`.
    ///
    /// Returns the number of affected rows; `0` means no task has that id.
    pub fn update_task(&self, task: &Task) -> StoreResult<usize> {
        task.validate()?;

        let previous_project = self.shared.with_conn(|conn| {
            let Some(previous) = task_project_id(conn, task.id)? else {
                return Ok(None);
            };
            conn.execute(
                "UPDATE tasks
                 SET
                    project_id = ?1,
                    name = ?2,
                    selected = ?3
                 WHERE id = ?4;",
                params![task.project_id, task.name.as_str(), task.selected, task.id],
            )
            .map_err(|err| map_task_write_error(err, task.project_id))?;
            Ok(Some(previous))
        });

        match previous_project {
            Ok(Some(previous)) => {
                debug!(
                    "event=task_update module=store status=ok task_id={} project_id={}",
                    task.id, task.project_id
                );
                let mut touched = vec![previous];
                if previous != task.project_id {
                    touched.push(task.project_id);
                }
                self.shared.notify(Change::Tasks(touched));
                Ok(1)
            }
            Ok(None) => {
                debug!(
                    "event=task_update module=store status=noop task_id={}",
                    task.id
                );
                Ok(0)
            }
            Err(err) => {
                warn!(
                    "event=task_update module=store status=error task_id={} error={}",
                    task.id, err
                );
                Err(err)
            }
        }
    }

    /// Removes the task with `id`, returning the number of removed rows.
    pub fn delete_task(&self, id: TaskId) -> StoreResult<usize> {
        let removed = self.shared.with_conn(|conn| {
            let Some(project_id) = task_project_id(conn, id)? else {
                return Ok(None);
            };
            conn.execute("DELETE FROM tasks WHERE id = ?1;", [id])?;
            Ok(Some(project_id))
        })?;

        let Some(project_id) = removed else {
            debug!("event=task_delete module=store status=noop task_id={id}");
            return Ok(0);
        };

        debug!(
            "event=task_delete module=store status=ok task_id={} project_id={}",
            id, project_id
        );
        self.shared.notify(Change::Tasks(vec![project_id]));
        Ok(1)
    }

    /// Tasks owned by `project_id`, in id order.
    pub fn get_tasks(&self, project_id: ProjectId) -> Observable<Vec<Task>> {
        let shared = Arc::clone(&self.shared);
        self.shared
            .live
            .register(QueryScope::ProjectTasks(project_id), move || {
                shared.with_conn(|conn| query_tasks(conn, Some(project_id)))
            })
    }

    pub fn get_all_tasks(&self) -> Observable<Vec<Task>> {
        let shared = Arc::clone(&self.shared);
        self.shared.live.register(QueryScope::AllTasks, move || {
            shared.with_conn(|conn| query_tasks(conn, None))
        })
    }

    /// Number of observables still alive on this store.
    pub fn live_query_count(&self) -> usize {
        self.shared.live.live_count()
    }
}

fn seed_projects(conn: &Connection, seed: &[Project]) {
    let mut seeded = 0_usize;
    for project in seed {
        let result = project
            .validate()
            .map_err(StoreError::from)
            .and_then(|()| {
                conn.execute(
                    "INSERT OR IGNORE INTO projects (id, name, color) VALUES (?1, ?2, ?3);",
                    params![project.id, project.name.as_str(), i64::from(project.color)],
                )
                .map_err(StoreError::from)
            });

        match result {
            Ok(inserted) => seeded += inserted,
            Err(err) => warn!(
                "event=store_seed module=store status=skipped project_id={} error={}",
                project.id, err
            ),
        }
    }
    info!(
        "event=store_seed module=store status=ok seeded={} requested={}",
        seeded,
        seed.len()
    );
}

fn map_task_write_error(err: rusqlite::Error, project_id: ProjectId) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            StoreError::ConstraintViolation { project_id }
        }
        _ => StoreError::from(err),
    }
}

fn task_project_id(conn: &Connection, id: TaskId) -> StoreResult<Option<ProjectId>> {
    let project_id = conn
        .query_row("SELECT project_id FROM tasks WHERE id = ?1;", [id], |row| {
            row.get::<_, ProjectId>(0)
        })
        .optional()?;
    Ok(project_id)
}

fn query_project(conn: &Connection, id: ProjectId) -> StoreResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

fn query_all_projects(conn: &Connection) -> StoreResult<Vec<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} ORDER BY id ASC;"))?;
    let mut rows = stmt.query([])?;
    let mut projects = Vec::new();
    while let Some(row) = rows.next()? {
        projects.push(parse_project_row(row)?);
    }
    Ok(projects)
}

fn query_tasks(conn: &Connection, project_id: Option<ProjectId>) -> StoreResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE (?1 IS NULL OR project_id = ?1)
         ORDER BY id ASC;"
    ))?;
    let mut rows = stmt.query([project_id])?;
    let mut tasks = Vec::new();
    while let Some(row) = rows.next()? {
        tasks.push(parse_task_row(row)?);
    }
    Ok(tasks)
}

fn parse_project_row(row: &Row<'_>) -> StoreResult<Project> {
    let raw_color: i64 = row.get("color")?;
    let color = u32::try_from(raw_color).map_err(|_| {
        StoreError::InvalidData(format!("invalid color value `{raw_color}` in projects.color"))
    })?;

    let project = Project {
        id: row.get("id")?,
        name: row.get("name")?,
        color,
    };
    project.validate()?;
    Ok(project)
}

fn parse_task_row(row: &Row<'_>) -> StoreResult<Task> {
    let selected = match row.get::<_, i64>("selected")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid selected value `{other}` in tasks.selected"
            )));
        }
    };

    let task = Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        creation_timestamp: row.get("creation_timestamp")?,
        selected,
    };
    task.validate()?;
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::{StoreError, TaskStore};
    use crate::model::project::Project;
    use crate::model::task::Task;

    #[test]
    fn display_names_the_missing_project() {
        let err = StoreError::ConstraintViolation { project_id: 42 };
        assert_eq!(err.to_string(), "task references unknown project 42");
    }

    #[test]
    fn update_keeps_original_creation_timestamp() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store
            .insert_task(&Task::with_timestamp(1, "draft", 1_000))
            .unwrap();

        let mut edited = Task::with_timestamp(1, "final", 9_999);
        edited.id = id;
        assert_eq!(store.update_task(&edited).unwrap(), 1);

        let stored = store.get_all_tasks().current().unwrap();
        assert_eq!(stored[0].name, "final");
        assert_eq!(stored[0].creation_timestamp, 1_000);
    }

    #[test]
    fn update_to_unknown_project_is_a_constraint_violation() {
        let store = TaskStore::open_in_memory().unwrap();
        let id = store
            .insert_task(&Task::with_timestamp(1, "move me", 1))
            .unwrap();

        let mut moved = Task::with_timestamp(99, "move me", 1);
        moved.id = id;
        let err = store.update_task(&moved).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation { project_id: 99 }));
    }

    #[test]
    fn project_color_roundtrips_full_u32_range() {
        let store = TaskStore::open_in_memory_with_seed(&[]).unwrap();
        store
            .create_project(&Project::new(5, "bright", u32::MAX))
            .unwrap();

        let project = store.get_project(5).current().unwrap().unwrap();
        assert_eq!(project.color, u32::MAX);
    }
}
