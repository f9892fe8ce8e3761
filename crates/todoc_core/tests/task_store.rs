use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use todoc_core::{Project, StoreError, Task, TaskStore};

const PROJECT_ID: i64 = 1;

type Emissions<T> = Arc<Mutex<Vec<T>>>;

fn record<T: Clone + Send + Sync + 'static>(
    observable: &todoc_core::Observable<T>,
) -> (Emissions<T>, todoc_core::Subscription) {
    let emissions: Emissions<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&emissions);
    let subscription = observable
        .subscribe(move |snapshot: &T| sink.lock().unwrap().push(snapshot.clone()))
        .unwrap();
    (emissions, subscription)
}

fn last<T: Clone>(emissions: &Emissions<T>) -> T {
    emissions.lock().unwrap().last().cloned().unwrap()
}

#[test]
fn seeded_store_emits_three_projects() {
    let store = TaskStore::open_in_memory().unwrap();

    let (emissions, _sub) = record(&store.get_all_projects());

    let ids: HashSet<_> = last(&emissions).iter().map(|p| p.id).collect();
    assert_eq!(ids, HashSet::from([1, 2, 3]));
}

#[test]
fn create_and_get_project() {
    let store = TaskStore::open_in_memory_with_seed(&[]).unwrap();
    let demo = Project::new(PROJECT_ID, "Projet Tartampion", 0xFFEA_DAD1);

    store.create_project(&demo).unwrap();

    let loaded = store.get_project(PROJECT_ID).current().unwrap();
    assert_eq!(loaded, Some(demo));
}

#[test]
fn create_project_replaces_existing_record() {
    let store = TaskStore::open_in_memory().unwrap();
    let observable = store.get_project(2);
    let (emissions, _sub) = record(&observable);

    store
        .create_project(&Project::new(2, "Renamed", 0xFF00_00FF))
        .unwrap();

    let snapshots = emissions.lock().unwrap().clone();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].as_ref().unwrap().name, "Projet Lucidia");
    assert_eq!(snapshots[1].as_ref().unwrap().name, "Renamed");
    assert_eq!(store.get_all_projects().current().unwrap().len(), 3);
}

#[test]
fn missing_project_emits_none() {
    let store = TaskStore::open_in_memory().unwrap();
    assert_eq!(store.get_project(77).current().unwrap(), None);
}

#[test]
fn get_tasks_without_tasks_emits_empty_list() {
    let store = TaskStore::open_in_memory().unwrap();

    let (emissions, _sub) = record(&store.get_tasks(PROJECT_ID));

    assert_eq!(emissions.lock().unwrap().len(), 1);
    assert!(last(&emissions).is_empty());
}

#[test]
fn insert_three_tasks_scoped_to_their_project() {
    let store = TaskStore::open_in_memory().unwrap();
    let (project_one, _sub_one) = record(&store.get_tasks(1));
    let (project_two, _sub_two) = record(&store.get_tasks(2));

    for name in ["test1", "test2", "test3"] {
        store
            .insert_task(&Task::with_timestamp(PROJECT_ID, name, 0))
            .unwrap();
    }

    assert_eq!(last(&project_one).len(), 3);
    assert!(last(&project_two).is_empty());
    assert_eq!(project_two.lock().unwrap().len(), 1, "untouched scope re-emitted");
}

#[test]
fn inserted_ids_are_pairwise_distinct() {
    let store = TaskStore::open_in_memory().unwrap();

    let ids: Vec<_> = (0..20)
        .map(|n| {
            store
                .insert_task(&Task::with_timestamp(1 + n % 3, format!("task {n}"), n))
                .unwrap()
        })
        .collect();

    let unique: HashSet<_> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[test]
fn deleted_task_ids_are_not_reused() {
    let store = TaskStore::open_in_memory().unwrap();
    let first = store.insert_task(&Task::with_timestamp(1, "a", 0)).unwrap();
    store.delete_task(first).unwrap();

    let second = store.insert_task(&Task::with_timestamp(1, "b", 0)).unwrap();
    assert_ne!(first, second);
}

#[test]
fn orphan_task_is_rejected_and_never_visible() {
    let store = TaskStore::open_in_memory().unwrap();
    let (all_tasks, _sub) = record(&store.get_all_tasks());

    let err = store
        .insert_task(&Task::with_timestamp(404, "orphan", 0))
        .unwrap_err();

    assert!(matches!(err, StoreError::ConstraintViolation { project_id: 404 }));
    assert!(last(&all_tasks).is_empty());
    assert!(store.get_tasks(404).current().unwrap().is_empty());
    assert_eq!(all_tasks.lock().unwrap().len(), 1);
}

#[test]
fn empty_task_name_is_a_validation_error() {
    let store = TaskStore::open_in_memory().unwrap();

    let err = store
        .insert_task(&Task::with_timestamp(1, "  ", 0))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn update_selected_flag_is_observed() {
    let store = TaskStore::open_in_memory().unwrap();
    store
        .insert_task(&Task::with_timestamp(PROJECT_ID, "test1", 0))
        .unwrap();
    let (emissions, _sub) = record(&store.get_tasks(PROJECT_ID));

    let mut added = last(&emissions)[0].clone();
    added.selected = true;
    assert_eq!(store.update_task(&added).unwrap(), 1);

    let tasks = last(&emissions);
    assert_eq!(tasks.len(), 1);
    assert!(tasks[0].selected);
}

#[test]
fn update_unknown_task_returns_zero_without_emitting() {
    let store = TaskStore::open_in_memory().unwrap();
    let (emissions, _sub) = record(&store.get_all_tasks());

    let mut ghost = Task::with_timestamp(1, "ghost", 0);
    ghost.id = 9_999;

    assert_eq!(store.update_task(&ghost).unwrap(), 0);
    assert_eq!(emissions.lock().unwrap().len(), 1);
}

#[test]
fn moving_task_refreshes_both_project_scopes() {
    let store = TaskStore::open_in_memory().unwrap();
    let id = store.insert_task(&Task::with_timestamp(1, "move", 0)).unwrap();
    let (from, _sub_from) = record(&store.get_tasks(1));
    let (to, _sub_to) = record(&store.get_tasks(2));

    let mut moved = Task::with_timestamp(2, "move", 0);
    moved.id = id;
    store.update_task(&moved).unwrap();

    assert!(last(&from).is_empty());
    assert_eq!(last(&to).len(), 1);
}

#[test]
fn insert_then_delete_leaves_empty_list() {
    let store = TaskStore::open_in_memory().unwrap();
    store
        .insert_task(&Task::with_timestamp(PROJECT_ID, "test1", 0))
        .unwrap();
    let (emissions, _sub) = record(&store.get_tasks(PROJECT_ID));

    let added = last(&emissions)[0].clone();
    store.delete_task(added.id).unwrap();

    assert!(last(&emissions).is_empty());
}

#[test]
fn delete_twice_reports_one_then_zero() {
    let store = TaskStore::open_in_memory().unwrap();
    let id = store.insert_task(&Task::with_timestamp(1, "once", 0)).unwrap();

    assert_eq!(store.delete_task(id).unwrap(), 1);
    assert_eq!(store.delete_task(id).unwrap(), 0);
}

#[test]
fn dropped_subscription_receives_no_further_snapshots() {
    let store = TaskStore::open_in_memory().unwrap();
    let observable = store.get_all_tasks();
    let (emissions, subscription) = record(&observable);

    subscription.unsubscribe();
    store.insert_task(&Task::with_timestamp(1, "late", 0)).unwrap();

    assert_eq!(emissions.lock().unwrap().len(), 1);
    assert_eq!(observable.subscriber_count(), 0);
}

#[test]
fn dropped_observables_are_pruned() {
    let store = TaskStore::open_in_memory().unwrap();
    let kept = store.get_all_tasks();
    drop(store.get_tasks(1));
    drop(store.get_all_projects());

    assert_eq!(store.live_query_count(), 1);
    drop(kept);
    assert_eq!(store.live_query_count(), 0);
}

#[test]
fn file_store_is_seeded_only_on_creation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todoc.db");

    let store = TaskStore::open(&path).unwrap();
    store
        .create_project(&Project::new(1, "Edited", 0xFF00_0000))
        .unwrap();
    drop(store);

    let reopened = TaskStore::open_with_seed(&path, &[Project::new(9, "Never", 0)]).unwrap();
    let projects = reopened.get_all_projects().current().unwrap();

    assert_eq!(projects.len(), 3);
    assert_eq!(projects[0].name, "Edited");
    assert!(projects.iter().all(|project| project.id != 9));
}

#[test]
fn invalid_seed_entries_are_skipped() {
    let seed = [
        Project::new(1, "ok", 0),
        Project::new(2, "", 0),
        Project::new(1, "duplicate", 0),
    ];
    let store = TaskStore::open_in_memory_with_seed(&seed).unwrap();

    let projects = store.get_all_projects().current().unwrap();
    assert_eq!(projects, vec![Project::new(1, "ok", 0)]);
}

#[test]
fn shared_store_is_built_once_and_rejects_other_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let path = path.clone();
            std::thread::spawn(move || TaskStore::shared(path).unwrap())
        })
        .collect();
    let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    stores[0].insert_task(&Task::with_timestamp(1, "seen by all", 0)).unwrap();
    for store in &stores {
        assert_eq!(store.get_all_tasks().current().unwrap().len(), 1);
    }

    let err = TaskStore::shared(dir.path().join("other.db")).unwrap_err();
    assert!(matches!(err, StoreError::SharedPathConflict { .. }));
}
