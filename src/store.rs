use crate::backend::{BackendError, KeyValueBackend};
use crate::codec;
use crate::model::{DateKey, TaskId, TaskList, TaskRecord};
use chrono::Utc;
use std::collections::HashMap;
use tracing::debug;

/// Per-day task lists on top of a key/value backend.
///
/// Every mutation loads the day's whole list, changes it and writes the whole
/// list back under the same key. Mutations that change nothing skip the write.
/// Task counts are cached per key for the grid markers; the cache is written
/// through on every successful persist and only drifts if another process
/// writes the same backend, see [`TaskStore::invalidate_all`].
pub struct TaskStore<B> {
    backend: B,
    counts: HashMap<DateKey, usize>,
}

impl<B: KeyValueBackend> TaskStore<B> {
    pub fn new(backend: B) -> Self {
        TaskStore {
            backend,
            counts: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads the day's list. The cached count for `key` is refreshed from
    /// what was read.
    pub fn load(&mut self, key: DateKey) -> Result<TaskList, BackendError> {
        let raw = self.backend.get(&key.storage_key())?;
        let tasks = codec::decode(raw.as_deref());
        self.counts.insert(key, tasks.len());
        Ok(tasks)
    }

    pub fn has_any(&mut self, key: DateKey) -> Result<bool, BackendError> {
        Ok(self.count(key)? > 0)
    }

    /// Number of tasks under `key`, from the cache when possible.
    pub fn count(&mut self, key: DateKey) -> Result<usize, BackendError> {
        if let Some(count) = self.counts.get(&key) {
            return Ok(*count);
        }
        Ok(self.load(key)?.len())
    }

    pub fn add(&mut self, key: DateKey, text: &str) -> Result<TaskList, BackendError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(%key, "ignoring blank task");
            return self.load(key);
        }
        self.update(key, |tasks| {
            let id = next_id(tasks);
            tasks.push(TaskRecord::new(id, text));
            true
        })
    }

    pub fn toggle_done(&mut self, key: DateKey, id: TaskId) -> Result<TaskList, BackendError> {
        self.update_record(key, id, |task| task.is_done = !task.is_done)
    }

    pub fn toggle_priority(&mut self, key: DateKey, id: TaskId) -> Result<TaskList, BackendError> {
        self.update_record(key, id, |task| task.is_priority = !task.is_priority)
    }

    pub fn remove(&mut self, key: DateKey, id: TaskId) -> Result<TaskList, BackendError> {
        self.update(key, |tasks| {
            let before = tasks.len();
            tasks.retain(|task| task.id != id);
            tasks.len() != before
        })
    }

    pub fn invalidate(&mut self, key: DateKey) {
        self.counts.remove(&key);
    }

    pub fn invalidate_all(&mut self) {
        self.counts.clear();
    }

    fn update_record<F>(&mut self, key: DateKey, id: TaskId, f: F) -> Result<TaskList, BackendError>
    where
        F: FnOnce(&mut TaskRecord),
    {
        self.update(key, |tasks| match tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                f(task);
                true
            }
            None => {
                debug!(%key, id, "no task with that id");
                false
            }
        })
    }

    fn update<F>(&mut self, key: DateKey, f: F) -> Result<TaskList, BackendError>
    where
        F: FnOnce(&mut TaskList) -> bool,
    {
        let mut tasks = self.load(key)?;
        if f(&mut tasks) {
            self.persist(key, &tasks)?;
        }
        Ok(tasks)
    }

    fn persist(&mut self, key: DateKey, tasks: &[TaskRecord]) -> Result<(), BackendError> {
        let encoded = codec::encode(tasks)?;
        self.backend.set(&key.storage_key(), encoded)?;
        self.counts.insert(key, tasks.len());
        debug!(%key, count = tasks.len(), "persisted tasks");
        Ok(())
    }
}

fn next_id(tasks: &[TaskRecord]) -> TaskId {
    let now = Utc::now().timestamp_millis();
    let max = match tasks.iter().map(|task| task.id).max() {
        Some(max) if max >= now => max,
        _ => return now,
    };
    if let Some(id) = max.checked_add(1) {
        return id;
    }
    // ids run up to i64::MAX; go below the smallest one, or take the first gap
    let min = tasks.iter().map(|task| task.id).min().unwrap_or(max);
    if let Some(id) = min.checked_sub(1) {
        return id;
    }
    let mut ids: Vec<TaskId> = tasks.iter().map(|task| task.id).collect();
    ids.sort_unstable();
    ids.windows(2)
        .find(|pair| pair[0] + 1 < pair[1])
        .map(|pair| pair[0] + 1)
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::storage::{FileBackend, StoreLocation, StoreScope};
    use std::collections::HashSet;

    fn key(y: i32, m: u32, d: u32) -> DateKey {
        DateKey::new(y, m, d)
    }

    fn store() -> TaskStore<MemoryBackend> {
        TaskStore::new(MemoryBackend::new())
    }

    #[test]
    fn never_written_key_is_empty() {
        let mut store = store();
        assert!(store.load(key(2025, 1, 5)).unwrap().is_empty());
        assert!(!store.has_any(key(2025, 1, 5)).unwrap());
    }

    #[test]
    fn add_appends_fresh_record() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "first").unwrap();
        let before = store.load(k).unwrap().len();

        let tasks = store.add(k, "x").unwrap();
        assert_eq!(tasks.len(), before + 1);
        let new = tasks.last().unwrap();
        assert_eq!(new.text, "x");
        assert!(!new.is_done);
        assert!(!new.is_priority);
        assert_eq!(store.load(k).unwrap(), tasks);
    }

    #[test]
    fn add_rejects_blank_text() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "keep").unwrap();
        let before = store.load(k).unwrap();
        let sets = store.backend().set_count();

        assert_eq!(store.add(k, "").unwrap(), before);
        assert_eq!(store.add(k, "   ").unwrap(), before);
        assert_eq!(store.load(k).unwrap(), before);
        assert_eq!(store.backend().set_count(), sets);
    }

    #[test]
    fn ids_are_unique_within_a_day() {
        let mut store = store();
        let k = key(2025, 1, 5);
        for i in 0..50 {
            store.add(k, &format!("task {i}")).unwrap();
        }
        let tasks = store.load(k).unwrap();
        let ids: HashSet<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn ids_stay_unique_when_stored_ids_are_in_the_future() {
        let far = Utc::now().timestamp_millis() + 1_000_000;
        let raw = format!(r#"[{{"id":{far},"isDone":false,"taskText":"a","isPrio":false}}]"#);
        let mut store = TaskStore::new(MemoryBackend::new().with_entry("2025_1_5", raw));
        let tasks = store.add(key(2025, 1, 5), "b").unwrap();
        assert_eq!(tasks[1].id, far + 1);
    }

    #[test]
    fn ids_stay_unique_when_stored_id_is_the_largest_possible() {
        let raw = format!(
            r#"[{{"id":{},"isDone":false,"taskText":"a","isPrio":false}}]"#,
            i64::MAX
        );
        let mut store = TaskStore::new(MemoryBackend::new().with_entry("2025_1_5", raw));
        let tasks = store.add(key(2025, 1, 5), "b").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].id, i64::MAX - 1);

        let tasks = store.add(key(2025, 1, 5), "c").unwrap();
        let ids: HashSet<_> = tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn next_id_fills_a_gap_when_both_ends_are_taken() {
        let tasks = vec![
            TaskRecord::new(i64::MIN, "low"),
            TaskRecord::new(i64::MIN + 2, "mid"),
            TaskRecord::new(i64::MAX, "high"),
        ];
        assert_eq!(next_id(&tasks), i64::MIN + 1);
    }

    #[test]
    fn toggle_done_twice_restores() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "a").unwrap();
        let original = store.add(k, "b").unwrap();
        let id = original[0].id;

        let once = store.toggle_done(k, id).unwrap();
        assert!(once[0].is_done);
        assert_eq!(once[1], original[1]);

        let twice = store.toggle_done(k, id).unwrap();
        assert_eq!(twice, original);
        assert_eq!(store.load(k).unwrap(), original);
    }

    #[test]
    fn toggle_priority_flips_only_target() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "a").unwrap();
        let original = store.add(k, "b").unwrap();

        let tasks = store.toggle_priority(k, original[1].id).unwrap();
        assert!(tasks[1].is_priority);
        assert!(!tasks[1].is_done);
        assert_eq!(tasks[0], original[0]);
    }

    #[test]
    fn unknown_id_is_a_silent_noop() {
        let mut store = store();
        let k = key(2025, 1, 5);
        let original = store.add(k, "a").unwrap();
        let sets = store.backend().set_count();

        assert_eq!(store.toggle_done(k, -1).unwrap(), original);
        assert_eq!(store.toggle_priority(k, -1).unwrap(), original);
        assert_eq!(store.remove(k, -1).unwrap(), original);
        assert_eq!(store.backend().set_count(), sets);
    }

    #[test]
    fn remove_drops_exactly_one() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "a").unwrap();
        store.add(k, "same").unwrap();
        let original = store.add(k, "same").unwrap();
        let target = original[1].id;

        let tasks = store.remove(k, target).unwrap();
        assert_eq!(tasks.len(), original.len() - 1);
        assert!(tasks.iter().all(|t| t.id != target));
        assert_eq!(tasks[1], original[2]);
    }

    #[test]
    fn removing_last_task_clears_marker() {
        let mut store = store();
        let k = key(2025, 1, 5);
        let tasks = store.add(k, "only").unwrap();
        assert!(store.has_any(k).unwrap());
        store.remove(k, tasks[0].id).unwrap();
        assert!(!store.has_any(k).unwrap());
        assert_eq!(store.backend().raw("2025_1_5"), Some("[]"));
    }

    #[test]
    fn keys_are_isolated() {
        let mut store = store();
        store.add(key(2025, 1, 5), "x").unwrap();
        assert!(store.load(key(2025, 1, 6)).unwrap().is_empty());
        assert!(store.load(key(2025, 2, 5)).unwrap().is_empty());
        assert!(!store.has_any(key(2025, 1, 6)).unwrap());
        assert!(!store.has_any(key(2025, 2, 5)).unwrap());
    }

    #[test]
    fn one_get_and_one_set_per_mutation() {
        let mut store = store();
        let k = key(2025, 1, 5);
        store.add(k, "a").unwrap();
        assert_eq!(store.backend().get_count(), 1);
        assert_eq!(store.backend().set_count(), 1);

        store.load(k).unwrap();
        assert_eq!(store.backend().get_count(), 2);
        assert_eq!(store.backend().set_count(), 1);
    }

    #[test]
    fn has_any_is_served_from_cache() {
        let mut store = TaskStore::new(MemoryBackend::new().with_entry(
            "2025_1_5",
            r#"[{"id":1,"isDone":false,"taskText":"a","isPrio":false}]"#,
        ));
        let k = key(2025, 1, 5);
        assert!(store.has_any(k).unwrap());
        assert!(store.has_any(k).unwrap());
        assert_eq!(store.backend().get_count(), 1);

        store.invalidate(k);
        assert!(store.has_any(k).unwrap());
        assert_eq!(store.backend().get_count(), 2);
    }

    #[test]
    fn load_refreshes_cached_count() {
        let dir = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: dir.path().join("tasks.yml"),
            scope: StoreScope::Explicit,
        };
        let mut a = TaskStore::new(FileBackend::new(&location));
        let mut b = TaskStore::new(FileBackend::new(&location));
        let k = key(2025, 1, 5);

        assert!(!a.has_any(k).unwrap());
        b.add(k, "from b").unwrap();
        assert_eq!(a.load(k).unwrap().len(), 1);
        assert!(a.has_any(k).unwrap());
    }

    #[test]
    fn corrupt_value_reads_empty_and_is_overwritten_on_add() {
        let mut store = TaskStore::new(MemoryBackend::new().with_entry("2025_1_5", "oops"));
        let k = key(2025, 1, 5);
        assert!(store.load(k).unwrap().is_empty());
        let tasks = store.add(k, "fresh").unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(store.load(k).unwrap(), tasks);
    }

    #[test]
    fn writers_sharing_a_file_last_write_wins_per_operation() {
        let dir = tempfile::tempdir().unwrap();
        let location = StoreLocation {
            path: dir.path().join("tasks.yml"),
            scope: StoreScope::Explicit,
        };
        let mut a = TaskStore::new(FileBackend::new(&location));
        let mut b = TaskStore::new(FileBackend::new(&location));
        let k = key(2025, 1, 5);

        assert!(!a.has_any(k).unwrap());
        b.add(k, "from b").unwrap();
        // a's marker cache does not see b's write until invalidated
        assert!(!a.has_any(k).unwrap());
        a.invalidate_all();
        assert!(a.has_any(k).unwrap());

        // each operation re-reads before writing, so sequential writers keep both
        let tasks = a.add(k, "from a").unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(b.load(k).unwrap(), tasks);
    }
}
