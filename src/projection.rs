use crate::backend::{BackendError, KeyValueBackend};
use crate::calendar::days_in_month;
use crate::model::{DateKey, TaskRecord};
use crate::store::TaskStore;

/// Open tasks before done ones, priority before plain within each group.
/// Ties keep insertion order.
pub fn sort_for_display(tasks: &[TaskRecord]) -> Vec<TaskRecord> {
    let mut sorted = tasks.to_vec();
    sorted.sort_by_key(|task| (task.is_done, !task.is_priority));
    sorted
}

pub fn is_grid_marked<B: KeyValueBackend>(
    store: &mut TaskStore<B>,
    key: DateKey,
) -> Result<bool, BackendError> {
    store.has_any(key)
}

/// Marker per day of the month, index 0 is day 1.
pub fn month_marks<B: KeyValueBackend>(
    store: &mut TaskStore<B>,
    year: i32,
    month: u32,
) -> Result<Vec<bool>, BackendError> {
    (1..=days_in_month(year, month))
        .map(|day| is_grid_marked(store, DateKey::new(year, month, day)))
        .collect()
}

/// Task count per day of the month, index 0 is day 1.
pub fn month_counts<B: KeyValueBackend>(
    store: &mut TaskStore<B>,
    year: i32,
    month: u32,
) -> Result<Vec<usize>, BackendError> {
    (1..=days_in_month(year, month))
        .map(|day| store.count(DateKey::new(year, month, day)))
        .collect()
}
