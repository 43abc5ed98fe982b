//! State of one calendar view: the month on screen, the selected day and the
//! store behind them. Every command returns a fresh [`Projection`] to render.

use crate::backend::{BackendError, KeyValueBackend};
use crate::calendar::{self, days_in_month, shift_month, shift_year, Step};
use crate::model::{DateKey, TaskId, TaskList, TaskRecord};
use crate::projection::{month_counts, sort_for_display};
use crate::store::TaskStore;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    PrevYear,
    NextYear,
    PrevMonth,
    NextMonth,
    Today,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub year: i32,
    pub month: u32,
    pub selected: Option<DateKey>,
    /// Tasks of the selected day in display order, empty without a selection.
    pub tasks: Vec<TaskRecord>,
    /// One marker per day of the month, index 0 is day 1.
    pub marks: Vec<bool>,
    /// Task count per day of the month, index 0 is day 1.
    pub counts: Vec<usize>,
}

impl Projection {
    pub fn is_marked(&self, day: u32) -> bool {
        self.count(day) > 0
    }

    pub fn count(&self, day: u32) -> usize {
        day.checked_sub(1)
            .and_then(|idx| self.counts.get(idx as usize))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("{year}-{month:02} has no day {day}")]
    DayOutOfRange { year: i32, month: u32, day: u32 },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct Session<B> {
    store: TaskStore<B>,
    year: i32,
    month: u32,
    selected: Option<u32>,
}

impl<B: KeyValueBackend> Session<B> {
    pub fn new(store: TaskStore<B>, year: i32, month: u32) -> Self {
        Session {
            store,
            year,
            month: month.clamp(1, 12),
            selected: None,
        }
    }

    /// Opens on the current month with nothing selected.
    pub fn starting_today(store: TaskStore<B>) -> Self {
        let (year, month, _) = calendar::today();
        Session::new(store, year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn selected_key(&self) -> Option<DateKey> {
        self.selected
            .map(|day| DateKey::new(self.year, self.month, day))
    }

    pub fn store(&self) -> &TaskStore<B> {
        &self.store
    }

    pub fn projection(&mut self) -> Result<Projection, SessionError> {
        self.project(None)
    }

    pub fn select_day(&mut self, day: u32) -> Result<Projection, SessionError> {
        if day == 0 || day > days_in_month(self.year, self.month) {
            return Err(SessionError::DayOutOfRange {
                year: self.year,
                month: self.month,
                day,
            });
        }
        self.selected = Some(day);
        debug!(key = %DateKey::new(self.year, self.month, day), "selected day");
        self.project(None)
    }

    pub fn clear_selection(&mut self) -> Result<Projection, SessionError> {
        self.selected = None;
        self.project(None)
    }

    pub fn add_task(&mut self, text: &str) -> Result<Projection, SessionError> {
        self.mutate(|store, key| store.add(key, text))
    }

    pub fn toggle_done(&mut self, id: TaskId) -> Result<Projection, SessionError> {
        self.mutate(|store, key| store.toggle_done(key, id))
    }

    pub fn toggle_priority(&mut self, id: TaskId) -> Result<Projection, SessionError> {
        self.mutate(|store, key| store.toggle_priority(key, id))
    }

    pub fn delete_task(&mut self, id: TaskId) -> Result<Projection, SessionError> {
        self.mutate(|store, key| store.remove(key, id))
    }

    /// Month and year moves drop the selection; `Today` selects today.
    pub fn navigate(&mut self, nav: Navigation) -> Result<Projection, SessionError> {
        match nav {
            Navigation::PrevYear => self.year = shift_year(self.year, Step::Back),
            Navigation::NextYear => self.year = shift_year(self.year, Step::Forward),
            Navigation::PrevMonth => {
                (self.year, self.month) = shift_month(self.year, self.month, Step::Back)
            }
            Navigation::NextMonth => {
                (self.year, self.month) = shift_month(self.year, self.month, Step::Forward)
            }
            Navigation::Today => {
                let (year, month, day) = calendar::today();
                self.year = year;
                self.month = month;
                self.selected = Some(day);
                return self.project(None);
            }
        }
        self.selected = None;
        debug!(year = self.year, month = self.month, "navigated");
        self.project(None)
    }

    /// Drops cached markers so writes from other processes show up.
    pub fn refresh(&mut self) -> Result<Projection, SessionError> {
        self.store.invalidate_all();
        self.project(None)
    }

    fn mutate<F>(&mut self, f: F) -> Result<Projection, SessionError>
    where
        F: FnOnce(&mut TaskStore<B>, DateKey) -> Result<TaskList, BackendError>,
    {
        let key = match self.selected_key() {
            Some(key) => key,
            None => {
                debug!("no day selected, ignoring task command");
                return self.project(None);
            }
        };
        let tasks = f(&mut self.store, key)?;
        self.project(Some(tasks))
    }

    fn project(&mut self, loaded: Option<TaskList>) -> Result<Projection, SessionError> {
        let selected = self.selected_key();
        let tasks = match (selected, loaded) {
            (Some(_), Some(tasks)) => sort_for_display(&tasks),
            (Some(key), None) => sort_for_display(&self.store.load(key)?),
            (None, _) => Vec::new(),
        };
        let counts = month_counts(&mut self.store, self.year, self.month)?;
        Ok(Projection {
            year: self.year,
            month: self.month,
            selected,
            tasks,
            marks: counts.iter().map(|count| *count > 0).collect(),
            counts,
        })
    }
}
