use crate::calendar::{self, days_in_month, first_weekday_offset, month_name, weekday_headings};
use crate::config::{load_config, Config};
use crate::model::{DateKey, TaskId, TaskRecord};
use crate::projection::{month_marks, sort_for_display};
use crate::session::Session;
use crate::storage::{init_project_store, locate_store, FileBackend, StoreLocation};
use crate::store::TaskStore;
use crate::ui;
use anyhow::{Context, Result};
use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Paths given on the command line, before config and discovery apply.
#[derive(Debug, Default, Clone)]
pub struct Paths {
    pub store: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

pub fn init() -> Result<()> {
    let cwd = env::current_dir()?;
    let location = init_project_store(&cwd)?;
    println!("Initialized task store at {}", location.path.display());
    Ok(())
}

pub fn list(paths: &Paths, date: Option<DateKey>) -> Result<()> {
    let (mut store, _, _) = open_store(paths)?;
    let key = date.unwrap_or_else(today_key);
    let tasks = store
        .load(key)
        .with_context(|| format!("loading tasks for {}", format_key(key)))?;
    print_tasks(key, &tasks);
    Ok(())
}

pub fn add(paths: &Paths, text: String, date: Option<DateKey>) -> Result<()> {
    let (mut store, _, _) = open_store(paths)?;
    let key = date.unwrap_or_else(today_key);
    let before = store.load(key)?.len();
    let tasks = store
        .add(key, &text)
        .with_context(|| format!("adding task to {}", format_key(key)))?;
    if tasks.len() == before {
        println!("Ignored blank task");
    } else if let Some(task) = tasks.last() {
        println!("Added task {} to {}", task.id, format_key(key));
    }
    print_tasks(key, &tasks);
    Ok(())
}

pub fn toggle_done(paths: &Paths, id: TaskId, date: Option<DateKey>) -> Result<()> {
    let (mut store, _, _) = open_store(paths)?;
    let key = date.unwrap_or_else(today_key);
    let tasks = store
        .toggle_done(key, id)
        .with_context(|| format!("updating task {} on {}", id, format_key(key)))?;
    match tasks.iter().find(|task| task.id == id) {
        Some(task) if task.is_done => println!("Marked {} done", id),
        Some(_) => println!("Reopened {}", id),
        None => println!("No task {} on {}", id, format_key(key)),
    }
    print_tasks(key, &tasks);
    Ok(())
}

pub fn toggle_priority(paths: &Paths, id: TaskId, date: Option<DateKey>) -> Result<()> {
    let (mut store, _, _) = open_store(paths)?;
    let key = date.unwrap_or_else(today_key);
    let tasks = store
        .toggle_priority(key, id)
        .with_context(|| format!("updating task {} on {}", id, format_key(key)))?;
    match tasks.iter().find(|task| task.id == id) {
        Some(task) if task.is_priority => println!("Prioritized {}", id),
        Some(_) => println!("Cleared priority of {}", id),
        None => println!("No task {} on {}", id, format_key(key)),
    }
    print_tasks(key, &tasks);
    Ok(())
}

pub fn delete(paths: &Paths, id: TaskId, date: Option<DateKey>) -> Result<()> {
    let (mut store, _, _) = open_store(paths)?;
    let key = date.unwrap_or_else(today_key);
    let before = store.load(key)?.len();
    let tasks = store
        .remove(key, id)
        .with_context(|| format!("deleting task {} on {}", id, format_key(key)))?;
    if tasks.len() < before {
        println!("Deleted {}", id);
    } else {
        println!("No task {} on {}", id, format_key(key));
    }
    print_tasks(key, &tasks);
    Ok(())
}

pub fn month(paths: &Paths, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let (mut store, _, config) = open_store(paths)?;
    let (this_year, this_month, _) = calendar::today();
    let year = year.unwrap_or(this_year);
    let month = month.unwrap_or(this_month);
    let marks = month_marks(&mut store, year, month)
        .with_context(|| format!("reading tasks for {}-{:02}", year, month))?;
    print!("{}", render_month(year, month, &marks, &config));
    Ok(())
}

pub fn tui(paths: &Paths) -> Result<()> {
    let (store, location, config) = open_store(paths)?;
    let session = Session::starting_today(store);
    ui::run(session, location, config)
}

fn open_store(paths: &Paths) -> Result<(TaskStore<FileBackend>, StoreLocation, Config)> {
    let config = load_config(paths.config.as_deref())?;
    let cwd = env::current_dir()?;
    let explicit = paths.store.clone().or_else(|| config.store_path.clone());
    let location = locate_store(&cwd, explicit)?;
    let store = TaskStore::new(FileBackend::new(&location));
    Ok((store, location, config))
}

fn today_key() -> DateKey {
    let (year, month, day) = calendar::today();
    DateKey::new(year, month, day)
}

fn format_key(key: DateKey) -> String {
    format!("{}-{:02}-{:02}", key.year, key.month, key.day)
}

fn print_tasks(key: DateKey, tasks: &[TaskRecord]) {
    println!("{} ({} tasks)", format_key(key), tasks.len());
    if tasks.is_empty() {
        println!("  (no tasks yet)");
    }
    for task in sort_for_display(tasks) {
        println!("{}", task_line(&task));
    }
}

fn task_line(task: &TaskRecord) -> String {
    format!(
        "  [{}] {} {}  ({})",
        if task.is_done { "x" } else { " " },
        if task.is_priority { "!" } else { " " },
        task.text,
        task.id
    )
}

/// Plain-text month grid; marked days carry a `*`.
pub fn render_month(year: i32, month: u32, marks: &[bool], config: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", month_name(month), year);
    let headings = weekday_headings(config.week_start)
        .iter()
        .map(|h| format!("{:>4}", h))
        .collect::<String>();
    let _ = writeln!(out, "{}", headings);

    let offset = first_weekday_offset(year, month, config.week_start) as usize;
    let days = days_in_month(year, month) as usize;
    let mut line = "    ".repeat(offset);
    for day in 1..=days {
        let mark = if marks.get(day - 1).copied().unwrap_or(false) {
            "*"
        } else {
            " "
        };
        let _ = write!(line, "{:>3}{}", day, mark);
        if (offset + day) % 7 == 0 {
            let _ = writeln!(out, "{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
