//! dayplan - a task ledger keyed by calendar day.
//!
//! Tasks live in a string key/value store, one encoded list per day under a
//! `<year>_<month>_<day>` key. [`store::TaskStore`] owns reads and writes,
//! [`session::Session`] is the command surface a calendar front end drives.

pub mod backend;
pub mod calendar;
pub mod cli;
pub mod codec;
pub mod commands;
pub mod config;
pub mod model;
pub mod projection;
pub mod session;
pub mod storage;
pub mod store;
pub mod ui;
