//! Scheduling for courier.
//!
//! Work that should happen later is written down as a crontab row plus a
//! periodic task row. The [`beat::Beat`] worker polls those rows and runs
//! due tasks through the [`registry::TaskRegistry`].

pub mod beat;
pub mod crontab;
pub mod error;
pub mod fanout;
pub mod periodic;
pub mod recurrence;
pub mod registry;
pub mod tasks;

pub use error::ScheduleError;
