//! Console sink behind the display-collaborator boundary.
//!
//! Rendering proper is out of scope for the monitor; components hand a
//! [`DisplayState`] to anything implementing [`TableSink`]. The one sink
//! shipped here prints a plain-text table and emphasizes the caller's
//! own job.

use colored::Colorize;
use fairq_events::{now_epoch, JobStatus, TableRow};
use tabled::{Table, Tabled};

use crate::queue::JobRef;
use crate::view::DisplayState;

/// Anything that can present merged-table snapshots to a user.
pub trait TableSink: Send {
    /// Presents a full snapshot; `own` marks the caller's job.
    fn present(&mut self, state: &DisplayState, own: Option<&JobRef>);
}

#[derive(Tabled)]
struct DisplayRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Job")]
    id: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Waiting")]
    waiting: String,
}

/// Plain-text sink for terminal use.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl TableSink for ConsoleSink {
    fn present(&mut self, state: &DisplayState, own: Option<&JobRef>) {
        match state {
            DisplayState::Unavailable => {
                println!("{}", "Error while connecting to the queue service".red());
            }
            DisplayState::Table(rows) if rows.is_empty() => {
                println!("{}", "No jobs in the queue.".dimmed());
            }
            DisplayState::Table(rows) => {
                let now = now_epoch();
                let display: Vec<DisplayRow> =
                    rows.iter().map(|row| display_row(row, own, now)).collect();
                println!("{}", Table::new(display));
            }
        }
    }
}

fn display_row(row: &TableRow, own: Option<&JobRef>, now: f64) -> DisplayRow {
    let status = status_label(row.status).to_string();
    let id = row.id.to_string();
    let owner = row.user.clone().unwrap_or_else(|| "unknown".to_string());
    let waiting = match row.waiting_secs(now) {
        Some(secs) => format!("{secs:.0}s"),
        None => "??".to_string(),
    };

    let is_own = own.is_some_and(|job| job.id == row.id && job.queue_id == row.queue_id);
    if is_own {
        DisplayRow {
            status: status.bold().to_string(),
            id: id.bold().to_string(),
            owner: owner.bold().to_string(),
            waiting: waiting.bold().to_string(),
        }
    } else {
        DisplayRow {
            status,
            id,
            owner,
            waiting,
        }
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "Pending",
        JobStatus::Running => "Running",
        JobStatus::Halted => "Halted",
        JobStatus::Canceled => "Canceled",
        JobStatus::Finished => "Finished",
    }
}
