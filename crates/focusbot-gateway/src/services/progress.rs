//! Task completion log kept as JSON lines on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::ServiceError;

const LOG_FILE_NAME: &str = "progress.jsonl";
const BAR_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    Pending,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Pending => write!(f, "pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub date: NaiveDate,
    pub task: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayTally {
    pub done: usize,
    pub pending: usize,
}

impl DayTally {
    pub fn total(&self) -> usize {
        self.done + self.pending
    }
}

/// Per-day counts of logged task updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub days: BTreeMap<NaiveDate, DayTally>,
    pub log_path: PathBuf,
}

impl ProgressReport {
    pub fn total_done(&self) -> usize {
        self.days.values().map(|d| d.done).sum()
    }

    pub fn total_pending(&self) -> usize {
        self.days.values().map(|d| d.pending).sum()
    }

    /// A Markdown summary with one bar per day, scaled to the busiest day.
    pub fn render(&self) -> String {
        let busiest = self.days.values().map(DayTally::total).max().unwrap_or(0);
        let mut lines = vec!["📈 *Daily Progress*".to_string()];

        for (date, tally) in &self.days {
            let done_cells = scaled(tally.done, busiest);
            let pending_cells = scaled(tally.pending, busiest);
            lines.push(format!(
                "`{date}` {}{} ✅ {} ⏳ {}",
                "█".repeat(done_cells),
                "░".repeat(pending_cells),
                tally.done,
                tally.pending,
            ));
        }

        lines.push(format!(
            "Total: ✅ {} done · ⏳ {} pending",
            self.total_done(),
            self.total_pending()
        ));
        lines.join("\n")
    }
}

fn scaled(count: usize, busiest: usize) -> usize {
    if busiest == 0 || count == 0 {
        return 0;
    }
    ((count * BAR_WIDTH) / busiest).max(1)
}

pub struct ProgressLog {
    path: PathBuf,
}

impl ProgressLog {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(LOG_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn log_task_update(
        &self,
        task: &str,
        status: TaskStatus,
        date: NaiveDate,
    ) -> Result<ProgressEntry, ServiceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let entry = ProgressEntry {
            date,
            task: task.to_string(),
            status,
        };
        let mut line = serde_json::to_string(&entry)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(entry)
    }

    pub async fn entries(&self) -> Result<Vec<ProgressEntry>, ServiceError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed progress line");
                    None
                }
            })
            .collect())
    }

    /// Aggregate the log. [`ServiceError::NoData`] when nothing was logged yet.
    pub async fn report(&self) -> Result<ProgressReport, ServiceError> {
        let entries = self.entries().await?;
        if entries.is_empty() {
            return Err(ServiceError::NoData);
        }

        let mut days: BTreeMap<NaiveDate, DayTally> = BTreeMap::new();
        for entry in entries {
            let tally = days.entry(entry.date).or_default();
            match entry.status {
                TaskStatus::Done => tally.done += 1,
                TaskStatus::Pending => tally.pending += 1,
            }
        }

        Ok(ProgressReport {
            days,
            log_path: self.path.clone(),
        })
    }

    /// Delete the log. Returns whether there was anything to delete.
    pub async fn reset(&self) -> Result<bool, ServiceError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[tokio::test]
    async fn test_report_without_log_is_no_data() {
        let dir = TempDir::new().unwrap();
        let log = ProgressLog::new(dir.path());
        assert!(matches!(log.report().await, Err(ServiceError::NoData)));
    }

    #[tokio::test]
    async fn test_log_and_report() {
        let dir = TempDir::new().unwrap();
        let log = ProgressLog::new(dir.path().join("nested"));

        log.log_task_update("write spec", TaskStatus::Done, day(17)).await.unwrap();
        log.log_task_update("gym", TaskStatus::Pending, day(17)).await.unwrap();
        log.log_task_update("review", TaskStatus::Done, day(18)).await.unwrap();
        log.log_task_update("groceries", TaskStatus::Done, day(18)).await.unwrap();

        let report = log.report().await.unwrap();
        assert_eq!(report.days.len(), 2);
        assert_eq!(report.days[&day(17)], DayTally { done: 1, pending: 1 });
        assert_eq!(report.days[&day(18)], DayTally { done: 2, pending: 0 });
        assert_eq!(report.total_done(), 3);
        assert_eq!(report.total_pending(), 1);
        assert_eq!(report.log_path, log.path());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let log = ProgressLog::new(dir.path());
        log.log_task_update("a", TaskStatus::Done, day(1)).await.unwrap();
        let mut content = std::fs::read_to_string(log.path()).unwrap();
        content.push_str("not json\n\n");
        std::fs::write(log.path(), content).unwrap();

        assert_eq!(log.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let dir = TempDir::new().unwrap();
        let log = ProgressLog::new(dir.path());

        assert!(!log.reset().await.unwrap());
        log.log_task_update("a", TaskStatus::Done, day(1)).await.unwrap();
        assert!(log.reset().await.unwrap());
        assert!(matches!(log.report().await, Err(ServiceError::NoData)));
    }

    #[test]
    fn test_render_scales_bars() {
        let mut days = BTreeMap::new();
        days.insert(day(17), DayTally { done: 2, pending: 2 });
        days.insert(day(18), DayTally { done: 1, pending: 0 });
        let report = ProgressReport {
            days,
            log_path: PathBuf::from("progress.jsonl"),
        };

        let rendered = report.render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("`2026-10-17` ██████░░░░░░ ✅ 2 ⏳ 2"));
        assert!(lines[2].starts_with("`2026-10-18` ███ ✅ 1 ⏳ 0"));
        assert_eq!(lines[3], "Total: ✅ 3 done · ⏳ 2 pending");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let entry = ProgressEntry {
            date: day(5),
            task: "x".to_string(),
            status: TaskStatus::Pending,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"date":"2026-10-05","task":"x","status":"pending"}"#
        );
    }
}
