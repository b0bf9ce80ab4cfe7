//! Task status tracking in the shared processing spreadsheet
//!
//! Each worksheet covers one era and version (title contains e.g. `2023C`
//! and `v1`). Rows are selections; the columns after the selection name hold
//! the two dataset versions and the two NLayers passes.

pub mod google;

pub use google::GoogleSheetsClient;

use crate::error::{CrabError, Result};
use crate::status::{parse_task_name, TaskState};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub id: i64,
    pub title: String,
}

/// 1-based row and column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn offset_cols(self, by: u32) -> Self {
        Self {
            row: self.row,
            col: self.col + by,
        }
    }

    /// `B3` style address
    pub fn a1(self) -> String {
        let mut col = self.col;
        let mut letters = Vec::new();
        while col > 0 {
            let rem = (col - 1) % 26;
            letters.push(char::from(b'A' + rem as u8));
            col = (col - 1) / 26;
        }
        letters.reverse();
        format!("{}{}", letters.into_iter().collect::<String>(), self.row)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub red: f32,
    pub green: f32,
    pub blue: f32,
}

impl Color {
    pub const GREEN: Self = Self { red: 0.0, green: 1.0, blue: 0.0 };
    pub const YELLOW: Self = Self { red: 1.0, green: 1.0, blue: 0.0 };
    pub const RED: Self = Self { red: 1.0, green: 0.0, blue: 0.0 };

    /// Unknown tasks are left unformatted
    pub fn for_state(state: TaskState) -> Option<Self> {
        match state {
            TaskState::Finished => Some(Self::GREEN),
            TaskState::Processing => Some(Self::YELLOW),
            TaskState::Failed => Some(Self::RED),
            TaskState::Unknown => None,
        }
    }
}

#[async_trait]
pub trait SheetClient: Send + Sync {
    /// First worksheet whose title contains both fragments
    async fn find_worksheet(&self, era: &str, version: &str) -> Result<Option<Worksheet>>;

    /// First cell whose text equals `text`
    async fn find_cell(&self, sheet: &Worksheet, text: &str) -> Result<Option<CellRef>>;

    async fn read_cell(&self, sheet: &Worksheet, cell: CellRef) -> Result<Option<String>>;

    async fn write_cell(&self, sheet: &Worksheet, cell: CellRef, value: &str) -> Result<()>;

    async fn format_cell(&self, sheet: &Worksheet, cell: CellRef, color: Color) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetUpdate {
    Updated { sheet: String, cell: String },
    /// Cell already filled and `force` not given
    KeptExisting { sheet: String, cell: String },
    Skipped(String),
}

pub struct TaskSheetUpdater {
    client: Arc<dyn SheetClient>,
    backoff: Duration,
}

impl TaskSheetUpdater {
    pub fn new(client: Arc<dyn SheetClient>, backoff: Duration) -> Self {
        Self { client, backoff }
    }

    /// Record `entry` for the task and colour the cell by state
    ///
    /// A rate-limit error gets exactly one retry after the back-off.
    pub async fn update(
        &self,
        task_name: &str,
        state: TaskState,
        entry: &str,
        force: bool,
    ) -> Result<SheetUpdate> {
        match self.try_update(task_name, state, entry, force).await {
            Err(CrabError::RateLimit { .. }) => {
                tracing::debug!(
                    "Spreadsheet API rate limit reached, waiting {:?} before retrying",
                    self.backoff
                );
                tokio::time::sleep(self.backoff).await;
                self.try_update(task_name, state, entry, force).await
            }
            other => other,
        }
    }

    async fn try_update(
        &self,
        task_name: &str,
        state: TaskState,
        entry: &str,
        force: bool,
    ) -> Result<SheetUpdate> {
        let task = match parse_task_name(task_name) {
            Ok(task) => task,
            Err(_) => return Ok(skipped(format!("cannot parse task name {task_name}"))),
        };
        let (Some(era_version), Some(dataset_version)) =
            (task.era_version.as_deref(), task.dataset_version.as_deref())
        else {
            return Ok(skipped(format!(
                "task name {task_name} carries no era or dataset version"
            )));
        };

        let offset = match (task.is_nlayers(), dataset_version) {
            (false, "0") => 1,
            (false, "1") => 2,
            (true, "0") => 3,
            (true, "1") => 4,
            _ => {
                return Ok(skipped(format!(
                    "unsupported dataset version {dataset_version} in {task_name}"
                )))
            }
        };

        let era = format!("{}{}", task.year, task.era);
        let version = format!("v{era_version}");
        let Some(sheet) = self.client.find_worksheet(&era, &version).await? else {
            return Ok(skipped(format!("no worksheet for {era} {version}")));
        };
        let Some(selection) = self.client.find_cell(&sheet, &task.selection).await? else {
            return Ok(skipped(format!(
                "selection {} not in worksheet {}",
                task.selection, sheet.title
            )));
        };

        let cell = selection.offset_cols(offset);
        if !force {
            let existing = self.client.read_cell(&sheet, cell).await?;
            if existing.is_some_and(|v| !v.trim().is_empty()) {
                tracing::warn!(
                    "Cell {} of {} already has a value; pass force to overwrite",
                    cell.a1(),
                    sheet.title
                );
                return Ok(SheetUpdate::KeptExisting {
                    sheet: sheet.title,
                    cell: cell.a1(),
                });
            }
        }

        self.client.write_cell(&sheet, cell, entry).await?;
        match Color::for_state(state) {
            Some(color) => self.client.format_cell(&sheet, cell, color).await?,
            None => tracing::debug!("Unknown state for {}, cell left unformatted", task_name),
        }

        Ok(SheetUpdate::Updated {
            sheet: sheet.title,
            cell: cell.a1(),
        })
    }
}

fn skipped(reason: String) -> SheetUpdate {
    tracing::error!("Spreadsheet not updated: {}", reason);
    SheetUpdate::Skipped(reason)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory worksheet set; can fail the first N calls with a rate limit
    #[derive(Default)]
    pub struct MemorySheet {
        pub titles: Vec<String>,
        pub cells: Mutex<HashMap<(String, u32, u32), String>>,
        pub formats: Mutex<Vec<(String, CellRef, Color)>>,
        pub rate_limited_calls: AtomicUsize,
        pub calls: AtomicUsize,
    }

    impl MemorySheet {
        pub fn new(titles: &[&str]) -> Self {
            Self {
                titles: titles.iter().map(|t| t.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn set(&self, sheet: &str, row: u32, col: u32, value: &str) {
            self.cells
                .lock()
                .unwrap()
                .insert((sheet.to_string(), row, col), value.to_string());
        }

        pub fn get(&self, sheet: &str, row: u32, col: u32) -> Option<String> {
            self.cells
                .lock()
                .unwrap()
                .get(&(sheet.to_string(), row, col))
                .cloned()
        }

        fn gate(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.rate_limited_calls.load(Ordering::SeqCst);
            if remaining > 0 {
                self.rate_limited_calls.store(remaining - 1, Ordering::SeqCst);
                return Err(CrabError::rate_limit("quota exceeded"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SheetClient for MemorySheet {
        async fn find_worksheet(&self, era: &str, version: &str) -> Result<Option<Worksheet>> {
            self.gate()?;
            Ok(self
                .titles
                .iter()
                .enumerate()
                .find(|(_, t)| t.contains(era) && t.contains(version))
                .map(|(i, t)| Worksheet {
                    id: i as i64,
                    title: t.clone(),
                }))
        }

        async fn find_cell(&self, sheet: &Worksheet, text: &str) -> Result<Option<CellRef>> {
            self.gate()?;
            let cells = self.cells.lock().unwrap();
            let mut hits: Vec<CellRef> = cells
                .iter()
                .filter(|((s, _, _), v)| s == &sheet.title && v.as_str() == text)
                .map(|((_, row, col), _)| CellRef { row: *row, col: *col })
                .collect();
            hits.sort_by_key(|c| (c.row, c.col));
            Ok(hits.into_iter().next())
        }

        async fn read_cell(&self, sheet: &Worksheet, cell: CellRef) -> Result<Option<String>> {
            self.gate()?;
            Ok(self.get(&sheet.title, cell.row, cell.col))
        }

        async fn write_cell(&self, sheet: &Worksheet, cell: CellRef, value: &str) -> Result<()> {
            self.gate()?;
            self.set(&sheet.title, cell.row, cell.col, value);
            Ok(())
        }

        async fn format_cell(&self, sheet: &Worksheet, cell: CellRef, color: Color) -> Result<()> {
            self.gate()?;
            self.formats
                .lock()
                .unwrap()
                .push((sheet.title.clone(), cell, color));
            Ok(())
        }
    }
}
