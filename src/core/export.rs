use crate::adapters::site::{ExportStrategy, SiteAdapter};
use crate::core::deadline::Deadline;
use crate::domain::model::Period;
use crate::domain::ports::RemotePage;
use crate::utils::error::{CrawlError, Result};
use std::time::Duration;

/// Row of the export link for `month`: `row_count + 1 - month`, where
/// `row_count` is the number of `<tr>` nodes on the page. Rows outside
/// `1..=row_count` are reported as unavailable.
pub fn target_row(row_count: usize, month: u32) -> Result<usize> {
    let month = usize::try_from(month).unwrap_or(usize::MAX);
    match (row_count + 1).checked_sub(month) {
        Some(row) if row >= 1 && row <= row_count => Ok(row),
        _ => Err(CrawlError::unavailable(format!(
            "results table has {} rows, no row for month {}",
            row_count, month
        ))),
    }
}

/// Activates the export control for the current page.
pub struct ExportTrigger<'a, P: RemotePage + ?Sized> {
    page: &'a P,
    deadline: &'a Deadline,
    /// Budget for the whole export action, confirmation included.
    budget: Duration,
    settle: Duration,
}

impl<'a, P: RemotePage + ?Sized> ExportTrigger<'a, P> {
    pub fn new(page: &'a P, deadline: &'a Deadline, budget: Duration, settle: Duration) -> Self {
        Self {
            page,
            deadline,
            budget,
            settle,
        }
    }

    /// Resolves the export target for `period` without activating it.
    pub async fn resolve(&self, adapter: &SiteAdapter, period: Period) -> Result<String> {
        match adapter.export {
            ExportStrategy::Fixed { target } => Ok(target.to_string()),
            ExportStrategy::RowIndexed { rows, target } => {
                let row_count = self
                    .deadline
                    .guard("count result rows", self.budget, self.page.count(rows))
                    .await?;
                let row = target_row(row_count, period.month)?;
                tracing::debug!("Export row {} of {} for month {}", row, row_count, period.month);
                Ok(target.replace("{row}", &row.to_string()))
            }
        }
    }

    pub async fn trigger(&self, adapter: &SiteAdapter, period: Period) -> Result<()> {
        let target = self.resolve(adapter, period).await?;
        self.deadline
            .guard("activate export", self.budget, self.page.click(&target))
            .await?;
        self.deadline.settle("export settle", self.settle).await?;

        if let Some(confirm) = adapter.confirm_export {
            tracing::debug!("Confirming export");
            self.deadline
                .guard("confirm export", self.budget, self.page.click(confirm))
                .await?;
            self.deadline.settle("export settle", self.settle).await?;
        }
        Ok(())
    }
}
