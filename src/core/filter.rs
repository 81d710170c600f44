use crate::adapters::site::{DropdownWidget, SelectionStrategy, SiteAdapter};
use crate::core::deadline::Deadline;
use crate::domain::model::PeriodSelector;
use crate::domain::ports::RemotePage;
use crate::utils::error::Result;
use std::time::Duration;

/// Applies the year/month filter through the active layout. Running it again
/// against an already filtered page leaves the page as it was.
pub struct FilterSelector<'a, P: RemotePage + ?Sized> {
    page: &'a P,
    deadline: &'a Deadline,
    step_timeout: Duration,
    settle: Duration,
}

impl<'a, P: RemotePage + ?Sized> FilterSelector<'a, P> {
    pub fn new(page: &'a P, deadline: &'a Deadline, step_timeout: Duration, settle: Duration) -> Self {
        Self {
            page,
            deadline,
            step_timeout,
            settle,
        }
    }

    pub async fn apply(&self, adapter: &SiteAdapter, selector: &PeriodSelector) -> Result<()> {
        match adapter.selection {
            SelectionStrategy::ValueAssign {
                year,
                month,
                submit,
            } => {
                self.assign(year, &selector.year_label).await?;
                if let Some(month) = month {
                    self.assign(month, &selector.month_value).await?;
                }
                self.click(submit).await
            }
            SelectionStrategy::Dropdown { year, month } => {
                self.pick(&year, &selector.year_label).await?;
                self.pick(&month, selector.month_label).await
            }
        }
    }

    async fn assign(&self, control: &str, value: &str) -> Result<()> {
        tracing::debug!("Assigning {} to {}", value, control);
        self.deadline
            .guard("select filter value", self.step_timeout, self.page.set_value(control, value))
            .await?;
        self.deadline.settle("filter settle", self.settle).await
    }

    async fn click(&self, target: &str) -> Result<()> {
        self.deadline
            .guard("activate filter control", self.step_timeout, self.page.click(target))
            .await?;
        self.deadline.settle("filter settle", self.settle).await
    }

    /// Dropdowns toggle: opening one that already shows the wanted label and
    /// clicking the same option again can leave it closed on the wrong value.
    async fn pick(&self, widget: &DropdownWidget, label: &str) -> Result<()> {
        let current = self
            .deadline
            .guard("read filter value", self.step_timeout, self.page.text_of(widget.current))
            .await?;
        if current == label {
            tracing::debug!("Filter already shows {}, skipping", label);
            return Ok(());
        }

        tracing::debug!("Switching filter from {:?} to {}", current, label);
        self.click(widget.opener).await?;
        if widget.open_twice {
            self.click(widget.opener).await?;
        }
        self.click(&widget.option_for(label)).await
    }
}
