use crate::adapters::site::SiteAdapter;
use crate::core::deadline::Deadline;
use crate::core::download::DownloadResolver;
use crate::core::export::ExportTrigger;
use crate::core::filter::FilterSelector;
use crate::domain::model::{CrawlRequest, DocumentTask, PeriodSelector};
use crate::domain::ports::{BrowserLauncher, BrowserSession, RemotePage};
use crate::utils::error::{CrawlError, CrawlFailure, Stage};
use crate::utils::monitor::SystemMonitor;
use std::path::PathBuf;

type StepResult<T> = std::result::Result<T, (Stage, CrawlError)>;

fn at(stage: Stage) -> impl FnOnce(CrawlError) -> (Stage, CrawlError) {
    move |error| (stage, error)
}

/// Drives one crawl: opens a browser session, collects every document the
/// period has, and tears the session down whatever happened.
pub struct CrawlEngine<L: BrowserLauncher> {
    launcher: L,
    base_url: Option<String>,
    monitor: SystemMonitor,
}

impl<L: BrowserLauncher> CrawlEngine<L> {
    pub fn new(launcher: L) -> Self {
        Self::new_with_monitoring(launcher, false)
    }

    pub fn new_with_monitoring(launcher: L, monitor_enabled: bool) -> Self {
        Self {
            launcher,
            base_url: None,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Points every portal generation at another host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn adapter_for(&self, request: &CrawlRequest) -> SiteAdapter {
        let adapter = SiteAdapter::for_period(request.period);
        match &self.base_url {
            Some(url) => adapter.with_base_url(url.clone()),
            None => adapter,
        }
    }

    /// Returns the canonical paths of the collected spreadsheets, payroll
    /// first. Nothing is returned on failure, even if payroll was already
    /// saved; the failure lists it under `completed`.
    pub async fn run(&self, request: &CrawlRequest) -> Result<Vec<PathBuf>, CrawlFailure> {
        let deadline = Deadline::after(request.total_timeout);
        let adapter = self.adapter_for(request);
        let selector = adapter.selector(request.period).ok_or_else(|| {
            CrawlFailure::at(
                Stage::Start,
                CrawlError::invalid_input("month", request.period.month, "must be between 1 and 12"),
            )
        })?;

        tracing::info!(
            "Collecting {} from the {:?} portal ({})",
            request.period,
            adapter.generation,
            adapter.base_url
        );

        let mut session = deadline
            .guard(
                "launch browser",
                request.step_timeout,
                self.launcher.launch(&request.output_directory),
            )
            .await
            .map_err(|e| CrawlFailure::at(Stage::Start, e.into_connection()))?;

        let outcome = self
            .collect(&session, &adapter, &selector, request, &deadline)
            .await;

        session.close().await;
        self.monitor.log_final_stats();
        outcome
    }

    async fn collect(
        &self,
        session: &L::Session,
        adapter: &SiteAdapter,
        selector: &PeriodSelector,
        request: &CrawlRequest,
        deadline: &Deadline,
    ) -> Result<Vec<PathBuf>, CrawlFailure> {
        let mut completed = Vec::new();
        for kind in adapter.documents(request.period) {
            let task = DocumentTask::new(kind, request.period);
            match self
                .collect_document(session, adapter, selector, request, deadline, &task)
                .await
            {
                Ok(path) => {
                    tracing::info!("Saved {}", path.display());
                    completed.push(path);
                    self.monitor.log_stats(kind.slug());
                }
                Err((stage, error)) => {
                    tracing::error!("{} failed for {}: {}", stage, kind.slug(), error);
                    return Err(CrawlFailure {
                        stage,
                        document: Some(kind),
                        completed,
                        error,
                    });
                }
            }
        }
        Ok(completed)
    }

    async fn collect_document(
        &self,
        session: &L::Session,
        adapter: &SiteAdapter,
        selector: &PeriodSelector,
        request: &CrawlRequest,
        deadline: &Deadline,
        task: &DocumentTask,
    ) -> StepResult<PathBuf> {
        let document = task.kind.slug();
        let period = request.period;

        tracing::info!("Opening {} ({})...", document, period);
        tracing::debug!("{:?} left before the deadline", deadline.remaining());
        deadline
            .guard("navigate", request.step_timeout, session.navigate(&adapter.base_url))
            .await
            .map_err(|e| (Stage::Navigated, e.into_connection()))?;
        deadline
            .settle("page settle", request.inter_step_delay)
            .await
            .map_err(at(Stage::Navigated))?;

        deadline
            .guard(
                "open section",
                request.step_timeout,
                session.click(adapter.section(task.kind)),
            )
            .await
            .map_err(at(Stage::SectionOpened))?;
        deadline
            .settle("section settle", request.inter_step_delay)
            .await
            .map_err(at(Stage::SectionOpened))?;

        tracing::info!("Selecting {}...", period);
        FilterSelector::new(session, deadline, request.step_timeout, request.inter_step_delay)
            .apply(adapter, selector)
            .await
            .map_err(at(Stage::FilterApplied))?;

        let resolver = DownloadResolver::new(&request.output_directory);
        let before = resolver.snapshot().map_err(at(Stage::Exported))?;

        tracing::info!("Exporting {} ({})...", document, task.canonical_name);
        ExportTrigger::new(
            session,
            deadline,
            request.per_file_timeout,
            request.inter_step_delay,
        )
        .trigger(adapter, period)
        .await
        .map_err(at(Stage::Exported))?;

        resolver
            .await_download(
                deadline,
                &task.canonical_name,
                &before,
                request.per_file_timeout,
            )
            .await
            .map_err(at(Stage::Downloaded))
    }
}
