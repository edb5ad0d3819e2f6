//! Cache, search index, service restart and verification.

use super::{UpgradeEngine, WorkflowStep};
use crate::error::{CommandError, Result, UpgradeError, WorkflowError};
use crate::operator::{NoticeLevel, Operator};
use crate::state::{UpgradeLogEntry, WorkflowState};
use crate::system::{CacheTool, InstanceStatus, SearchIndexer, ServiceManager, Toolbox};
use crate::version::TargetRef;

impl<T: Toolbox, O: Operator> UpgradeEngine<'_, T, O> {
    pub(super) async fn clear_cache(&self, state: &mut WorkflowState) -> Result<()> {
        let step = WorkflowStep::CacheCleared;
        if !self.ask(state, step, "Clear the application cache?")? {
            self.skip(state, step, "declined");
            return Ok(());
        }
        self.transition(state, step)?;
        self.tools.cache().clear().await?;
        self.notify(NoticeLevel::Success, "Cache cleared");
        Ok(())
    }

    pub(super) async fn rebuild_search(&self, state: &mut WorkflowState) -> Result<()> {
        let step = WorkflowStep::SearchIndexed;
        let search = &self.config.search;
        if !search.enabled {
            log::info!("Search disabled; not rebuilding the index");
            state.mark_skipped(step);
            return Ok(());
        }

        let question = format!(
            "Rebuild the search index ({}) with {} worker(s)?",
            search.entities.join(", "),
            search.concurrency
        );
        if !self.ask(state, step, &question)? {
            self.skip(state, step, "declined");
            return Ok(());
        }

        self.transition(state, step)?;
        let indexer = self.tools.search();
        indexer.reset().await?;
        for entity in &search.entities {
            log::info!("Reindexing {}", entity);
            indexer
                .rebuild(entity, search.concurrency, search.batch_size)
                .await?;
        }
        self.notify(NoticeLevel::Success, "Search index rebuilt");
        Ok(())
    }

    pub(super) async fn restart_services(&self, state: &mut WorkflowState) -> Result<()> {
        let step = WorkflowStep::ServicesRestarted;
        let order = self.config.services.restart_order();
        let question = format!("Restart {} (in this order)?", order.join(", "));
        if !self.ask(state, step, &question)? {
            return Err(UpgradeError::aborted(
                step,
                "restart declined; the new code is not running",
            ));
        }

        self.transition(state, step)?;
        let services = self.tools.services();
        for service in order {
            services.restart(&service).await?;
            self.notify(NoticeLevel::Success, &format!("Restarted {}", service));
            state.restarted_services.push(service);
        }
        Ok(())
    }

    pub(super) async fn verify(
        &self,
        state: &mut WorkflowState,
        target: &TargetRef,
    ) -> Result<UpgradeLogEntry> {
        let services = self.tools.services();

        let mut stopped = Vec::new();
        for service in self.config.services.restart_order() {
            if !services.is_active(&service).await? {
                stopped.push(service);
            }
        }
        if !stopped.is_empty() {
            return Err(WorkflowError::ServicesNotRunning { services: stopped }.into());
        }

        let to_version = match self.tools.instance().current_version().await {
            Ok(version) => version,
            Err(e) => {
                log::warn!("Could not read the new version, recording the target: {}", e);
                target.label().to_string()
            }
        };

        self.show_log_tail().await;

        self.transition(state, WorkflowStep::Verified)?;
        let entry = UpgradeLogEntry::now(
            state.from_version.clone().unwrap_or_else(|| "unknown".to_string()),
            to_version,
            state.commits_behind.unwrap_or(0),
        );
        if let Err(e) = self.history.append(&entry) {
            self.notify(
                NoticeLevel::Warning,
                &format!(
                    "Could not write {}: {}",
                    self.history.path().display(),
                    e
                ),
            );
        }
        self.notify(
            NoticeLevel::Success,
            &format!(
                "Upgraded from {} to {}",
                entry.from_version, entry.to_version
            ),
        );
        Ok(entry)
    }

    /// Show the web service's recent log, bounded by the configured timeout
    async fn show_log_tail(&self) {
        let settings = &self.config.services;
        let Some(web) = settings.web.first() else {
            return;
        };

        let tail = self.tools.services().tail_logs(web, settings.log_tail_lines);
        match tokio::time::timeout(settings.log_tail_timeout(), tail).await {
            Ok(Ok(lines)) => {
                self.notify(NoticeLevel::Info, &format!("Recent {} log:", web));
                for line in lines.lines() {
                    self.notify(NoticeLevel::Info, &format!("  {}", line));
                }
            }
            Ok(Err(e)) => self.notify(
                NoticeLevel::Warning,
                &format!("Could not read {} logs: {}", web, e),
            ),
            Err(_) => {
                let timeout = CommandError::Timeout {
                    command: format!("journalctl -u {}", web),
                    seconds: settings.log_tail_timeout_secs,
                };
                self.notify(NoticeLevel::Warning, &timeout.to_string());
            }
        }
    }
}
