//! Services command implementation.

use super::helpers::status_mark;
use crate::cli::{RuntimeConfig, ServiceAction};
use crate::error::Result;
use crate::operator::{Operator, TerminalOperator};
use crate::system::{ServiceManager, Systemd};
use crate::workflow::WorkflowStep;

/// Execute services command; exits 1 when any service is down
pub(super) async fn execute_services(config: &RuntimeConfig) -> Result<i32> {
    let systemd = Systemd;
    let mut down = 0;

    let _ = config.output().section("Services");
    for service in config.settings.services.restart_order() {
        let active = systemd.is_active(&service).await?;
        if !active {
            down += 1;
        }
        config.println(&format!(
            "{} {} ({})",
            status_mark(active),
            service,
            if active { "running" } else { "not running" }
        ));
    }

    if down == 0 {
        config.success_println("All services running");
        Ok(0)
    } else {
        config.warning_println(&format!("{} service(s) not running", down));
        Ok(1)
    }
}

/// Start, stop or restart one configured service after confirmation
pub(super) async fn execute_service_action(
    action: &ServiceAction,
    config: &RuntimeConfig,
) -> Result<i32> {
    let service = action.service();
    let known = config.settings.services.restart_order();
    if !known.iter().any(|s| s == service) {
        config.warning_println(&format!(
            "'{}' is not a configured service (known: {})",
            service,
            known.join(", ")
        ));
        return Ok(1);
    }

    let operator = TerminalOperator::new(config.output().clone());
    let question = format!("{} {}?", capitalize(action.verb()), service);
    if !operator.confirm(WorkflowStep::ServicesRestarted, &question)? {
        config.warning_println(&format!("{} left as is", service));
        return Ok(2);
    }

    let systemd = Systemd;
    match action {
        ServiceAction::Start { .. } => systemd.start(service).await?,
        ServiceAction::Stop { .. } => systemd.stop(service).await?,
        ServiceAction::Restart { .. } => systemd.restart(service).await?,
    }
    config.success_println(&format!("systemctl {} {} done", action.verb(), service));
    Ok(0)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
