//! Agent CLI commands: list, show, import, delete, enable, disable.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};

use tripwire_types::agent::{Agent, AgentId, CreateAgentRequest};

use crate::state::AppState;

fn parse_id(raw: &str) -> Result<AgentId> {
    raw.parse::<AgentId>()
        .with_context(|| format!("'{raw}' is not a valid agent id"))
}

/// List all agents in a table.
pub async fn list_agents(state: &AppState, json: bool) -> Result<()> {
    let agents = state.registry().list().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if agents.is_empty() {
        println!();
        println!(
            "  {} No agents found. Create one with: {}",
            style("i").blue().bold(),
            style("tripwire agent import agent.json").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Triggers").fg(Color::White),
        Cell::new("Runs").fg(Color::White),
        Cell::new("Last Activity").fg(Color::White),
    ]);

    for agent in &agents {
        let status_cell = if agent.active {
            Cell::new("● active").fg(Color::Green)
        } else {
            Cell::new("○ disabled").fg(Color::Yellow)
        };
        let runs = format!(
            "{} ({} ok / {} failed)",
            agent.stats.total_triggers, agent.stats.successful_executions, agent.stats.failed_executions
        );
        let last = agent
            .stats
            .last_activity
            .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());

        table.add_row(vec![
            Cell::new(&agent.name).fg(Color::Cyan),
            Cell::new(agent.id.to_string()).fg(Color::DarkGrey),
            status_cell,
            Cell::new(agent.triggers.len()),
            Cell::new(runs),
            Cell::new(last).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} agent{}",
        style(agents.len()).bold(),
        if agents.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Show an agent in full.
pub async fn show_agent(state: &AppState, id: &str, json: bool) -> Result<()> {
    let agent = state.registry().get(&parse_id(id)?).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&agent)?);
        return Ok(());
    }

    println!();
    println!("  {}", style(&agent.name).cyan().bold());
    println!("  {}", style(&agent.description).dim());
    println!();

    println!("  {}", style("── Details ──").dim());
    println!("  {}       {}", style("ID:").bold(), style(agent.id.to_string()).dim());
    println!("  {}   {}", style("Status:").bold(), format_status(&agent));
    println!(
        "  {}  {} actions/trigger, {}s timeout",
        style("Limits:").bold(),
        agent.settings.max_actions_per_trigger,
        agent.settings.execution_timeout_secs
    );
    println!();

    println!("  {}", style("── Triggers ──").dim());
    if agent.triggers.is_empty() {
        println!("  (none)");
    }
    for trigger in &agent.triggers {
        println!(
            "  {} {} on {} [{}] cooldown {}s",
            style("•").dim(),
            style(&trigger.id).bold(),
            style(&trigger.event_type).yellow(),
            trigger.priority,
            trigger.cooldown
        );
        for condition in &trigger.conditions {
            let joiner = condition
                .logical_operator
                .map(|op| format!("{op:?} ").to_uppercase())
                .unwrap_or_default();
            println!(
                "      {joiner}{} {} {}",
                condition.field, condition.operator, condition.value
            );
        }
        println!("      -> {}", trigger.actions.join(", "));
    }
    println!();

    println!("  {}", style("── Actions ──").dim());
    if agent.actions.is_empty() {
        println!("  (none)");
    }
    for action in &agent.actions {
        println!(
            "  {} {} ({}) runs {}, success {:.1}%",
            style("•").dim(),
            style(&action.id).bold(),
            action.action_type(),
            action.execution_count,
            action.success_rate
        );
    }
    println!();

    println!("  {}", style("── Stats ──").dim());
    println!("  {}    {}", style("Triggers:").bold(), agent.stats.total_triggers);
    println!(
        "  {}   {} / {}",
        style("Ok/Fail:").bold(),
        agent.stats.successful_executions,
        agent.stats.failed_executions
    );
    println!(
        "  {}  {:.0} ms",
        style("Avg time:").bold(),
        agent.stats.average_response_time_ms
    );
    let mut processed: Vec<_> = agent.stats.events_processed.iter().collect();
    processed.sort();
    for (event_type, count) in processed {
        println!("  {} {event_type}: {count}", style("•").dim());
    }
    println!();

    println!("  {}", style("── Timestamps ──").dim());
    println!(
        "  {}  {}",
        style("Created:").bold(),
        agent.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!(
        "  {}  {}",
        style("Updated:").bold(),
        agent.updated_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!();

    Ok(())
}

/// Parse one agent object or an array of them.
pub fn parse_import(content: &str) -> Result<Vec<CreateAgentRequest>> {
    let value: serde_json::Value = serde_json::from_str(content).context("invalid JSON")?;
    let requests = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(requests)
}

/// Create agents from a JSON file.
pub async fn import_agents(state: &AppState, file: &Path, json: bool) -> Result<()> {
    let content = if file == Path::new("-") {
        tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin())).await??
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("failed to read {}", file.display()))?
    };
    let requests = parse_import(&content)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(format!("Importing {} agent(s)...", requests.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let mut created = Vec::with_capacity(requests.len());
    for request in requests {
        let name = request.name.clone();
        let agent = state
            .registry()
            .create(request)
            .await
            .with_context(|| format!("failed to import agent '{name}'"))?;
        created.push(agent);
    }

    spinner.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&created)?);
        return Ok(());
    }

    println!();
    for agent in &created {
        println!(
            "  {} Imported {} {}",
            style("✓").green().bold(),
            style(&agent.name).cyan(),
            style(agent.id.to_string()).dim()
        );
    }
    println!();

    Ok(())
}

/// Delete an agent with confirmation.
pub async fn delete_agent(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let id = parse_id(id)?;
    let agent = state.registry().get(&id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete agent '{}'? Execution history is kept.",
                style(&agent.name).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state.registry().delete(&id).await?;

    if json {
        println!("{}", serde_json::json!({ "deleted": true, "id": id }));
    } else {
        println!("  {} Agent '{}' deleted.", style("✓").red().bold(), agent.name);
    }

    Ok(())
}

/// Activate or deactivate an agent.
pub async fn set_active(state: &AppState, id: &str, active: bool, json: bool) -> Result<()> {
    let agent = state.registry().set_active(&parse_id(id)?, active).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&agent)?);
    } else {
        println!(
            "  {} Agent '{}' is now {}.",
            style("✓").green().bold(),
            agent.name,
            format_status(&agent)
        );
    }

    Ok(())
}

fn format_status(agent: &Agent) -> String {
    if agent.active {
        format!("{}", style("active").green())
    } else {
        format!("{}", style("disabled").yellow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_accepts_single_object_and_array() {
        let one = r#"{"name":"a","description":"d","aiConfig":{}}"#;
        assert_eq!(parse_import(one).unwrap().len(), 1);

        let many = format!("[{one},{one}]");
        let parsed = parse_import(&many).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed[0].active);
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(parse_import("not json").is_err());
        assert!(parse_import(r#"{"description":"missing name"}"#).is_err());
    }

    #[test]
    fn parse_id_rejects_non_uuid() {
        assert!(parse_id("sol-watcher").is_err());
        assert!(parse_id(&AgentId::new().to_string()).is_ok());
    }
}
