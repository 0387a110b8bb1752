//! Execution history CLI command.

use std::collections::HashMap;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use tripwire_types::agent::AgentId;
use tripwire_types::execution::ExecutionResult;

use crate::state::AppState;

pub async fn list_executions(
    state: &AppState,
    agent: Option<&str>,
    limit: Option<u32>,
    json: bool,
) -> Result<()> {
    let agent_id = agent
        .map(|raw| {
            raw.parse::<AgentId>()
                .with_context(|| format!("'{raw}' is not a valid agent id"))
        })
        .transpose()?;

    let executions = state.engine.tracker().query(agent_id.as_ref(), limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&executions)?);
        return Ok(());
    }

    if executions.is_empty() {
        println!();
        println!("  {} No executions recorded yet.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let names: HashMap<AgentId, String> = state
        .registry()
        .list()
        .await
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Agent").fg(Color::White),
        Cell::new("Trigger").fg(Color::White),
        Cell::new("Event").fg(Color::White),
        Cell::new("Result").fg(Color::White),
        Cell::new("Duration").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for execution in &executions {
        let agent_name = names
            .get(&execution.agent_id)
            .cloned()
            .unwrap_or_else(|| format!("{} (deleted)", short_id(&execution.agent_id)));

        table.add_row(vec![
            Cell::new(execution.timestamp.format("%Y-%m-%d %H:%M:%S")).fg(Color::DarkGrey),
            Cell::new(agent_name).fg(Color::Cyan),
            Cell::new(&execution.trigger_id),
            Cell::new(&execution.event_type),
            result_cell(execution),
            Cell::new(format!("{} ms", execution.total_execution_time_ms)),
            Cell::new(execution.error.as_deref().unwrap_or("")).fg(Color::Red),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

fn result_cell(execution: &ExecutionResult) -> Cell {
    let ok = execution.action_results.iter().filter(|r| r.success).count();
    let total = execution.action_results.len();
    if execution.success {
        Cell::new(format!("✓ {ok}/{total}")).fg(Color::Green)
    } else {
        Cell::new(format!("✗ {ok}/{total}")).fg(Color::Red)
    }
}

fn short_id(id: &AgentId) -> String {
    id.to_string().chars().take(8).collect()
}
