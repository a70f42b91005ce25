//! Providers Command
//!
//! List the provider capability table with per-request input budgets.

use console::style;

use crate::cli::util::CommandContext;
use crate::types::Result;

pub fn run(ctx: &CommandContext, format: &str) -> Result<()> {
    let registry = ctx.config.registry()?;
    let options = ctx.config.load_options();

    if format == "json" {
        let rows: Vec<_> = registry
            .profiles()
            .iter()
            .map(|p| {
                serde_json::json!({
                    "provider": p.provider,
                    "model": p.model,
                    "contextWindow": p.context_window,
                    "maxInputTokens": p.max_input_tokens,
                    "maxOutputTokens": p.max_output_tokens,
                    "costPer1kTokens": p.cost_per_1k_tokens,
                    "inputBudget": p.input_budget(options.max_utilization_percentage, options.max_tokens),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "Providers (budget at {:.0}% utilization)",
            options.max_utilization_percentage
        ))
        .bold()
    );
    println!("══════════════════════════════════════════════════════════════════");
    if registry.is_empty() {
        println!("No providers configured.");
        return Ok(());
    }
    println!(
        "  {:<12} {:<18} {:>10} {:>10} {:>10} {:>9}",
        "PROVIDER", "MODEL", "WINDOW", "MAX IN", "BUDGET", "$/1K"
    );
    for p in registry.profiles() {
        println!(
            "  {:<12} {:<18} {:>10} {:>10} {:>10} {:>9.5}",
            p.provider,
            p.model,
            p.context_window,
            p.max_input_tokens,
            p.input_budget(options.max_utilization_percentage, options.max_tokens),
            p.cost_per_1k_tokens
        );
    }
    Ok(())
}
