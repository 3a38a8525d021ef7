//! CLI entry point for Concierge.
//!
//! This binary provides the `concierge` command with subcommands for
//! chatting with the assistant, classifying single messages, listing the
//! built-in flows and checking collaborator status.

mod cli;
mod config;
mod helpers;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;

use concierge_dialog::{FlowRegistry, NextStep};
use concierge_kernel::{IntentClassifier, SessionContext};

use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, StoreBackend};
use crate::helpers::{init_tracing, open_catalog, open_database};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = config::load(&cli.config)?;

    match cli.command {
        Commands::Chat { db, ephemeral } => repl::cmd_chat(config, db, ephemeral).await,
        Commands::Classify { text } => cmd_classify(&config, &text),
        Commands::Flows { json } => cmd_flows(&config, json),
        Commands::Status => cmd_status(&config, &cli.config).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: classify
// ---------------------------------------------------------------------------

fn cmd_classify(config: &AppConfig, text: &str) -> Result<()> {
    init_tracing("warn", config.log_format);
    let classifier = IntentClassifier::hospitality().context("failed to build classifier")?;
    let classification = classifier.classify(text, &SessionContext::new("cli"));

    let output = serde_json::json!({
        "intent": classification.intent,
        "module": classification.module,
        "confidence": classification.confidence,
        "actionable": classification.confidence >= config.engine.confidence_threshold,
        "entities": classification.entities,
        "source": classification.source,
        "normalized_text": classification.normalized_text,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: flows
// ---------------------------------------------------------------------------

fn cmd_flows(config: &AppConfig, json: bool) -> Result<()> {
    init_tracing("warn", config.log_format);
    let registry = FlowRegistry::hospitality().context("failed to load built-in flows")?;
    let flows = registry.list();

    if json {
        let definitions: Vec<_> = flows.iter().map(|f| f.as_ref()).collect();
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!();
    for flow in &flows {
        println!("  {} -- {}", flow.id, flow.name);
        if !flow.description.is_empty() {
            println!("    {}", flow.description);
        }
        println!("    triggered by: {}", flow.trigger_intents.join(", "));
        for (i, step) in flow.steps.iter().enumerate() {
            let next = match &step.next {
                NextStep::Default => String::new(),
                NextStep::Goto(target) => format!(" -> {target}"),
                NextStep::Branch(rule) => format!(" -> {}", rule.targets().join(" | ")),
                NextStep::Finish => " -> (end)".to_string(),
            };
            println!("    {:>2}. {:<22} {:?}{next}", i + 1, step.id, step.kind);
        }
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: status
// ---------------------------------------------------------------------------

async fn cmd_status(config: &AppConfig, config_path: &std::path::Path) -> Result<()> {
    init_tracing("warn", config.log_format);

    println!();
    println!("  Concierge Status");
    println!("  ================");
    println!();

    if config_path.exists() {
        println!("  Config:           OK ({})", config_path.display());
    } else {
        println!("  Config:           DEFAULTS ({} not found)", config_path.display());
    }

    let engine = &config.engine;
    println!(
        "  Engine:           threshold {:.2}, escalation after {}, flow timeout {}s",
        engine.confidence_threshold, engine.escalation_threshold, engine.flow_timeout_secs
    );

    match open_catalog(config) {
        Ok(catalog) => match catalog.rooms() {
            Ok(rooms) => println!("  Catalog:          OK ({} rooms)", rooms.len()),
            Err(e) => println!("  Catalog:          UNAVAILABLE ({e})"),
        },
        Err(e) => println!("  Catalog:          ERROR ({e:#})"),
    }

    match config.store_backend {
        StoreBackend::Memory => println!("  Store:            in-memory"),
        StoreBackend::Sqlite if config.db_path.exists() => {
            match open_database(&config.db_path).await {
                Ok(_) => println!("  Store:            OK ({})", config.db_path.display()),
                Err(e) => println!("  Store:            ERROR ({e:#})"),
            }
        }
        StoreBackend::Sqlite => println!(
            "  Store:            NOT INITIALIZED ({} is created on first chat)",
            config.db_path.display()
        ),
    }

    let classifier = IntentClassifier::hospitality().context("failed to build classifier")?;
    let registry = FlowRegistry::hospitality().context("failed to load built-in flows")?;
    println!("  Intents:          {}", classifier.catalog().len());
    println!("  Flows:            {}", registry.len());
    println!();

    Ok(())
}
