//! Subcommand: `concierge chat`, an interactive terminal conversation.

use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use concierge_dialog::{Concierge, TurnResponse};

use crate::config::{AppConfig, StoreBackend};
use crate::helpers::{init_tracing, open_catalog, open_store};

pub async fn cmd_chat(mut config: AppConfig, db: Option<PathBuf>, ephemeral: bool) -> Result<()> {
    init_tracing(&config.log_level, config.log_format);
    if let Some(db) = db {
        config.db_path = db;
    }
    if ephemeral {
        config.store_backend = StoreBackend::Memory;
    }

    let catalog = open_catalog(&config)?;
    let store = open_store(&config).await?;
    let concierge = Concierge::new(config.engine.clone(), catalog, store)
        .context("failed to build the conversation engine")?;
    let sweeper = concierge.spawn_sweeper();

    let mut ctx = concierge.start_session().await;

    println!();
    println!("  Concierge v{}", env!("CARGO_PKG_VERSION"));
    println!("  Session: {}", ctx.session_id);
    println!("  Ask about rooms, dining, the spa or the hotel. Type 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut line_buf = String::new();

    loop {
        print!("you> ");
        io::stdout().flush().ok();

        line_buf.clear();
        match stdin.read_line(&mut line_buf) {
            Ok(0) => {
                println!();
                info!("EOF received, exiting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("  Error reading input: {e}");
                continue;
            }
        }

        let trimmed = line_buf.trim();
        if trimmed == "quit" || trimmed == "exit" {
            info!("user requested exit");
            break;
        }

        let outcome = concierge.handle_turn(&ctx, trimmed).await;
        print_response(&outcome.response);
        ctx = outcome.context;
    }

    sweeper.shutdown().await;
    info!(session_id = %ctx.session_id, turns = ctx.visit_count, "shutting down");
    Ok(())
}

fn print_response(response: &TurnResponse) {
    println!("bot> {}", response.response_text);

    if let Some(data) = &response.response_data {
        for key in ["rooms", "items", "amenities", "departments"] {
            let Some(entries) = data.get(key).and_then(|v| v.as_array()) else {
                continue;
            };
            for entry in entries {
                println!("       - {}", describe(key, entry));
            }
        }
    }

    tracing::debug!(
        intent = %response.intent,
        confidence = response.confidence,
        error_code = ?response.error_code,
        "reply"
    );
    println!();
}

/// One-line summary of a catalog entry.
fn describe(kind: &str, entry: &serde_json::Value) -> String {
    let text = |key: &str| entry.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    let number = |key: &str| entry.get(key).and_then(|v| v.as_f64());

    match kind {
        "rooms" => format!(
            "{} ({}): {:.0} per night, up to {} guests",
            text("name"),
            text("id"),
            number("price_per_night").unwrap_or_default(),
            entry.get("max_guests").and_then(|v| v.as_u64()).unwrap_or_default(),
        ),
        "items" => format!("{}: {:.2}", text("name"), number("price").unwrap_or_default()),
        "amenities" => match number("price") {
            Some(price) => format!("{}: {price:.0}", text("name")),
            None => format!("{} (free for guests)", text("name")),
        },
        "departments" => format!("{}: {}, {} ({})", text("name"), text("phone"), text("email"), text("hours")),
        _ => entry.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn describes_catalog_entries() {
        let room = json!({"id": "dlx-201", "name": "Deluxe King", "price_per_night": 199.0, "max_guests": 2});
        assert_eq!(
            describe("rooms", &room),
            "Deluxe King (dlx-201): 199 per night, up to 2 guests"
        );

        let pool = json!({"name": "Rooftop Pool", "price": null});
        assert_eq!(describe("amenities", &pool), "Rooftop Pool (free for guests)");

        let desk = json!({"name": "Front Desk", "phone": "ext. 0", "email": "fd@h", "hours": "24/7"});
        assert_eq!(describe("departments", &desk), "Front Desk: ext. 0, fd@h (24/7)");
    }
}
