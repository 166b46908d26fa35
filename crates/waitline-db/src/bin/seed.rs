//! # Seed Data Generator
//!
//! Populates the database with demo queues (and optionally waiting
//! customers) for development.
//!
//! ## Usage
//! ```bash
//! # Create the demo queues only
//! cargo run -p waitline-db --bin seed
//!
//! # Also put 12 customers in every demo queue for today
//! cargo run -p waitline-db --bin seed -- --entries 12
//!
//! # Specify database path
//! cargo run -p waitline-db --bin seed -- --db ./data/waitline.db
//! ```
//!
//! ## Generated Queues
//! One company (`demo`) with a queue per notification channel, so every
//! dispatcher path can be exercised from a dashboard.

use chrono::Utc;
use std::env;
use waitline_core::{ChannelKind, QueueConfiguration};
use waitline_db::{Database, DbConfig, NewEntry};

const COMPANY_ID: &str = "demo";

/// (queue_id, name, tolerance minutes, max party, channel, avg service minutes)
const QUEUES: &[(&str, &str, i64, i64, ChannelKind, i64)] = &[
    ("front-desk", "Front desk", 10, 6, ChannelKind::Sms, 5),
    ("terrace", "Terrace tables", 15, 8, ChannelKind::ChatTemplate, 12),
    ("pharmacy", "Pharmacy counter", 5, 1, ChannelKind::Email, 3),
];

const FIRST_NAMES: &[&str] = &[
    "Ada", "Grace", "Alan", "Edsger", "Barbara", "Donald", "Margaret", "Ken",
    "Frances", "Niklaus", "Radia", "Dennis",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut entries: usize = 0;
    let mut db_path = String::from("./waitline_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--entries" | "-e" => {
                if i + 1 < args.len() {
                    entries = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Waitline Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -e, --entries <N>  Waiting customers per queue for today (default: 0)");
                println!("  -d, --db <PATH>    Database file path (default: ./waitline_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Waitline Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!("Entries per queue: {}", entries);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");
    println!();

    let now = Utc::now();
    let today = now.date_naive();

    for (queue_id, name, tolerance, max_party, channel, avg_minutes) in QUEUES {
        let config = QueueConfiguration {
            company_id: COMPANY_ID.to_string(),
            queue_id: queue_id.to_string(),
            name: name.to_string(),
            tolerance_minutes: *tolerance,
            min_party_size: 1,
            max_party_size: *max_party,
            active_from: None,
            active_until: None,
            is_active: true,
            default_channel: *channel,
            average_service_minutes: *avg_minutes,
            updated_at: now,
        };
        db.queues().upsert(&config).await?;
        println!("✓ Queue {}/{} ({}, {} min tolerance)", COMPANY_ID, queue_id, channel, tolerance);

        let mut inserted = 0;
        for n in 0..entries {
            let new_entry = generate_entry(queue_id, *channel, *max_party, n, now);
            match db.entries().insert(&new_entry).await {
                Ok(_) => inserted += 1,
                // Re-running the seed on the same day hits the one-per-day index.
                Err(e) if e.is_unique_violation() => {}
                Err(e) => eprintln!("Failed to insert {}: {}", new_entry.customer_id, e),
            }
        }

        if entries > 0 {
            let waiting = db.entries().list_waiting(COMPANY_ID, queue_id, today).await?;
            println!("  {} inserted, {} waiting today", inserted, waiting.len());
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates one waiting customer with contact data for `channel`.
fn generate_entry(
    queue_id: &str,
    channel: ChannelKind,
    max_party: i64,
    seed: usize,
    now: chrono::DateTime<Utc>,
) -> NewEntry {
    let name = FIRST_NAMES[seed % FIRST_NAMES.len()];
    let customer_id = format!("{}-cust-{:04}", queue_id, seed);

    let (phone, email) = match channel {
        ChannelKind::Sms | ChannelKind::ChatTemplate => {
            (Some(format!("+55119{:08}", seed * 7919 % 100_000_000)), None)
        }
        ChannelKind::Email => (None, Some(format!("{}.{}@example.com", name.to_lowercase(), seed))),
    };

    NewEntry {
        company_id: COMPANY_ID.to_string(),
        queue_id: queue_id.to_string(),
        movement_date: now.date_naive(),
        customer_id,
        display_name: format!("{} {}", name, seed),
        phone,
        email,
        preferred_channel: None,
        party_size: 1 + (seed as i64 % max_party),
        entered_at: now + chrono::Duration::seconds(seed as i64),
    }
}
