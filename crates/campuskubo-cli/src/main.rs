//! Operator commands for a CampusKubo database.
//!
//! - `init [--seed]` - Create or migrate the schema, seeding when empty
//! - `cleanup-tokens` - Delete expired password-reset tokens
//! - `stats` - Print the admin dashboard figures
//! - `activity [--limit N]` - Show the most recent audit entries

use anyhow::{Context, Result};
use campuskubo_core::ListingStatus;
use campuskubo_core::constants::ENV_DATABASE_PATH;
use campuskubo_storage::repositories::ResetTokenRepository;
use campuskubo_storage::reporting::WeeklyCount;
use campuskubo_storage::{StorageConfig, Store};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "campuskubo")]
#[command(author, version, about = "CampusKubo database maintenance", long_about = None)]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, env = ENV_DATABASE_PATH)]
    db: Option<PathBuf>,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create or migrate the schema
    Init {
        /// Seed demo data even when users exist
        #[arg(long)]
        seed: bool,
    },

    /// Delete expired password-reset tokens
    CleanupTokens,

    /// Print dashboard statistics
    Stats,

    /// Show recent activity
    Activity {
        /// Number of entries
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("campuskubo=info");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = StorageConfig::from_env().context("Invalid configuration")?;
    if let Some(db) = &cli.db {
        config.database.database_path = db.to_string_lossy().into_owned();
    }
    if let Commands::Init { seed: true } = cli.command {
        config.force_seed = true;
    }

    let path = config.database.database_path.clone();
    debug!(command = ?cli.command, %path, "Running command");
    let store = Store::open(config)
        .await
        .with_context(|| format!("Failed to open database at {path}"))?;

    let result = run(&store, &cli.command, &path).await;
    store.close().await;
    result
}

async fn run(store: &Store, command: &Commands, path: &str) -> Result<()> {
    match command {
        Commands::Init { .. } => {
            let users = store.reporting().dashboard_stats().await?.users.total();
            println!("Database ready at {path} ({users} users)");
        }
        Commands::CleanupTokens => {
            let removed = store.reset_tokens().cleanup_expired().await?;
            info!(removed, "Expired reset tokens cleaned up");
            println!("Removed {removed} expired reset token(s)");
        }
        Commands::Stats => print_stats(store).await?,
        Commands::Activity { limit } => {
            let entries = store.activity().recent(*limit).await?;
            if entries.is_empty() {
                println!("No activity recorded");
            }
            for entry in entries {
                println!(
                    "{}  {:<24} {:<28} {}",
                    entry.created_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.action,
                    entry.actor(),
                    entry.details.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn describe(label: &str, weekly: &WeeklyCount) -> String {
    let arrow = if weekly.trend.up { "up" } else { "down" };
    format!(
        "{label:<22} {:>6} this week ({}% {arrow} from {})",
        weekly.this_week, weekly.trend.percent, weekly.last_week
    )
}

async fn print_stats(store: &Store) -> Result<()> {
    let stats = store.reporting().dashboard_stats().await?;

    println!("Users");
    println!("  tenants              {:>6}", stats.users.tenants);
    println!(
        "  property managers    {:>6} ({} awaiting approval)",
        stats.users.property_managers, stats.users.pending_property_managers
    );
    println!("  admins               {:>6}", stats.users.admins);

    println!("Listings");
    for status in ListingStatus::ALL {
        println!("  {:<20} {:>6}", status.as_str(), stats.listings_with(*status));
    }

    println!("Reservations");
    println!("  total                {:>6}", stats.reservations);
    println!("  active               {:>6}", stats.active_reservations);

    println!("Net revenue            {:>12.2}", stats.net_revenue);
    println!("Open reports           {:>6}", stats.open_reports);

    println!("Trends");
    println!("  {}", describe("new users", &stats.new_users));
    println!("  {}", describe("new listings", &stats.new_listings));
    println!("  {}", describe("new reservations", &stats.new_reservations));
    Ok(())
}
