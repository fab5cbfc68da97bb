use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use crashcash_core::repositories::postgres::reward::PostgresRewardRepository;
use crashcash_core::tasks::balance_recalc::{recalculate_all_balances, recalculate_user_balance};
use crashcash_core::tasks::expiry_sweep::run_expiry_sweep;
use crashcash_core::tasks::reconciliation::reconcile_user_rewards;
use crashcash_core::Database;

#[derive(Parser, Debug, Clone)]
#[command(name = "crashcash-maint")]
#[command(author, version, about = "CrashCash ledger maintenance: expiry sweep, duplicate reconciliation, balance recalculation")]
struct Args {
    /// Mode: "sweep", "reconcile" or "recalc"
    #[arg(long, default_value = "sweep")]
    mode: String,

    /// Postgres connection URL. Falls back to DATABASE_URL.
    #[arg(long)]
    db_url: Option<String>,

    /// User to reconcile, or to limit a recalc run to. Required for
    /// --mode=reconcile.
    #[arg(long)]
    user_id: Option<Uuid>,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("crashcash=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let db_url = match args.db_url.clone() {
        Some(url) => url,
        None => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://postgres@localhost:5432/crashcash".to_string()),
    };

    let db = Database::new(&db_url).await?;
    db.migrate().await?;
    let rewards = PostgresRewardRepository::new(db.pool().clone());

    match args.mode.as_str() {
        "sweep" => {
            let summary = run_expiry_sweep(&rewards).await?;
            info!(
                "sweep complete: {} expired, {} errors",
                summary.processed_count, summary.error_count
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.error_count > 0 {
                std::process::exit(1);
            }
        }
        "reconcile" => {
            let user_id = args
                .user_id
                .ok_or_else(|| anyhow::anyhow!("--mode=reconcile requires --user-id"))?;
            let summary = reconcile_user_rewards(&rewards, user_id).await?;
            info!(
                "reconcile complete for {}: {} duplicate(s) removed, balance now {}",
                user_id, summary.deleted_count, summary.new_balance
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        "recalc" => match args.user_id {
            Some(user_id) => {
                let summary = recalculate_user_balance(&rewards, user_id).await?;
                info!(
                    "recalculated balance for {}: {}",
                    summary.user_id, summary.new_balance
                );
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            None => {
                let summary = recalculate_all_balances(&rewards).await?;
                info!(
                    "recalc complete: {} user(s) processed, {} errors",
                    summary.processed_count, summary.error_count
                );
                println!("{}", serde_json::to_string_pretty(&summary)?);
                if summary.error_count > 0 {
                    std::process::exit(1);
                }
            }
        },
        other => {
            error!("Invalid mode '{}'. Use --mode=sweep, --mode=reconcile or --mode=recalc.", other);
            std::process::exit(2);
        }
    }

    Ok(())
}
