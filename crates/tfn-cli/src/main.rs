use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tfn")]
#[command(about = "Tiffin service operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Expire subscriptions whose end date has passed
    Sweep {
        /// Business date to sweep as of (YYYY-MM-DD). Defaults to today in the configured timezone.
        #[arg(long)]
        today: Option<String>,
    },

    /// Billing commands
    Bill {
        #[command(subcommand)]
        cmd: BillCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum BillCmd {
    /// Snapshot a subscriber's attendance over an inclusive date range into a new bill.
    Generate {
        /// Subscriber phone number
        #[arg(long)]
        subscriber: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// Last day (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: String,

        /// Name printed on the bill. Defaults to the latest name in the ledger.
        #[arg(long)]
        name: Option<String>,

        /// Operator phone number recorded as generated_by
        #[arg(long)]
        by: String,
    },

    /// Print a bill, optionally reconciled against the current ledger.
    Show {
        /// Bill id
        #[arg(long)]
        id: String,

        #[arg(long, default_value_t = false)]
        reconcile: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let cfg = commands::load_settings()?;
            let pool = tfn_db::connect_from_env(cfg.db.max_connections).await?;
            match cmd {
                DbCmd::Status => {
                    let s = tfn_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_attendance_table={} next_bill_seq={}",
                        s.ok,
                        s.has_attendance_table,
                        s.next_bill_seq
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "NONE".to_string())
                    );
                }
                DbCmd::Migrate => {
                    tfn_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tfn_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sweep { today } => commands::sweep::run_sweep(today).await?,

        Commands::Bill { cmd } => match cmd {
            BillCmd::Generate {
                subscriber,
                from,
                to,
                name,
                by,
            } => commands::bill::run_generate(subscriber, from, to, name, by).await?,
            BillCmd::Show { id, reconcile } => commands::bill::run_show(id, reconcile).await?,
        },
    }

    Ok(())
}
