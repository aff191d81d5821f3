use clap::{Parser, Subcommand, builder::styling};
use eyre::{Context, Result};
use owo_colors::OwoColorize;
use sql_firestore_migrate::cli::{self, MigrateArgs};

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Move MySQL tables into a Firestore collection, in chunks, with retries
#[derive(Parser)]
#[command(name = "fsmigrate", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy every row of the given tables into the target collection
    Migrate(MigrateArgs),

    /// Test connectivity to the source database and Firestore
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = dotenvy::from_filename(&cli.env) {
        if !err.not_found() {
            return Err(err).with_context(|| format!("Failed to load {}", cli.env));
        }
    }

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    // In-flight commits are abandoned on Ctrl-C
    tokio::select! {
        result = run(cli.command) => result,
        Ok(()) = tokio::signal::ctrl_c() => {
            log::warn!("Migration interrupted");
            std::process::exit(1);
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Migrate(args) => {
            let config = cli::load_config(&args)?;
            log::info!(
                "Migrating tables {} from {}",
                config.tables.join(", ").cyan(),
                config.source.database.bright_black()
            );

            let report = cli::migrate(&config, args.output.as_deref()).await.inspect_err(|e| {
                log::error!("Migration failed: {:#}", e);
            })?;
            report.log_summary();
        }
        Commands::Auth => {
            let args = MigrateArgs::default();
            let config = cli::load_config(&args)?;
            cli::check_auth(&config).await?;
        }
    }

    Ok(())
}
