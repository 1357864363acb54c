//! pg_upsert CLI - QA checks and upserts from staging to base tables.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use dialoguer::Password;
use pg_upsert::{Config, ConfigOverlay, Orchestrator, UpsertError, UpsertMethod};
use tracing::{debug, Level};

#[derive(Parser)]
#[command(name = "pg_upsert")]
#[command(about = "Check data in PostgreSQL staging tables and merge it into base tables")]
#[command(version)]
struct Cli {
    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database port [default: 5432]
    #[arg(long)]
    port: Option<u16>,

    /// Database name
    #[arg(long)]
    database: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Staging schema name [default: staging]
    #[arg(long)]
    staging_schema: Option<String>,

    /// Base schema name [default: public]
    #[arg(long)]
    base_schema: Option<String>,

    /// Client encoding [default: utf-8]
    #[arg(long)]
    encoding: Option<String>,

    /// Table to process, in order; repeatable
    #[arg(long = "tables", value_name = "TABLE")]
    tables: Vec<String>,

    /// Column to exclude from updates and inserts; repeatable
    #[arg(long = "exclude-columns", value_name = "COLUMN")]
    exclude_columns: Vec<String>,

    /// Column to exempt from the not-null check; repeatable
    #[arg(long = "null-columns", value_name = "COLUMN")]
    null_columns: Vec<String>,

    /// Merge method: upsert, update, or insert [default: upsert]
    #[arg(long, value_name = "METHOD")]
    upsert_method: Option<String>,

    /// Commit changes to the database
    #[arg(long)]
    commit: bool,

    /// Prompt before each destructive step
    #[arg(long)]
    interactive: bool,

    /// Suppress all console output
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Display debug output
    #[arg(long)]
    debug: bool,

    /// Write log messages to a file
    #[arg(long, value_name = "PATH")]
    logfile: Option<PathBuf>,

    /// Read configuration from a YAML file; file keys win over flags
    #[arg(long, value_name = "PATH")]
    config_file: Option<PathBuf>,

    /// Print a template configuration file to stdout and exit
    #[arg(long)]
    generate_config: bool,
}

impl Cli {
    fn overlay(&self) -> Result<ConfigOverlay, UpsertError> {
        let upsert_method = self
            .upsert_method
            .as_deref()
            .map(str::parse::<UpsertMethod>)
            .transpose()?;
        Ok(ConfigOverlay {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
            staging_schema: self.staging_schema.clone(),
            base_schema: self.base_schema.clone(),
            encoding: self.encoding.clone(),
            tables: non_empty(&self.tables),
            exclude_columns: non_empty(&self.exclude_columns),
            null_columns: non_empty(&self.null_columns),
            upsert_method,
            commit: self.commit.then_some(true),
            interactive: self.interactive.then_some(true),
        })
    }
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, UpsertError> {
    let cli = Cli::parse();
    let overlay = cli.overlay()?;

    if cli.generate_config {
        print!("{}", Config::template_yaml(&overlay)?);
        return Ok(ExitCode::SUCCESS);
    }

    setup_logging(&cli)?;

    let file_overlay = match &cli.config_file {
        Some(path) => Some(Config::load_overlay(path)?),
        None => None,
    };
    let config = Config::resolve(overlay, file_overlay)?;
    debug!("Resolved configuration: {:?}", config);

    let password = acquire_password(&config)?;
    let config = config.with_password(password);

    let orchestrator = Orchestrator::connect(config).await?;
    let outcome = orchestrator.run().await?;
    Ok(ExitCode::from(outcome.exit_code()))
}

fn setup_logging(cli: &Cli) -> Result<(), UpsertError> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    match &cli.logfile {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            subscriber
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            subscriber.with_writer(std::io::stderr).init();
        }
    }
    Ok(())
}

/// Take the password from `PGPASSWORD`, or prompt for it on a terminal.
fn acquire_password(config: &Config) -> Result<String, UpsertError> {
    if let Ok(password) = std::env::var("PGPASSWORD") {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(UpsertError::config(
            "No password available: set PGPASSWORD or run on a terminal",
        ));
    }
    Password::new()
        .with_prompt(format!(
            "Password for {}@{}:{}/{}",
            config.user, config.host, config.port, config.database
        ))
        .allow_empty_password(true)
        .interact()
        .map_err(pg_upsert::prompt::prompt_io_error)
}
