//! sqlite-pg-migrate CLI - one-time SQLite to PostgreSQL migration.

use clap::{Parser, Subcommand};
use sqlite_pg_migrate::{
    dry_run, health_check, merge_parts, Config, MigrateError, MigrationResult, Orchestrator,
    SourceStore, SqliteSource,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "sqlite-pg-migrate")]
#[command(about = "One-time SQLite to PostgreSQL migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long, global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info", global = true)]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate every configured table
    Run {
        /// Dry run: check the source and show row counts without touching the target
        #[arg(long)]
        dry_run: bool,

        /// Override source SQLite file
        #[arg(long)]
        source_path: Option<PathBuf>,

        /// Override target schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Migrate only these tables (comma separated)
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Validate row counts between source and target
    Validate,

    /// Test database connections
    HealthCheck,

    /// Concatenate part files into one file and delete the parts
    MergeParts {
        /// Directory holding the part files
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// File name prefix shared by the parts
        #[arg(long)]
        prefix: String,

        /// File name suffix shared by the parts
        #[arg(long, default_value = "")]
        suffix: String,

        /// Merged output file
        #[arg(long)]
        output: PathBuf,

        /// Keep the part files after merging
        #[arg(long)]
        keep_parts: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    // merge-parts works on plain files and needs no configuration
    if let Commands::MergeParts {
        dir,
        prefix,
        suffix,
        output,
        keep_parts,
    } = &cli.command
    {
        let report = merge_parts(dir, prefix, suffix, output, *keep_parts)?;
        if cli.output_json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Merged {} parts into {} ({} bytes)",
                report.parts.len(),
                report.output.display(),
                report.bytes_written
            );
            if report.parts_removed {
                println!("Deleted part files");
            }
        }
        return Ok(());
    }

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::MergeParts { .. } => unreachable!(), // Handled above
        Commands::Run {
            dry_run: is_dry_run,
            source_path,
            target_schema,
            tables,
        } => {
            // Apply overrides
            if let Some(path) = source_path {
                config.source.path = path;
            }
            if let Some(schema) = target_schema {
                config.target.schema = schema;
            }
            if let Some(tables) = tables {
                config.migration.tables = tables;
            }
            config.validate()?;

            let result = if is_dry_run {
                let source = SqliteSource::connect(&config.source).await?;
                let result = dry_run(&config, &source).await;
                source.close().await;
                result?
            } else {
                let mut orchestrator = Orchestrator::connect(config).await?;
                let result = orchestrator.run().await;
                orchestrator.close().await;
                result?
            };

            print_result(&result, cli.output_json, is_dry_run)?;
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::connect(config).await?;
            let results = orchestrator.validate().await;
            orchestrator.close().await;
            let results = results?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                for v in &results {
                    println!(
                        "  {}: source={} target={} ({})",
                        v.table,
                        v.source_rows,
                        v.target_rows,
                        if v.matches { "match" } else { "MISMATCH" }
                    );
                }
                println!("Validation completed successfully");
            }
        }

        Commands::HealthCheck => {
            let result = health_check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source (SQLite): {} ({}ms)",
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target (PostgreSQL): {} ({}ms)",
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn print_result(result: &MigrationResult, json: bool, is_dry_run: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    let status_msg = if is_dry_run { "Dry run completed!" } else { "Migration completed!" };
    println!("\n{}", status_msg);
    println!("  Run ID: {}", result.run_id);
    println!("  Duration: {:.2}s", result.duration_seconds);
    for table in &result.tables {
        let mut notes = Vec::new();
        if table.schema_created {
            notes.push("table created".to_string());
        }
        if let Some(next) = table.sequence_next {
            notes.push(format!("next id {}", next));
        }
        if notes.is_empty() {
            println!("  {}: {} rows", table.name, table.rows_migrated);
        } else {
            println!("  {}: {} rows ({})", table.name, table.rows_migrated, notes.join(", "));
        }
    }
    println!("  Rows: {}", result.rows_migrated);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("unknown verbosity '{}'", other)),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("unknown log format '{}'", other)),
    }

    Ok(())
}
