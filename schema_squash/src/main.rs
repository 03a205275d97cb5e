use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::Confirm;
use tracing::Level;

use schema_squash::config::{self, DEFAULT_CONFIG_FILE};
use schema_squash::schema::{Comparison, IndexFidelity};
use schema_squash::utils::logging::init_logging;
use schema_squash::{Error, SquashClient};

/// schema_squash - Consolidate Laravel migrations from a live MySQL database
#[derive(Parser)]
#[command(name = "schema_squash")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schema_squash.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration based on the current MySQL database
    Generate {
        /// Execute without confirmation
        #[arg(short, long)]
        force: bool,

        /// Leave out structures that cannot be processed
        #[arg(short, long)]
        ignore_problems: bool,

        /// Put foreign keys at the end of the file
        #[arg(short, long)]
        separate_foreign_keys: bool,

        /// Perform a structure comparison test run (drops and restores the database)
        #[arg(short, long)]
        testrun: bool,

        /// Also write a JSON report of problems and warnings
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Restore the database backup of an aborted test run
    Restore,

    /// Show the differences found by the last test run
    Diff,

    /// Write a migration for a table with every supported data type (testing only)
    TestMigration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = config::load_from_file(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    let default_level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    init_logging(&config.logging, default_level)?;

    let mut client = SquashClient::new(config);

    match cli.command {
        Commands::Generate {
            force,
            ignore_problems,
            separate_foreign_keys,
            testrun,
            report,
        } => {
            let generation = &mut client.config_mut().generation;
            generation.ignore_problems |= ignore_problems;
            generation.separate_foreign_keys |= separate_foreign_keys;

            generate_command(&client, force, testrun, report).await
        }
        Commands::Restore => restore_command(&client).await,
        Commands::Diff => diff_command(&client),
        Commands::TestMigration => test_migration_command(&client),
    }
}

/// Ask a yes/no question, answering no by default
fn confirm(question: &str) -> Result<bool> {
    Ok(Confirm::new().with_prompt(question).default(false).interact()?)
}

async fn generate_command(client: &SquashClient, force: bool, testrun: bool, report: Option<PathBuf>) -> Result<()> {
    let config = client.config();

    if client.backup_exists()
        && confirm("A previous test run seems to have aborted. Restore database backup before starting?")?
    {
        client.restore().await?;
        println!("{}", "Backup restored".green());
    }

    println!();
    println!(
        "Consolidating all past migrations, based on the \"{}\" database",
        config.database.database
    );
    println!("Make sure all your systems have been deployed, and that this system has your current, production database structure.");

    if testrun {
        println!();
        println!("Test run enabled");
        if !force
            && !confirm("Please confirm that you have deleted all old migrations, except ones that change framework or package created tables")?
        {
            println!("{}", "Aborting".yellow());
            return Ok(());
        }
    }

    println!();
    println!(
        "Reading structure information from {}:{}, database {}",
        config.database.host, config.database.port, config.database.database
    );

    let written = match client.generate().await {
        Ok(written) => written,
        Err(Error::EmptyDatabase(database)) => {
            eprintln!("{} The database \"{}\" is empty", "Error:".red(), database);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let migration = &written.migration;

    if let IndexFidelity::Degraded { reason } = &migration.index_fidelity {
        println!("{} Could not read indexes via information_schema: {}", "Warning:".yellow(), reason);
        println!("Indexes were read from the statistics view instead, their order within tables may differ.");
    }

    for warning in &migration.warnings {
        println!("{} {}", "Warning:".yellow(), warning);
    }

    if let Some(report_path) = report {
        let json = serde_json::to_string_pretty(migration)?;
        std::fs::write(&report_path, json)
            .with_context(|| format!("Could not write report {}", report_path.display()))?;
        println!("Report written to {}", report_path.display());
    }

    println!("{} {}", "Migration written:".green(), written.path.display());

    let mut show_disclaimer = true;
    if testrun {
        show_disclaimer = testrun_command(client).await?;
    }

    if show_disclaimer {
        println!();
        println!(
            "Test and inspect \"{}\" to make sure the migration fits your requirements",
            written.path.display()
        );
        println!("You can then delete all prior migrations and commit");
        println!(
            "{}",
            "It may be necessary to keep migrations that alter tables created by frameworks or packages!".yellow()
        );
    }

    if migration.warn_about_float {
        println!("{}", "FLOAT columns may be turned to DOUBLE by Laravel!".yellow());
    }

    println!();
    Ok(())
}

/// Returns false when the comparison could not be made
async fn testrun_command(client: &SquashClient) -> Result<bool> {
    println!();
    println!("Performing structure comparison test run");

    let report = match client.testrun().await {
        Ok(report) => report,
        Err(Error::DumpEmpty { path }) => {
            println!(
                "{} Something went wrong, the structure file {} is empty!",
                "Warning:".yellow(),
                path.display()
            );
            return Ok(false);
        }
        Err(e) => {
            eprintln!(
                "{} The test run failed. Run `schema_squash restore` to restore the backup.",
                "Error:".red()
            );
            return Err(e.into());
        }
    };

    match report.comparison {
        Comparison::Identical => println!("{}", "Success! The structure files are identical!".green()),
        Comparison::Differing => println!(
            "{}",
            "The structure files are not identical. Run schema_squash diff to investigate.".yellow()
        ),
    }
    println!("{}", report.before_path.display());
    println!("{}", report.after_path.display());

    Ok(true)
}

async fn restore_command(client: &SquashClient) -> Result<()> {
    if !client.backup_exists() {
        println!(
            "{} No backup found at {}",
            "Warning:".yellow(),
            client.config().testrun.backup_path().display()
        );
        return Ok(());
    }

    client.restore().await?;
    println!("{}", "Backup restored".green());
    Ok(())
}

fn diff_command(client: &SquashClient) -> Result<()> {
    let testrun = &client.config().testrun;

    for path in [testrun.before_path(), testrun.after_path()] {
        if !path.exists() {
            println!(
                "{} Could not find \"{}\". Run a test run first.",
                "Warning:".yellow(),
                path.display()
            );
            return Ok(());
        }
    }

    println!();
    println!("{}", "Comparing the test run database structure dumps:".cyan());
    println!("{}", testrun.before_path().display());
    println!("{}", testrun.after_path().display());
    println!();

    match client.diff()? {
        Some(diff) => {
            for line in diff.lines() {
                if line.starts_with('+') && !line.starts_with("+++") {
                    println!("{}", line.green());
                } else if line.starts_with('-') && !line.starts_with("---") {
                    println!("{}", line.red());
                } else {
                    println!("{}", line);
                }
            }
        }
        None => println!("{}", "The files are identical!".green()),
    }

    println!();
    Ok(())
}

fn test_migration_command(client: &SquashClient) -> Result<()> {
    println!();
    println!("Writing a migration file for a table with all supported data types. Do not commit, intended for testing purposes.");

    let path = client.write_test_migration()?;
    println!("{} {}", "Migration written:".green(), path.display());
    println!();
    Ok(())
}
