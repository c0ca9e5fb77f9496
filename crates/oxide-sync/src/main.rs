//! oxide-sync CLI
//!
//! Command-line tool for comparing database schemas and table data.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use oxide_sync::prelude::*;

/// Compare two databases and print the SQL that reconciles them.
#[derive(Parser)]
#[command(name = "oxide-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Saved connection profiles file.
    #[arg(
        short,
        long,
        env = "OXIDE_SYNC_PROFILES",
        default_value = "connections.json",
        global = true
    )]
    profiles: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a database is reachable.
    Ping {
        /// Profile name or connection URL.
        #[arg(short, long)]
        source: String,
    },

    /// List the catalogs on a server.
    Databases {
        /// Profile name or connection URL.
        #[arg(short, long)]
        source: String,
    },

    /// Show the structure of a database or of one table.
    Schema {
        /// Profile name or connection URL.
        #[arg(short, long)]
        source: String,

        /// Only this table.
        #[arg(long)]
        table: Option<String>,
    },

    /// Show structural differences between two databases.
    SchemaDiff {
        /// Source profile name or connection URL.
        #[arg(short, long)]
        source: String,

        /// Target profile name or connection URL.
        #[arg(short, long)]
        target: String,
    },

    /// Show row differences of one table.
    DataDiff {
        /// Source profile name or connection URL.
        #[arg(short, long)]
        source: String,

        /// Target profile name or connection URL.
        #[arg(short, long)]
        target: String,

        /// Table to compare.
        #[arg(long)]
        table: String,

        /// Omit rows missing from the target.
        #[arg(long)]
        no_insert: bool,

        /// Omit rows that differ.
        #[arg(long)]
        no_update: bool,

        /// Omit rows missing from the source.
        #[arg(long)]
        no_delete: bool,
    },

    /// Show row counts and difference counts of one table.
    Summary {
        /// Source profile name or connection URL.
        #[arg(short, long)]
        source: String,

        /// Target profile name or connection URL.
        #[arg(short, long)]
        target: String,

        /// Table to summarize.
        #[arg(long)]
        table: String,
    },

    /// List tables with their primary keys and row counts.
    Tables {
        /// Profile name or connection URL.
        #[arg(short, long)]
        source: String,
    },

    /// Manage saved connection profiles.
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Save (or replace) a profile.
    Save {
        /// Profile name.
        name: String,

        /// Connection URL.
        url: String,

        /// Dialect, when it cannot be inferred from the URL.
        #[arg(long)]
        dialect: Option<Dialect>,

        /// Catalog name shown in reports.
        #[arg(long)]
        database: Option<String>,
    },

    /// List saved profiles.
    List,

    /// Delete a profile.
    Delete {
        /// Profile name.
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut store = ProfileStore::load(&cli.profiles)?;

    match cli.command {
        Commands::Ping { source } => {
            let target = store.resolve(&source)?;
            let adapter = connect(&target).await?;
            adapter.ping().await?;
            info!(target_db = %target, "Connection OK.");
        }

        Commands::Databases { source } => {
            let adapter = connect(&store.resolve(&source)?).await?;
            let databases = adapter.list_databases().await?;

            if cli.json {
                print_json(&databases)?;
            } else {
                for name in &databases {
                    println!("{name}");
                }
            }
        }

        Commands::Schema { source, table } => {
            let adapter = connect(&store.resolve(&source)?).await?;
            let schema = read_schema(adapter.as_ref(), table.as_deref()).await?;

            if cli.json {
                print_json(&schema)?;
            } else {
                for table in schema.tables.values() {
                    print_table(table);
                }
            }
        }

        Commands::SchemaDiff { source, target } => {
            let source = connect(&store.resolve(&source)?).await?;
            let target = connect(&store.resolve(&target)?).await?;

            let entries = compare_databases(source.as_ref(), target.as_ref()).await?;

            if cli.json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                info!("Schemas are identical.");
            } else {
                for entry in &entries {
                    println!(
                        "-- [{}] {}: {}",
                        schema_kind(entry.kind),
                        entry.table,
                        entry.detail
                    );
                    println!("{}", entry.statement);
                }
            }
        }

        Commands::DataDiff {
            source,
            target,
            table,
            no_insert,
            no_update,
            no_delete,
        } => {
            let source = connect(&store.resolve(&source)?).await?;
            let target = connect(&store.resolve(&target)?).await?;

            let options = SyncOptions {
                insert: !no_insert,
                update: !no_update,
                delete: !no_delete,
            };
            let entries =
                compare_table_data(source.as_ref(), target.as_ref(), &table, options).await?;

            if cli.json {
                print_json(&entries)?;
            } else if entries.is_empty() {
                info!(table = %table, "Table data is identical.");
            } else {
                for entry in &entries {
                    println!(
                        "-- [{}] {} key={}",
                        data_kind(entry.kind),
                        entry.table,
                        entry.primary_key.composite_key()
                    );
                    println!("{}", entry.statement);
                }
            }
        }

        Commands::Summary {
            source,
            target,
            table,
        } => {
            let source = connect(&store.resolve(&source)?).await?;
            let target = connect(&store.resolve(&target)?).await?;

            let summary = data_sync_summary(source.as_ref(), target.as_ref(), &table).await?;

            if cli.json {
                print_json(&summary)?;
            } else {
                println!("Table:        {}", summary.table);
                println!("Primary key:  {}", summary.primary_keys.join(", "));
                println!("Columns:      {}", summary.columns.join(", "));
                println!("Source rows:  {}", summary.source_count);
                println!("Target rows:  {}", summary.target_count);
                println!("Inserts:      {}", summary.insert_count);
                println!("Updates:      {}", summary.update_count);
                println!("Deletes:      {}", summary.delete_count);
            }
        }

        Commands::Tables { source } => {
            let adapter = connect(&store.resolve(&source)?).await?;
            let tables = tables_for_sync(adapter.as_ref()).await?;

            if cli.json {
                print_json(&tables)?;
            } else {
                println!("{:<32} {:<24} {:>10}", "TABLE", "PRIMARY KEY", "ROWS");
                println!("{:-<68}", "");
                for table in &tables {
                    let key = if table.primary_keys.is_empty() {
                        "(none)".to_string()
                    } else {
                        table.primary_keys.join(", ")
                    };
                    println!("{:<32} {:<24} {:>10}", table.table, key, table.source_count);
                }
            }
        }

        Commands::Profile { action } => match action {
            ProfileCommand::Save {
                name,
                url,
                dialect,
                database,
            } => {
                let mut target = match dialect {
                    Some(dialect) => ConnectionTarget::new(dialect, url),
                    None => ConnectionTarget::from_url(url)?,
                };
                if let Some(database) = database {
                    target = target.database(database);
                }
                store.save(Profile::new(name.as_str(), target))?;
                info!(name = %name, path = %store.path().display(), "Profile saved.");
            }

            ProfileCommand::List => {
                let profiles = store.all();
                if cli.json {
                    print_json(&profiles)?;
                } else if profiles.is_empty() {
                    info!("No saved profiles.");
                } else {
                    for profile in &profiles {
                        println!("{:<20} {}", profile.name, profile.target);
                    }
                }
            }

            ProfileCommand::Delete { name } => {
                store.delete(&name)?;
                info!(name = %name, "Profile deleted.");
            }
        },
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table(table: &TableSnapshot) {
    println!("{}", table.name);
    println!(
        "  {:<24} {:<24} {:<5} {:<4} {:<20} EXTRA",
        "COLUMN", "TYPE", "NULL", "KEY", "DEFAULT"
    );
    for column in &table.columns {
        println!(
            "  {:<24} {:<24} {:<5} {:<4} {:<20} {}",
            column.name,
            column.data_type,
            if column.nullable { "YES" } else { "NO" },
            column.key,
            column.default.as_deref().unwrap_or("NULL"),
            column.extra
        );
    }

    let mut indexes: Vec<&str> = table.indexes.iter().map(|i| i.name.as_str()).collect();
    indexes.dedup();
    if !indexes.is_empty() {
        println!("  indexes: {}", indexes.join(", "));
    }
    println!();
}

fn schema_kind(kind: DiffKind) -> &'static str {
    match kind {
        DiffKind::Added => "added",
        DiffKind::Modified => "modified",
        DiffKind::Removed => "removed",
    }
}

fn data_kind(kind: DataDiffKind) -> &'static str {
    match kind {
        DataDiffKind::Insert => "insert",
        DataDiffKind::Update => "update",
        DataDiffKind::Delete => "delete",
    }
}
