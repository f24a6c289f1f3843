use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "labsync")]
#[command(about = "Lab accession to clinical record sync", long_about = None)]
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
        /// Paths in merge order (base -> site -> local)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Validate layered config and print the effective settings
    CheckConfig {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Fail on config keys nothing reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Fetch and reconcile accessions by notification content path
    Process {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Overrides worker.concurrency
        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long, default_value_t = false)]
        strict_config: bool,

        /// Content paths, e.g. /ws/rest/accession/<uuid>
        #[arg(required = true)]
        contents: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,

    /// Create the reference data the config points at when missing.
    SeedReference {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = labsync_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = labsync_db::status(&pool).await?;
                    println!("db_ok={} has_observations_table={}", s.ok, s.has_observations_table);
                }
                DbCmd::Migrate => {
                    labsync_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::SeedReference { config_paths } => {
                    let (_, settings) = commands::load_settings(&config_paths, false)?;
                    commands::seed::seed_reference(&pool, &settings).await?;
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            let loaded = labsync_config::load_layered_yaml(&refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::CheckConfig {
            config_paths,
            strict,
        } => {
            let (loaded, settings) = commands::load_settings(&config_paths, strict)?;
            println!("config_hash={}", loaded.config_hash);
            println!("elis_base_uri={}", settings.elis.base_uri);
            println!("elis_timeout_ms={}", settings.elis.timeout_ms);
            println!("elis_auth={}", settings.elis.auth.is_some());
            println!("lab_result_encounter_type={}", settings.lab_result_encounter_type);
            println!("lab_order_encounter_type={}", settings.lab_order_encounter_type);
            println!("system_provider_identifier={}", settings.system_provider_identifier);
            println!("unknown_encounter_role_uuid={}", settings.unknown_encounter_role_uuid);
            println!("worker_concurrency={}", settings.worker_concurrency);
        }

        Commands::Process {
            config_paths,
            concurrency,
            strict_config,
            contents,
        } => {
            commands::process::process(commands::process::ProcessArgs {
                config_paths,
                contents,
                concurrency,
                strict_config,
            })
            .await?;
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
