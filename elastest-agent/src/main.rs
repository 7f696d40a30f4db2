//! ElasTest Agent
//!
//! Wraps a build command so that it runs as an ElasTest external job: the
//! job is created and awaited before the command starts, the command's
//! output is relayed to the platform and the outcome is reported back.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elastest_agent::config::Config;
use elastest_agent::service::AssociationService;
use elastest_agent::step::{BuildStep, StepOptions};

#[derive(Parser)]
#[command(name = "elastest-agent")]
#[command(about = "Run builds as ElasTest external jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a build command bound to an ElasTest external job
    Run {
        /// Build identity (default: random)
        #[arg(long, env = "BUILD_ID")]
        build_id: Option<String>,

        /// Job name shown in ElasTest
        #[arg(long, env = "JOB_NAME")]
        job_name: String,

        /// Test support services to start (e.g. EUS,EMS)
        #[arg(long, value_delimiter = ',')]
        tss: Vec<String>,

        /// Link back to the build
        #[arg(long, env = "BUILD_URL")]
        build_url: Option<String>,

        /// Build command and its arguments
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true
        )]
        command: Vec<String>,
    },
    /// List the test support services known to the catalog
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout carries the build output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elastest_agent=info,elastest_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            build_id,
            job_name,
            tss,
            build_url,
            command,
        } => {
            info!("Using ElasTest at {}", config.elastest_url);

            let service = Arc::new(AssociationService::from_config(&config)?);
            let step = BuildStep::new(service, config);

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling");
                    on_signal.cancel();
                }
            });

            let options = StepOptions {
                build_id: build_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                job_name,
                tss,
                command,
                build_url,
            };

            let code = step.run(options, &cancel).await?;
            std::process::exit(code);
        }
        Commands::Catalog => {
            let catalog = config.load_catalog()?;
            for code in catalog.codes() {
                println!("{:<6} {}", code, catalog.lookup(code).unwrap_or_default());
            }
            Ok(())
        }
    }
}
