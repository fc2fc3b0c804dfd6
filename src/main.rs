use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hyperpod_aws::{AwsContext, Ec2SubnetDirectory};
use hyperpod_config::{load_from_file_path, ProvisionerConfig, StdEnvSource};
use hyperpod_core::{
    ClusterPlanner, GroupKind, StaticSubnetDirectory, SubnetDirectory, SubnetPlacement,
};
use std::path::PathBuf;
use tracing::info;

mod init;

/// Assemble SageMaker HyperPod cluster templates from instance group settings
#[derive(Parser)]
#[command(name = "hyperpod-provisioner")]
#[command(version)]
#[command(about = "Assemble SageMaker HyperPod cluster templates from instance group settings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML configuration file (environment variables still override it)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Resolve availability zones from SUBNET=AZ pairs instead of calling EC2
    #[arg(long = "subnet-az", value_name = "SUBNET=AZ", value_parser = parse_subnet_az, global = true)]
    subnet_az: Vec<SubnetPlacement>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the enriched instance groups as JSON
    Groups {
        /// Print the restricted instance groups instead
        #[arg(long)]
        restricted: bool,
    },
    /// Render the cluster CloudFormation template
    Render {
        /// Write the template to FILE instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn parse_subnet_az(raw: &str) -> Result<SubnetPlacement, String> {
    match raw.split_once('=') {
        Some((subnet, zone)) if !subnet.trim().is_empty() && !zone.trim().is_empty() => {
            Ok(SubnetPlacement::new(subnet.trim(), zone.trim()))
        }
        _ => Err(format!("expected SUBNET=AZ, got '{}'", raw)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => load_from_file_path(path, &StdEnvSource)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ProvisionerConfig::load().context("Failed to load configuration")?,
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }

    init::init_tracing(&config.logging);

    let subnets: Box<dyn SubnetDirectory> = if cli.subnet_az.is_empty() {
        let aws = AwsContext::load(None).await;
        info!(region = ?aws.region(), "Resolving subnets through EC2");
        Box::new(Ec2SubnetDirectory::from_context(&aws))
    } else {
        Box::new(StaticSubnetDirectory::new(cli.subnet_az.clone()))
    };
    let planner = ClusterPlanner::new(&config, subnets.as_ref());

    match cli.command {
        Commands::Groups { restricted } => {
            let kind = if restricted {
                GroupKind::Restricted
            } else {
                GroupKind::Standard
            };
            let groups = planner.instance_groups(kind).await?;
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
        Commands::Render { output } => {
            let plan = planner.plan().await?;
            if let Some(params) = &plan.provisioning_parameters {
                info!(
                    controller = %params.controller_group,
                    workers = params.worker_groups.len(),
                    "Derived SLURM provisioning parameters"
                );
            }
            match output {
                Some(path) => {
                    std::fs::write(&path, &plan.template)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!(path = %path.display(), cluster = %plan.request.name(), "Wrote cluster template");
                }
                None => print!("{}", plan.template),
            }
        }
    }

    Ok(())
}
