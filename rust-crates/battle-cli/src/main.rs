use battle_core::{
    Address,
    BattleConfig,
    config::NetworkConfig,
};
use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use std::{
    path::{
        Path,
        PathBuf,
    },
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod scenario;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "battle",
    about = "Replay battle scenarios and manage factory deployment records",
    version,
    group(ArgGroup::new("network").args(["test", "local"]))
)]
struct Args {
    /// HashKey testnet settings (default)
    #[arg(long)]
    test: bool,

    /// Local development chain settings
    #[arg(long)]
    local: bool,

    /// JSON config file; missing fields fall back to defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accept challengers without requiring every quiz statement
    #[arg(long)]
    skip_quiz_validation: bool,

    /// Print tracing output to stderr
    #[arg(long)]
    tracing: bool,

    /// Write tracing output to this file instead
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file against the in-memory battle factory
    Run { scenario: PathBuf },
    /// Inspect or update the recorded factory deployment
    Deployments {
        #[command(subcommand)]
        action: DeploymentsAction,
    },
}

#[derive(Subcommand, Debug)]
enum DeploymentsAction {
    Show,
    Record {
        /// Battle factory contract address
        #[arg(long)]
        factory: String,
        /// Account that deployed the factory
        #[arg(long)]
        deployer: Option<String>,
    },
}

impl Args {
    fn env(&self) -> DeploymentEnv {
        if self.local {
            DeploymentEnv::Local
        } else {
            DeploymentEnv::Test
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(path) = &args.log_file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .ok_or_else(|| eyre!("--log-file must name a file"))?;
        let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, file_name));
        let _ = LOG_GUARD.set(guard);
        fmt()
            .with_env_filter(filter())
            .with_writer(writer)
            .with_ansi(false)
            .try_init()
            .map_err(|e| eyre!("failed to initialise tracing: {e}"))?;
    } else if args.tracing {
        fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| eyre!("failed to initialise tracing: {e}"))?;
    }
    Ok(())
}

/// Config file and command-line overrides, without the deployment record.
fn base_config(args: &Args) -> Result<BattleConfig> {
    let mut config = match &args.config {
        Some(path) => BattleConfig::from_json_file(path).map_err(|e| eyre!("{e:#}"))?,
        None => BattleConfig::default(),
    };
    if args.local {
        config.network = NetworkConfig::local();
    } else if args.test {
        config.network = NetworkConfig::hashkey_testnet();
    }
    if args.skip_quiz_validation {
        config.skip_quiz_validation = true;
    }
    Ok(config)
}

fn load_config(args: &Args, store: &DeploymentStore) -> Result<BattleConfig> {
    let mut config = base_config(args)?;
    if config.network.factory_address.is_none()
        && let Some(record) = store.load().map_err(|e| eyre!("{e:#}"))?
    {
        let factory: Address = record
            .factory_address
            .parse()
            .wrap_err("recorded factory address is malformed")?;
        tracing::info!(%factory, deployed_at = %record.deployed_at, "using recorded factory deployment");
        config.network.factory_address = Some(factory);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_tracing(&args)?;

    let env = args.env();
    let store = DeploymentStore::new(env).map_err(|e| eyre!("{e:#}"))?;

    match &args.command {
        Command::Run { scenario } => {
            let config = load_config(&args, &store)?;
            tracing::info!(network = %config.network.name, chain_id = config.network.chain_id, "replaying scenario");
            let scenario = scenario::Scenario::from_json_file(scenario)?;
            let report = scenario.play(config).await?;
            for line in report {
                println!("{line}");
            }
        }
        Command::Deployments { action } => match action {
            DeploymentsAction::Show => match store.load().map_err(|e| eyre!("{e:#}"))? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No deployment recorded for {env}"),
            },
            DeploymentsAction::Record { factory, deployer } => {
                let factory: Address = factory.parse().wrap_err("invalid --factory address")?;
                let deployer = deployer
                    .as_deref()
                    .map(str::parse::<Address>)
                    .transpose()
                    .wrap_err("invalid --deployer address")?;
                let network = base_config(&args)?.network;
                let record = deployments::record_deployment(
                    &store,
                    factory.as_str(),
                    &network.rpc_url,
                    network.chain_id,
                    deployer.as_ref().map(Address::as_str),
                )
                .map_err(|e| eyre!("{e:#}"))?;
                println!(
                    "Recorded factory {} for {env} at {}",
                    record.factory_address,
                    store.path().display()
                );
            }
        },
    }
    Ok(())
}
