use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fibermesh_core::{CrossConnectApi, Side, Splice, Structure};
use fibermesh_engine::{CrossConnectEngine, EngineConfig, FillOutcome, occupancy};
use fibermesh_store::{MemoryStore, StoreConfig, default_fixture_path, open_store};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fibermesh developer utilities (node inspection, fill dry runs, config scaffolding)"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every structure of the node with its ports and splice rows.
    Inspect(InspectArgs),
    /// Run a bundle or cable fill against the node and report the result.
    Fill(FillArgs),
    /// Write default `store.json` and `engine.json` into a directory.
    InitConfig(InitConfigArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Directory holding `store.json` and an optional `node.json`.
    #[arg(long, default_value = ".fibermesh")]
    datastore: PathBuf,
    /// Only show the structure with this name.
    #[arg(long)]
    structure: Option<String>,
}

#[derive(Parser, Debug)]
struct FillArgs {
    #[arg(long, default_value = ".fibermesh")]
    datastore: PathBuf,
    /// Name of the structure the fill starts in.
    #[arg(long)]
    structure: String,
    /// Name of the cable to drop.
    #[arg(long)]
    cable: String,
    /// Drop only this bundle instead of the whole cable.
    #[arg(long)]
    bundle: Option<u32>,
    #[arg(long, default_value_t = 1)]
    port: u32,
    #[arg(long, value_enum, default_value_t = SideArg::A)]
    side: SideArg,
    /// Print the fill report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct InitConfigArgs {
    #[arg(long, default_value = ".fibermesh")]
    datastore: PathBuf,
    /// Overwrite existing config files.
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum SideArg {
    A,
    B,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::A => Side::A,
            SideArg::B => Side::B,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect(args) => inspect(args).await,
        Command::Fill(args) => fill(args).await,
        Command::InitConfig(args) => init_config(args),
    }
}

fn init_logging() {
    let default = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn inspect(args: InspectArgs) -> Result<()> {
    let store = open_store(&args.datastore)
        .with_context(|| format!("open node under {}", args.datastore.display()))?;
    let structures = store.structures().map_err(|err| anyhow!(err.to_string()))?;
    let mut shown = 0usize;
    for structure in &structures {
        if args
            .structure
            .as_deref()
            .is_some_and(|name| name != structure.name)
        {
            continue;
        }
        shown += 1;
        print_structure(&store, structure).await?;
    }
    if shown == 0 {
        return Err(anyhow!(
            "no structure matched (filter={:?})",
            args.structure
        ));
    }
    Ok(())
}

async fn print_structure(store: &MemoryStore, structure: &Structure) -> Result<()> {
    println!(
        "{} [slots {}-{}]",
        structure.name, structure.slot_start, structure.slot_end
    );
    let Some(component_type) = structure.component_type else {
        println!("  no ports");
        return Ok(());
    };
    let ports = store
        .get_component_ports(component_type)
        .await
        .map_err(|err| anyhow!(err.to_string()))?;
    let splices = store
        .get_fiber_splices(structure.id)
        .await
        .map_err(|err| anyhow!(err.to_string()))?;
    for side in [Side::A, Side::B] {
        let numbers = occupancy::side_ports(&ports, side);
        let free = numbers
            .iter()
            .filter(|port| !occupancy::is_occupied(&splices, **port, side))
            .count();
        println!(
            "  side {}: {} ports, {} free",
            side.as_str(),
            numbers.len(),
            free
        );
    }
    for splice in &splices {
        println!("  {}", describe_row(splice));
    }
    Ok(())
}

fn describe_row(splice: &Splice) -> String {
    let side = |side: Side| {
        let endpoint = splice.endpoint(side);
        let fiber = endpoint
            .fiber
            .as_ref()
            .map(|fiber| format!("{}#{}", fiber.cable_name, fiber.fiber_number_absolute))
            .unwrap_or_else(|| "-".into());
        match &endpoint.merge_info {
            Some(info) => format!("{fiber} (merged {})", info.port_range()),
            None => fiber,
        }
    };
    format!(
        "port {:>3}  A: {}  B: {}",
        splice.port_number,
        side(Side::A),
        side(Side::B)
    )
}

async fn fill(args: FillArgs) -> Result<()> {
    let store = open_store(&args.datastore)
        .with_context(|| format!("open node under {}", args.datastore.display()))?;
    let config = EngineConfig::load_or_init(&args.datastore)
        .map_err(|err| anyhow!(err.to_string()))
        .with_context(|| format!("load engine config under {}", args.datastore.display()))?;

    let structures = store.structures().map_err(|err| anyhow!(err.to_string()))?;
    let structure = structures
        .iter()
        .find(|structure| structure.name == args.structure)
        .cloned()
        .ok_or_else(|| anyhow!("structure '{}' not found", args.structure))?;
    let cable = store
        .cables()
        .map_err(|err| anyhow!(err.to_string()))?
        .into_iter()
        .find(|cable| cable.name == args.cable)
        .ok_or_else(|| anyhow!("cable '{}' not found", args.cable))?;

    let engine = CrossConnectEngine::new(store.clone(), config);
    if !engine.select_structure(structure).await {
        return Err(anyhow!("could not load structure '{}'", args.structure));
    }

    let side = Side::from(args.side);
    let outcome = match args.bundle {
        Some(number) => {
            let bundle = cable
                .bundles()
                .into_iter()
                .find(|bundle| bundle.bundle_number == number)
                .ok_or_else(|| anyhow!("cable '{}' has no bundle {number}", args.cable))?;
            engine.handle_bundle_drop(args.port, side, &bundle).await
        }
        None => {
            engine
                .handle_cable_drop(args.port, side, &cable, &structures)
                .await
        }
    };

    for notice in engine.drain_notices().await {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }
    report(&outcome, args.json)?;
    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("fill did not complete"))
    }
}

fn report(outcome: &FillOutcome, json: bool) -> Result<()> {
    if json {
        let (status, error) = match outcome {
            FillOutcome::Connected(_) => ("connected", None),
            FillOutcome::PartiallyConnected(_) => ("partially_connected", None),
            FillOutcome::Failed { error, .. } => ("failed", Some(error.to_string())),
            FillOutcome::Rejected { reason } => ("rejected", Some(reason.clone())),
        };
        let payload = serde_json::to_string_pretty(&serde_json::json!({
            "status": status,
            "error": error,
            "report": outcome.report(),
        }))?;
        println!("{payload}");
        return Ok(());
    }
    match outcome {
        FillOutcome::Connected(report) => {
            println!(
                "connected {} fibers across {} structures",
                report.placed,
                report.structures.len()
            );
        }
        FillOutcome::PartiallyConnected(report) => {
            println!("connected {} of {} fibers", report.placed, report.total);
        }
        FillOutcome::Failed { error, report } => {
            println!(
                "failed after {} of {} fibers: {}",
                report.placed,
                report.total,
                error.message()
            );
        }
        FillOutcome::Rejected { reason } => println!("rejected: {reason}"),
    }
    Ok(())
}

fn init_config(args: InitConfigArgs) -> Result<()> {
    fs::create_dir_all(&args.datastore)
        .with_context(|| format!("failed to create {}", args.datastore.display()))?;
    let store_path = args.datastore.join("store.json");
    let engine_path = args.datastore.join("engine.json");
    write_json(&store_path, &StoreConfig::in_memory(), args.force)?;
    write_json(&engine_path, &EngineConfig::with_defaults(), args.force)?;
    let fixture = default_fixture_path(&args.datastore);
    if !fixture.exists() {
        println!(
            "no {} found; the embedded sample node will be used",
            fixture.display()
        );
    }
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("kept existing {}", path.display());
        return Ok(());
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, format!("{json}\n")).with_context(|| format!("write {}", path.display()))?;
    log::info!("xtask: wrote {}", path.display());
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_fill_defaults() {
        let cli = Cli::parse_from([
            "xtask",
            "fill",
            "--structure",
            "Tray 1",
            "--cable",
            "K-Nord-24",
        ]);
        match cli.command {
            Command::Fill(args) => {
                assert_eq!(args.datastore, PathBuf::from(".fibermesh"));
                assert_eq!(args.port, 1);
                assert_eq!(args.side, SideArg::A);
                assert!(args.bundle.is_none());
                assert!(!args.json);
            }
            _ => panic!("expected fill command"),
        }
    }

    #[test]
    fn cli_parses_bundle_and_side() {
        let cli = Cli::parse_from([
            "xtask", "fill", "--structure", "Tray 2", "--cable", "K-Drop-4", "--bundle", "1",
            "--side", "b", "--port", "3",
        ]);
        match cli.command {
            Command::Fill(args) => {
                assert_eq!(args.bundle, Some(1));
                assert_eq!(Side::from(args.side), Side::B);
                assert_eq!(args.port, 3);
            }
            _ => panic!("expected fill command"),
        }
    }

    #[test]
    fn init_config_keeps_existing_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().to_path_buf();
        init_config(InitConfigArgs {
            datastore: base.clone(),
            force: false,
        })
        .expect("init");
        fs::write(base.join("engine.json"), "{}").expect("overwrite");
        init_config(InitConfigArgs {
            datastore: base.clone(),
            force: false,
        })
        .expect("init again");
        assert_eq!(
            fs::read_to_string(base.join("engine.json")).expect("read"),
            "{}"
        );
        assert!(base.join("store.json").exists());
    }

    #[tokio::test]
    async fn fill_runs_against_the_sample_node() {
        let dir = tempfile::tempdir().expect("tempdir");
        fill(FillArgs {
            datastore: dir.path().to_path_buf(),
            structure: "Tray 1".into(),
            cable: "K-Drop-4".into(),
            bundle: None,
            port: 1,
            side: SideArg::A,
            json: false,
        })
        .await
        .expect("fill");
    }
}
