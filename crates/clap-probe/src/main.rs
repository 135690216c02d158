use anyhow::bail;
use clap::Parser;
use clap_probe::{find_modules, probe, Config};
use std::ffi::CString;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clap-probe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load CLAP modules and report their entry tables")]
struct Args {
    /// Modules or directories to probe (default: configured search paths)
    paths: Vec<PathBuf>,

    /// Factory id to query; repeat for several (default: well-known ids)
    #[arg(long = "factory", value_name = "ID")]
    factories: Vec<String>,

    /// List discovered modules without loading them
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load();

    // Explicit module paths are probed as given, directories are scanned
    let modules = if args.paths.is_empty() {
        find_modules(&config.search_paths())
    } else {
        let (dirs, files): (Vec<PathBuf>, Vec<PathBuf>) = args
            .paths
            .into_iter()
            .partition(|p| p.is_dir() && p.extension().map_or(true, |e| e != "clap"));
        let mut modules = files;
        modules.extend(find_modules(&dirs));
        modules
    };

    if args.list {
        for module in &modules {
            println!("{}", module.display());
        }
        return Ok(());
    }

    let factory_ids = if args.factories.is_empty() {
        config.factory_ids()
    } else {
        args.factories
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()?
    };

    tracing::info!("Probing {} modules", modules.len());

    let mut failures = 0;
    for module in &modules {
        match probe(module, &factory_ids, config.min_version()) {
            Ok(report) => print!("{}", report),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", module.display(), e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} modules failed", failures, modules.len());
    }

    Ok(())
}
