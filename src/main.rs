//! Headless rackroom runner.
//!
//! Loads a rack list, composes every rack against the generation service
//! and logs the resulting scene. Usage:
//!
//! ```text
//! rackroom <racks.json> [--options <options.toml>] [--out <racks.json>]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rackroom::assembly::PlaceholderTag;
use rackroom::geometry::HttpGeometrySource;
use rackroom::options::Options;
use rackroom::scene::SceneRegistry;
use rackroom::{RackRoomEngine, RackroomError};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(120);

struct Args {
    racks: PathBuf,
    options: Option<PathBuf>,
    out: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let mut racks = None;
    let mut options = None;
    let mut out = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--options" => {
                options = Some(args.next().ok_or("--options needs a path")?);
            }
            "--out" => out = Some(args.next().ok_or("--out needs a path")?),
            _ if racks.is_none() => racks = Some(arg),
            _ => return Err(format!("unexpected argument {arg}")),
        }
    }
    Ok(Args {
        racks: racks.ok_or("missing rack list path")?.into(),
        options: options.map(PathBuf::from),
        out: out.map(PathBuf::from),
    })
}

fn load_options(path: Option<&Path>) -> Result<Options, RackroomError> {
    match path {
        Some(path) => Options::load(path),
        None => Ok(Options::default()),
    }
}

fn run(args: &Args) -> Result<(), RackroomError> {
    let options = load_options(args.options.as_deref())?;
    let json = std::fs::read_to_string(&args.racks)?;
    let registry = SceneRegistry::from_json(&json, &options.layout)?;
    log::info!(
        "loaded {} racks from {}",
        registry.len(),
        args.racks.display()
    );

    let source = Arc::new(HttpGeometrySource::new(&options.service));
    let mut engine = RackRoomEngine::with_registry(options, source, registry)?;
    if !engine.run_until_settled(SETTLE_TIMEOUT) {
        log::warn!("scene did not settle within {SETTLE_TIMEOUT:?}");
    }

    for composite in engine.composites() {
        let errors = composite
            .parts
            .iter()
            .filter(|p| p.placeholder() == Some(PlaceholderTag::Error))
            .count();
        log::info!(
            "rack {} at {}: {} parts, {errors} failed",
            composite.rack_id,
            composite.anchor,
            composite.parts.len()
        );
    }

    let totals = engine.aggregates();
    let stats = engine.stats();
    log::info!(
        "{} racks, {} servers, {} W total",
        totals.rack_count,
        totals.total_servers,
        totals.total_wattage
    );
    log::info!(
        "{} fetches, {} cache hits, {} coalesced, {} failures",
        stats.network_requests,
        stats.cache_hits,
        stats.coalesced,
        stats.failures
    );

    if let Some(out) = &args.out {
        std::fs::write(out, engine.to_json()?)?;
        log::info!("wrote rack list to {}", out.display());
    }
    Ok(())
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{e}");
            log::error!(
                "Usage: rackroom <racks.json> [--options <options.toml>] [--out <racks.json>]"
            );
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&args) {
        log::error!("{e}");
        std::process::exit(1);
    }
}
