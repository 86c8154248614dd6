use anyhow::{bail, Result};
use et_service::{
    config::AppConfig, observability, soil::SoilType, store::CsvReadingStore, EtService,
};
use std::env;

const USAGE: &str = "usage: derive_et <csv_dir> <probe | et | uniform> [soil_type]";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let csv_dir = &args[1];
    let target = args[2].as_str();

    // Probe tables and weights come from the same file the server uses.
    let cfg = AppConfig::load()?;
    let catalog = cfg.probe_catalog()?;
    let default_soil = catalog.default_soil;
    let service = EtService::new(CsvReadingStore::new(csv_dir), catalog);

    let json = match target {
        "et" => {
            let soil = match args.get(3) {
                Some(name) => name.parse::<SoilType>()?,
                None => default_soil,
            };
            let series = service.multi_depth_et(soil, None).await?;
            serde_json::to_string_pretty(&series.et)?
        }
        "uniform" => {
            let series = service.uniform_multi_depth_et(None).await?;
            serde_json::to_string_pretty(&series.et)?
        }
        probe if service.catalog().probe(probe).is_ok() => {
            let series = service.probe_et(probe, None, None).await?;
            serde_json::to_string_pretty(&series.points)?
        }
        other => {
            let known: Vec<&str> = service.catalog().probe_names().collect();
            bail!("unknown target '{other}'; known probes: {}\n{USAGE}", known.join(", "));
        }
    };

    println!("{json}");
    Ok(())
}
