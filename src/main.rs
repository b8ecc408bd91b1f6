use std::{env, fs::File, io::BufReader, path::PathBuf, process};

use anyhow::Context;
use log::{error, info};

use gnnwr_datasets::{init_dataset, BuildConfig, BuildSpec, Table};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("usage: {} <data.csv> <build.json> <out_dir>", args[0]);
        process::exit(2);
    }

    if let Err(e) = run(&args[1], &args[2], &args[3]) {
        error!("{e:#}");
        process::exit(1);
    }
}

fn run(data: &str, build: &str, out_dir: &str) -> anyhow::Result<()> {
    let table = Table::from_csv(data).with_context(|| format!("reading observations from {data}"))?;

    let file = File::open(build).with_context(|| format!("opening {build}"))?;
    let spec: BuildSpec =
        serde_json::from_reader(BufReader::new(file)).with_context(|| format!("parsing {build}"))?;
    let config = BuildConfig::try_from(spec).context("invalid build configuration")?;

    let partitions = init_dataset(&table, &config).context("building the datasets")?;

    let out_dir = PathBuf::from(out_dir);
    for (name, dataset) in [
        ("train", &partitions.train),
        ("valid", &partitions.valid),
        ("test", &partitions.test),
    ] {
        let dir = out_dir.join(name);
        dataset
            .persist(&dir)
            .with_context(|| format!("persisting the {name} split into {}", dir.display()))?;
    }

    info!(
        "wrote {} train, {} valid and {} test samples into {}",
        partitions.train.size(),
        partitions.valid.size(),
        partitions.test.size(),
        out_dir.display()
    );

    Ok(())
}
