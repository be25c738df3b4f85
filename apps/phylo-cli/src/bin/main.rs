use std::env;

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use phylo_core::config::Config;
use phylo_core::types::{ClusteredDocument, FinalDocument, Mode};
use phylo_pipeline::Pipeline;

const USAGE: &str = "Usage: phylo <cluster|phylogeny|run> [--mode image|text] [--data-dir DIR]";

struct Args {
    cmd: String,
    mode: Option<Mode>,
    data_dir: Option<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = env::args().skip(1);
    let Some(cmd) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };
    let mut parsed = Args { cmd, mode: None, data_dir: None };
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--mode" => {
                let value = args.next().context("--mode needs a value")?;
                parsed.mode = Some(value.parse()?);
            }
            "--data-dir" => parsed.data_dir = Some(args.next().context("--data-dir needs a value")?),
            other => bail!("Unknown argument: {other}\n{USAGE}"),
        }
    }
    Ok(parsed)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_clusters(doc: &ClusteredDocument) {
    for c in &doc.clusters {
        println!("  Cluster {}: {} ({} items)", c.id, c.label, c.size);
    }
    let noise = doc.items.iter().filter(|ci| ci.cluster < 0).count();
    println!("Found {} clusters, {} noise points", doc.clusters.len(), noise);
}

fn print_phylogeny(doc: &FinalDocument) {
    println!(
        "Built tree with {} nodes, root: {} ({})",
        doc.phylogeny.nodes.len(),
        doc.phylogeny.root_id,
        doc.phylogeny.root_date
    );
    for s in &doc.species {
        println!("  {}: {} items ({})", s.name, s.count, s.date_range);
    }
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = parse_args()?;
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let mut settings = config.settings()?;
    if let Some(dir) = args.data_dir {
        settings.data.dir = dir;
    }
    let pipeline = Pipeline::new(settings);

    match args.cmd.as_str() {
        "cluster" => {
            let (doc, written) = pipeline.run_cluster_stage(args.mode).context("cluster stage failed")?;
            print_clusters(&doc);
            for p in written {
                println!("Saved clustered data to {}", p.display());
            }
        }
        "phylogeny" => {
            let (doc, written) = pipeline.run_phylogeny_stage(args.mode).context("phylogeny stage failed")?;
            print_phylogeny(&doc);
            for p in written {
                println!("Saved final data to {}", p.display());
            }
        }
        "run" => {
            let (doc, written) = pipeline.run(args.mode)?;
            println!("Found {} clusters, {} species", doc.clusters.len(), doc.species.len());
            print_phylogeny(&doc);
            for p in written {
                println!("Saved {}", p.display());
            }
        }
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}
