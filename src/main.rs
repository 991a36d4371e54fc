use std::path::{Path, PathBuf};
use tracing::{error, info};

mod log_formatter;
use log_formatter::BracketedFormatter;

mod config;
use config::SplitConfig;

mod error;
use error::SplitResult;

mod metadata;
use metadata::MetadataStore;

mod core;
use crate::core::{group_by_similarity, materialize_subset, validate, Subset, SubsetAssigner};

fn main() {
    // Initialize tracing subscriber with custom bracketed format
    tracing_subscriber::fmt()
        .event_format(BracketedFormatter)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting hull fouling dataset split");

    if let Err(e) = run() {
        error!("Split run failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> SplitResult<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "split_config.json".to_string());
    let config = SplitConfig::load(Path::new(&config_path))?;

    let metadata = MetadataStore::load(&config.metadata_path)?;
    let groups = group_by_similarity(&metadata)?;
    info!(
        "Formed {} similarity groups from {} images",
        groups.len(),
        metadata.len()
    );

    let assigner = SubsetAssigner::new(&metadata, &config);
    let assignment = assigner.assign(groups);

    validate(&assignment, &metadata, &config)?;

    for (subset, ids) in assignment.subsets() {
        let destination = destination_for(subset, &config);
        materialize_subset(ids, &config.dataset_root, &destination, &config.image_extension)?;
        info!(
            "{} subset: {:?}",
            subset.as_str(),
            ids.iter().collect::<Vec<_>>()
        );
    }

    info!("Split run complete");
    Ok(())
}

fn destination_for(subset: Subset, config: &SplitConfig) -> PathBuf {
    match subset {
        Subset::Training => config.training_path.clone(),
        Subset::Validation => config.validation_path.clone(),
        Subset::Testing => config
            .testing_path
            .clone()
            .expect("testing subset exists only when testing_path is configured"),
    }
}
