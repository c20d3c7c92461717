use clap::Parser;
use log::{error, info};

use coco_reduce::{default_blur_scorer, process_reduction, Args, ReduceJob};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.to_filter_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            std::process::exit(2);
        }
    };

    info!("Starting the reduction of {}...", args.input_json.display());

    let job = ReduceJob::from(&args);
    match process_reduction(&job, &config, default_blur_scorer()) {
        Ok(stats) => info!(
            "Reduction completed: {} images, {} annotations.",
            stats.selected_images, stats.selected_annotations
        ),
        Err(e) => {
            error!("Failed to reduce dataset: {}", e);
            std::process::exit(1);
        }
    }
}
