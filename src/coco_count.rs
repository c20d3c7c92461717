use clap::Parser;
use log::error;

use coco_reduce::io::{count_images, load_coco_file};
use coco_reduce::CountArgs;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CountArgs::parse();

    match load_coco_file(&args.input_json) {
        Ok(coco) => count_images(&coco).print_summary(),
        Err(e) => {
            error!("Failed to load {}: {}", args.input_json.display(), e);
            std::process::exit(1);
        }
    }
}
