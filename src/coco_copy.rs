use clap::Parser;
use log::{error, info};

use coco_reduce::io::{check_input_exists, copy_images, load_coco_file};
use coco_reduce::CopyArgs;

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CopyArgs::parse();

    if !args.input_image_path.is_dir() {
        error!(
            "The specified image path does not exist: {}",
            args.input_image_path.display()
        );
        std::process::exit(2);
    }
    if let Err(e) = check_input_exists(&args.input_json, "Input json path") {
        error!("{}", e);
        std::process::exit(2);
    }

    let coco = match load_coco_file(&args.input_json) {
        Ok(coco) => coco,
        Err(e) => {
            error!("Failed to load {}: {}", args.input_json.display(), e);
            std::process::exit(1);
        }
    };

    let destination = args.destination();
    let file_names: Vec<String> = coco.images.iter().map(|i| i.file_name.clone()).collect();
    info!("Copying into {}...", destination.display());
    match copy_images(&file_names, &args.input_image_path, &destination) {
        Ok(stats) => stats.print_summary(),
        Err(e) => {
            error!("Failed to copy images: {}", e);
            std::process::exit(1);
        }
    }
}
