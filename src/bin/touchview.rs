use std::path::PathBuf;

use clap::Parser;
use log::info;

use touchview::ViewerConfig;

/// Touch-driven OBJ model viewer
#[derive(Debug, Parser)]
#[command(name = "touchview", version, about)]
struct Args {
    /// Wavefront OBJ file to display
    model: PathBuf,

    /// MSAA sample count to try first (1 disables multisampling)
    #[arg(long, default_value_t = 8)]
    msaa: u32,

    /// Initial window width in logical pixels
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Initial window height in logical pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Present without waiting for vertical sync
    #[arg(long)]
    no_vsync: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("touchview=info"))
        .init();

    let args = Args::parse();
    let title = args
        .model
        .file_name()
        .map(|name| format!("touchview - {}", name.to_string_lossy()))
        .unwrap_or_else(|| "touchview".to_string());

    let config = ViewerConfig::default()
        .with_title(&title)
        .with_size(args.width, args.height)
        .with_msaa_samples(args.msaa)
        .with_vsync(!args.no_vsync);

    info!("Opening {}", args.model.display());
    touchview::view_obj(args.model, config)
}
