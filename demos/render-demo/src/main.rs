//! Render a talking-avatar clip from the command line
//!
//! Reads headerless 16-bit little-endian mono PCM and writes every frame,
//! back to back, as raw RGB24. Stats are printed as JSON when done.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs;
use tracing::info;

use aria_audio::AudioBuffer;
use aria_runtime::{init_tracing, EngineConfig, HostAccelerator, LogFormat, RenderingService};

const USAGE: &str = "Usage: render-demo <model.safetensors> <input.pcm> <output.rgb> [sample_rate] [config.yaml]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        println!("{USAGE}");
        println!("Example: render-demo avatar.safetensors hello.pcm hello.rgb 16000");
        return Ok(());
    }

    let format = std::env::var("ARIA_LOG_FORMAT")
        .ok()
        .map(|s| s.parse::<LogFormat>())
        .transpose()?
        .unwrap_or_default();
    init_tracing(format);

    let input = PathBuf::from(&args[2]);
    let output = PathBuf::from(&args[3]);
    let sample_rate: u32 = match args.get(4) {
        Some(rate) => rate.parse()?,
        None => aria_core::DEFAULT_SAMPLE_RATE,
    };

    let mut config = EngineConfig::with_model_path(&args[1]);
    config.config_path = args.get(5).map(PathBuf::from);

    let mut service = RenderingService::initialize(config, Arc::new(HostAccelerator::detect()))?;

    let audio = AudioBuffer::from_pcm16_le(&fs::read(&input).await?, sample_rate)?;
    let resolution = service.config().render.resolution;
    info!(
        input = %input.display(),
        seconds = audio.duration_secs(),
        width = resolution.width,
        height = resolution.height,
        "Rendering"
    );

    let mut stream = service.render_frames(audio)?;
    let total = stream.total_frames();
    let mut pixels = Vec::with_capacity(total as usize * resolution.frame_bytes());
    while let Some(frame) = stream.next().await {
        pixels.extend_from_slice(&frame?.data);
    }
    fs::write(&output, &pixels).await?;

    println!("{}", service.stats().to_json());
    info!(frames = total, output = %output.display(), "Done");

    service.cleanup()?;
    Ok(())
}
