//! Run the overlay headlessly against a synthetic capture source.
//!
//! Cycles through the configured effects, writing one PNG per effect into
//! the output directory.
//!
//! Usage: cargo run --example synthetic_overlay -- [output_dir] [config.json]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use screen_shader::config::JsonConfigStore;
use screen_shader::display::{DisplayInfo, StaticDisplay};
use screen_shader::gpu::{GpuContext, HeadlessSurface};
use screen_shader::{Overlay, SyntheticCapture};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let output_dir = PathBuf::from(args.next().unwrap_or_else(|| "overlay_frames".to_string()));
    let store = match args.next() {
        Some(path) => JsonConfigStore::new(path),
        None => JsonConfigStore::at_default_location()?,
    };
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let ctx = pollster::block_on(GpuContext::new()).context("GPU unavailable")?;
    println!("GPU: {}", ctx.adapter_info().name);

    let display = DisplayInfo {
        id: 1,
        width: 640,
        height: 360,
        scale_factor: 1.0,
        visible_area: None,
    };
    let surface = HeadlessSurface::new(ctx.device.clone(), ctx.queue.clone(), 1, 1);
    let snapshots = surface.snapshots();
    let mut overlay = Overlay::new(
        &ctx,
        surface,
        SyntheticCapture::new(),
        StaticDisplay(display),
        Box::new(store),
    )?;

    let ids = overlay.controller().effects().ids().to_vec();
    if ids.is_empty() {
        bail!("no effects configured");
    }

    for (index, id) in ids.into_iter().enumerate() {
        overlay.effects_mut().set_active(id, true);
        overlay.refresh_config();
        let name = overlay
            .controller()
            .effects()
            .get(id)
            .map(|effect| effect.name.clone())
            .unwrap_or_default();
        if let Some(error) = overlay.error_message() {
            println!("{}: {}", name, error);
            continue;
        }

        // Let a few frames through the new pipeline.
        let deadline = Instant::now() + Duration::from_millis(250);
        while Instant::now() < deadline {
            overlay.poll(Instant::now());
            std::thread::sleep(Duration::from_millis(16));
        }

        let Some(image) = snapshots.take() else {
            println!("{}: no frame presented", name);
            continue;
        };
        let path = output_dir.join(format!("{:02}.png", index));
        image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("{} -> {}", name, path.display());
    }

    overlay.metrics().update_stats();
    overlay.metrics().log_stats();
    overlay.shutdown()?;
    Ok(())
}
