use anyhow::Result;
use petridish_app::{AppSettings, run_headless};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();
    let settings = AppSettings::from_env()?;
    info!(
        frames = settings.frames,
        seed = ?settings.config.rng_seed,
        dish_width = settings.config.dish_width,
        dish_height = settings.config.dish_height,
        "Starting petri-dish simulation"
    );
    run_headless(&settings)?;
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
