//! Train the traffic speed model on synthetic data and write the artifact
//! to the configured model path.

use std::path::Path;

use anyhow::Context;
use tracing::info;

use urban_pulse::config::Config;
use urban_pulse::model::TrafficModel;
use urban_pulse::sources::{BASE_LATITUDE, BASE_LONGITUDE};

/// Synthetic rows generated for one training run.
const TRAINING_ROWS: usize = 1000;

fn main() -> anyhow::Result<()> {
    urban_pulse::init_tracing();

    info!(rows = TRAINING_ROWS, "Training traffic speed model...");

    let config = Config::from_env().context("failed to load configuration")?;

    let model = TrafficModel::train_synthetic(TRAINING_ROWS).context("training failed")?;

    let path = Path::new(&config.model_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    model
        .save(path)
        .with_context(|| format!("failed to save model to {}", path.display()))?;

    // Sanity-check the artifact the way the server will use it.
    let sample = model.predict(BASE_LATITUDE + 0.01, BASE_LONGITUDE + 0.01, 9);
    info!(
        path = %config.model_path,
        sample_speed_kmh = format!("{:.2}", sample),
        "Model trained and saved"
    );

    Ok(())
}
