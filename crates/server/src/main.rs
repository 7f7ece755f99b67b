use std::sync::Arc;

use anyhow::Context;
use assistant::{logging, Config};

fn main() -> anyhow::Result<()> {
    logging::init("info");

    let config = Config::from_env().context("invalid configuration")?;
    // load once at startup; a model that cannot be loaded means no server
    let service = assistant::load_service(&config)
        .with_context(|| format!("failed to load model {}", config.model_id))?;

    server::serve(Arc::new(service), &config.bind)
}
