//! Random text server: Markov sentences over `randtext.sock`.

use anyhow::Context;
use modelsock::engine::{MarkovText, TextGenerator};
use modelsock::{Flavor, GeneratorConfig, Server, ServerConfig, VersionInfo};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    modelsock::init_tracing();
    VersionInfo::new().log();

    let server_config = ServerConfig::from_env(Flavor::Generation)?;
    let config = GeneratorConfig::from_env()?;

    let model = MarkovText::load(&config.model_path)
        .with_context(|| format!("loading model from {}", config.model_path.display()))?;
    let engine = TextGenerator::new(model).with_retry(config.retry);

    let mut server = Server::bind(server_config, engine).context("binding socket")?;
    server.run_until(modelsock::shutdown_signal()).await?;
    Ok(())
}
