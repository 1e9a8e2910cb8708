//! Image classification server: keyword groups for images over
//! `imclassif.sock`.

mod keras;

use anyhow::Context;
use pyo3::Python;

use modelsock::engine::{ImageClassifier, KeywordMapping};
use modelsock::{ClassifierConfig, Flavor, Server, ServerConfig};

use crate::keras::KerasModel;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    modelsock::init_tracing();

    let server_config = ServerConfig::from_env(Flavor::Classification)?;
    let config = ClassifierConfig::from_env()?;

    let keywords = KeywordMapping::load(&config.keyword_mapping).with_context(|| {
        format!(
            "loading keyword mapping from {}",
            config.keyword_mapping.display()
        )
    })?;
    let model = KerasModel::load().context("loading InceptionResNetV2")?;
    Python::attach(keras::detect_version).log();

    let engine = ImageClassifier::new(model, keywords).with_top_k(config.top_k);
    let mut server = Server::bind(server_config, engine).context("binding socket")?;
    server.run_until(modelsock::shutdown_signal()).await?;
    Ok(())
}
