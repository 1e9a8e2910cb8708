//! InceptionResNetV2 running in the embedded interpreter.
//!
//! Python objects are held as `Py<PyAny>` and only touched inside
//! `Python::attach()`. The server is single-threaded, so the GIL is never
//! contended.

use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};

use modelsock::VersionInfo;
use modelsock::engine::{EngineError, ImageTensor, Label, LabelModel};

const APPLICATION: &str = "keras.applications.inception_resnet_v2";

/// Input side for InceptionResNetV2.
pub const INPUT_SIZE: u32 = 299;

pub struct KerasModel {
    numpy: Py<PyAny>,
    model: Py<PyAny>,
    decode_predictions: Py<PyAny>,
}

impl KerasModel {
    /// Import Keras and build the network with ImageNet weights.
    ///
    /// Slow: weights are loaded (and downloaded on first use).
    pub fn load() -> PyResult<Self> {
        Python::attach(|py| {
            let numpy = py.import("numpy")?;
            let application = py.import(APPLICATION)?;
            let model = application.getattr("InceptionResNetV2")?.call0()?;
            let decode_predictions = application.getattr("decode_predictions")?;
            tracing::info!(application = APPLICATION, "Loaded Keras model");

            Ok(Self {
                numpy: numpy.into_any().unbind(),
                model: model.unbind(),
                decode_predictions: decode_predictions.unbind(),
            })
        })
    }

    fn predict_py(
        &self,
        py: Python<'_>,
        input: &ImageTensor,
        top_k: usize,
    ) -> PyResult<Vec<Label>> {
        let buffer = PyBytes::new(py, &input.to_le_bytes());
        let shape = (
            1usize,
            input.height as usize,
            input.width as usize,
            ImageTensor::CHANNELS,
        );
        let batch = self
            .numpy
            .bind(py)
            .call_method1("frombuffer", (buffer, "<f4"))?
            .call_method1("reshape", (shape,))?;

        let kwargs = PyDict::new(py);
        kwargs.set_item("verbose", 0)?;
        let predictions = self
            .model
            .bind(py)
            .call_method("predict", (batch,), Some(&kwargs))?;

        let kwargs = PyDict::new(py);
        kwargs.set_item("top", top_k)?;
        let decoded: Vec<Vec<(String, String, f32)>> = self
            .decode_predictions
            .bind(py)
            .call((predictions,), Some(&kwargs))?
            .extract()?;

        Ok(labels_from(decoded.into_iter().next().unwrap_or_default()))
    }
}

impl LabelModel for KerasModel {
    fn input_size(&self) -> u32 {
        INPUT_SIZE
    }

    fn predict(&mut self, input: &ImageTensor, top_k: usize) -> Result<Vec<Label>, EngineError> {
        Python::attach(|py| self.predict_py(py, input, top_k))
            .map_err(|e| EngineError::inference(e.to_string()))
    }
}

/// `(class_id, label, score)` rows from `decode_predictions`, best first.
fn labels_from(rows: Vec<(String, String, f32)>) -> Vec<Label> {
    rows.into_iter()
        .map(|(_, name, score)| Label::new(name, score))
        .collect()
}

/// First word of `sys.version`, e.g. "3.11.4".
fn short_python_version(version: &str) -> &str {
    version.split_whitespace().next().unwrap_or(version)
}

pub fn detect_version(py: Python<'_>) -> VersionInfo {
    let mut version = VersionInfo::new();

    if let Ok(sys) = py.import("sys")
        && let Ok(py_version) = sys.getattr("version")
        && let Ok(v) = py_version.extract::<String>()
    {
        version = version.with_python(short_python_version(&v).to_string());
    }

    if let Ok(keras) = py.import("keras")
        && let Ok(keras_version) = keras.getattr("__version__")
        && let Ok(v) = keras_version.extract::<String>()
    {
        version = version.with_keras(v);
    }

    version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_version_is_trimmed() {
        assert_eq!(
            short_python_version("3.11.4 (main, Jun  7 2023, 10:13:09) [GCC 12.2.0]"),
            "3.11.4"
        );
        assert_eq!(short_python_version(""), "");
    }

    #[test]
    fn rows_keep_rank_order() {
        let rows = vec![
            ("n02123045".to_string(), "tabby".to_string(), 0.61),
            ("n02123159".to_string(), "tiger_cat".to_string(), 0.2),
        ];
        assert_eq!(
            labels_from(rows),
            vec![Label::new("tabby", 0.61), Label::new("tiger_cat", 0.2)]
        );
    }

    #[test]
    fn detects_interpreter_version() {
        let info = Python::attach(detect_version);
        let python = info.python.expect("embedded interpreter reports a version");
        assert!(python.starts_with('3'), "{python}");
    }
}
