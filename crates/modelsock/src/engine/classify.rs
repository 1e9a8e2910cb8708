//! Image classification engine.
//!
//! Pipeline per request:
//! 1. Decode the payload as an image (PNG, JPEG, GIF, BMP, WebP)
//! 2. Convert to RGB, resize to the model input with nearest-neighbour
//! 3. Scale channels to [-1, 1]
//! 4. Run the label model, keep the top K labels
//! 5. Map each label through the keyword mapping
//!
//! Output: keyword groups in rank order, `,` within a group, `;` between groups.

use image::RgbImage;
use image::imageops::{self, FilterType};

use super::keywords::KeywordMapping;
use super::{ComputeEngine, EngineError};
use crate::bridge::protocol::{Flavor, Frame};

/// Number of ranked labels mapped to keywords.
pub const DEFAULT_TOP_K: usize = 3;

/// Normalized model input, HWC layout, RGB, values in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    pub const CHANNELS: usize = 3;

    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .as_raw()
            .iter()
            .map(|&v| f32::from(v) / 127.5 - 1.0)
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    /// Little-endian f32 bytes, for handing to foreign runtimes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_le_bytes()).collect()
    }
}

/// One ranked prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub name: String,
    pub score: f32,
}

impl Label {
    pub fn new(name: impl Into<String>, score: f32) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

/// A pretrained model that ranks labels for an image.
pub trait LabelModel: 'static {
    /// Side of the square input the model expects.
    fn input_size(&self) -> u32;

    /// Up to `top_k` labels, best first.
    fn predict(&mut self, input: &ImageTensor, top_k: usize) -> Result<Vec<Label>, EngineError>;
}

pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, EngineError> {
    let image = image::load_from_memory(bytes).map_err(|e| EngineError::decode(e.to_string()))?;
    Ok(image.into_rgb8())
}

pub fn normalize(image: &RgbImage, size: u32) -> ImageTensor {
    let resized = imageops::resize(image, size, size, FilterType::Nearest);
    ImageTensor::from_rgb(&resized)
}

/// Join keyword groups into the wire format.
pub fn join_keywords<'a>(groups: impl IntoIterator<Item = &'a [String]>) -> String {
    groups
        .into_iter()
        .map(|group| group.join(","))
        .collect::<Vec<_>>()
        .join(";")
}

pub struct ImageClassifier<M> {
    model: M,
    keywords: KeywordMapping,
    top_k: usize,
}

impl<M: LabelModel> ImageClassifier<M> {
    pub fn new(model: M, keywords: KeywordMapping) -> Self {
        Self {
            model,
            keywords,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn classify(&mut self, bytes: &[u8]) -> Result<String, EngineError> {
        let image = decode_image(bytes)?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            "Decoded image"
        );

        let input = normalize(&image, self.model.input_size());
        let labels = self.model.predict(&input, self.top_k)?;
        tracing::debug!(labels = ?labels.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(), "Model prediction");

        let groups = labels
            .iter()
            .take(self.top_k)
            .map(|label| {
                self.keywords
                    .lookup(&label.name)
                    .ok_or_else(|| EngineError::UnknownLabel {
                        label: label.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(join_keywords(groups))
    }
}

impl<M: LabelModel> ComputeEngine for ImageClassifier<M> {
    const FLAVOR: Flavor = Flavor::Classification;

    fn process(&mut self, request: &Frame) -> Result<String, EngineError> {
        match request {
            Frame::Payload(bytes) => {
                tracing::info!(size = bytes.len(), "Received a request to classify image");
                self.classify(bytes)
            }
            Frame::Control(_) => Err(EngineError::unsupported(Self::FLAVOR)),
        }
    }
}
