use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::shared::expression::{Expression, ExpressionScores};
use crate::shared::region::Region;

use super::execution_provider::load_session;
use super::math::softmax;

/// FER+ takes a single-channel 64×64 crop with raw 0–255 intensities.
const INPUT_SIZE: u32 = 64;

/// Crops are widened by this fraction on each side so the classifier sees
/// the whole face, not just the detector's tight box.
const CROP_MARGIN: f64 = 0.1;

/// FER+ logit index for each [`Expression`], in canonical order.
///
/// Model order is neutral, happiness, surprise, sadness, anger, disgust,
/// fear, contempt. Contempt has no counterpart and is dropped.
const FERPLUS_INDEX: [usize; Expression::COUNT] = [0, 1, 3, 4, 6, 5, 2];

const FERPLUS_CLASSES: usize = 8;

/// Facial expression scorer backed by the FER+ ONNX model.
pub struct OnnxExpressionClassifier {
    session: ort::session::Session,
}

impl OnnxExpressionClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Self {
            session: load_session(model_path)?,
        })
    }

    /// Scores the face inside `region` of `image`.
    pub fn classify(
        &mut self,
        image: &RgbImage,
        region: &Region,
    ) -> Result<ExpressionScores, Box<dyn std::error::Error>> {
        let tensor = face_tensor(image, region).ok_or("Face crop is empty")?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Expression model produced no outputs".into());
        }
        let logits = outputs[0].try_extract_array::<f32>()?;
        let logits: Vec<f32> = logits.iter().copied().collect();
        if logits.len() < FERPLUS_CLASSES {
            return Err(format!(
                "Expression model returned {} logits, expected {FERPLUS_CLASSES}",
                logits.len()
            )
            .into());
        }
        Ok(scores_from_logits(&logits))
    }
}

fn scores_from_logits(logits: &[f32]) -> ExpressionScores {
    let probs = softmax(&logits[..FERPLUS_CLASSES]);
    let mut scores = [0.0; Expression::COUNT];
    for (slot, &idx) in scores.iter_mut().zip(FERPLUS_INDEX.iter()) {
        *slot = probs[idx];
    }
    ExpressionScores::new(scores)
}

/// Crops, grays, and resizes the face into a `[1, 1, 64, 64]` tensor.
fn face_tensor(image: &RgbImage, region: &Region) -> Option<ndarray::Array4<f32>> {
    let mx = region.width * CROP_MARGIN;
    let my = region.height * CROP_MARGIN;
    let grown = Region::new(
        region.x - mx,
        region.y - my,
        region.width + 2.0 * mx,
        region.height + 2.0 * my,
        region.score,
    );
    let crop = grown.clamped(image.width() as f64, image.height() as f64)?;
    let x = crop.x.floor() as u32;
    let y = crop.y.floor() as u32;
    let w = (crop.width.ceil() as u32).min(image.width() - x);
    let h = (crop.height.ceil() as u32).min(image.height() - y);
    if w == 0 || h == 0 {
        return None;
    }

    let face = imageops::crop_imm(image, x, y, w, h).to_image();
    let gray = imageops::grayscale(&face);
    let resized = imageops::resize(&gray, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let n = INPUT_SIZE as usize;
    let mut tensor = ndarray::Array4::<f32>::zeros((1, 1, n, n));
    for (px, py, pixel) in resized.enumerate_pixels() {
        tensor[[0, 0, py as usize, px as usize]] = pixel.0[0] as f32;
    }
    Some(tensor)
}
