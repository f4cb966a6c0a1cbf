use std::path::PathBuf;

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::detection_provider::{DetectionProvider, DetectorOptions};
use crate::shared::constants::{
    EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL, FACE_MODEL_NAME, FACE_MODEL_URL,
};
use crate::shared::frame::Frame;
use crate::shared::model_resolver::{self, ModelSource};

use super::onnx_expression_classifier::OnnxExpressionClassifier;
use super::onnx_face_locator::OnnxFaceLocator;

/// Two-stage ONNX provider: YOLO face locator followed by a FER+ expression
/// classifier on each located face.
///
/// Models are resolved lazily in [`DetectionProvider::load_models`], so
/// construction never touches disk or network.
pub struct OnnxDetectionProvider {
    face_source: ModelSource,
    expression_source: ModelSource,
    bundled_dir: Option<PathBuf>,
    locator: Option<OnnxFaceLocator>,
    classifier: Option<OnnxExpressionClassifier>,
}

impl OnnxDetectionProvider {
    pub fn new(bundled_dir: Option<PathBuf>) -> Self {
        Self {
            face_source: ModelSource::new(FACE_MODEL_NAME, FACE_MODEL_URL),
            expression_source: ModelSource::new(EXPRESSION_MODEL_NAME, EXPRESSION_MODEL_URL),
            bundled_dir,
            locator: None,
            classifier: None,
        }
    }

    fn resolve(&self, source: &ModelSource) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let name = source.name.clone();
        let progress: model_resolver::ProgressFn = Box::new(move |done, total| {
            if total > 0 {
                log::debug!("{name}: {done}/{total} bytes");
            }
        });
        Ok(model_resolver::resolve(
            source,
            self.bundled_dir.as_deref(),
            Some(progress),
        )?)
    }
}

impl Default for OnnxDetectionProvider {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DetectionProvider for OnnxDetectionProvider {
    fn load_models(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.locator.is_none() {
            let path = self.resolve(&self.face_source)?;
            log::info!("Loading face model from {}", path.display());
            self.locator = Some(OnnxFaceLocator::new(&path)?);
        }
        if self.classifier.is_none() {
            let path = self.resolve(&self.expression_source)?;
            log::info!("Loading expression model from {}", path.display());
            self.classifier = Some(OnnxExpressionClassifier::new(&path)?);
        }
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.locator.is_some() && self.classifier.is_some()
    }

    fn detect(
        &mut self,
        frame: &Frame,
        options: &DetectorOptions,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        let (Some(locator), Some(classifier)) = (self.locator.as_mut(), self.classifier.as_mut())
        else {
            return Err("Face models are not loaded".into());
        };

        let located = locator.locate(frame, options.min_confidence, options.input_size)?;
        if located.is_empty() {
            return Ok(Vec::new());
        }

        let image = frame.to_rgb_image().ok_or("Frame buffer has wrong size")?;
        let mut faces = Vec::with_capacity(located.len());
        for face in located {
            let expressions = classifier.classify(&image, &face.region)?;
            faces.push(DetectedFace {
                region: face.region,
                landmarks: face.landmarks,
                expressions,
            });
        }
        Ok(faces)
    }
}
