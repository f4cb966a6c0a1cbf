/// YOLO face + 5-point landmark locator using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, and NMS post-processing.
/// Expression scoring is left to the classifier stage.
use std::path::Path;

use crate::detection::domain::detected_face::Point;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

use super::execution_provider::{fixed_input_size, load_session};
use super::math::nms;

/// Fallback input resolution when neither the model nor the options fix one.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// 5 landmarks × (x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// A located face before expression scoring, in frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatedFace {
    pub region: Region,
    /// Visible keypoints only, in model order (eyes, nose, mouth corners).
    pub landmarks: Vec<Point>,
}

pub struct OnnxFaceLocator {
    session: ort::session::Session,
    fixed_input: Option<u32>,
}

impl OnnxFaceLocator {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        let fixed_input = fixed_input_size(&session);
        Ok(Self {
            session,
            fixed_input,
        })
    }

    /// `input_size` is used only when the model input is dynamic.
    pub fn locate(
        &mut self,
        frame: &Frame,
        min_confidence: f64,
        input_size: u32,
    ) -> Result<Vec<LocatedFace>, Box<dyn std::error::Error>> {
        let size = self
            .fixed_input
            .unwrap_or(if input_size > 0 { input_size } else { DEFAULT_INPUT_SIZE });
        let lb = letterbox(frame, size).ok_or("Frame has no pixels")?;

        let input_value = ort::value::Tensor::from_array(lb.tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("Face model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected face model output shape: {shape:?}").into());
        }

        // [1, features, detections] (transposed) or [1, detections, features]
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let row: Vec<f32> = if transposed {
                (0..num_feats).map(|f| data[f * num_dets + i]).collect()
            } else {
                data[i * num_feats..(i + 1) * num_feats].to_vec()
            };
            if let Some(face) = parse_row(&row, &lb, min_confidence) {
                candidates.push(face);
            }
        }

        let boxes: Vec<([f64; 4], f64)> = candidates
            .iter()
            .map(|f| {
                let r = &f.region;
                ([r.x, r.y, r.right(), r.bottom()], r.score)
            })
            .collect();
        let keep = nms(&boxes, NMS_IOU_THRESH);

        let (fw, fh) = (frame.width() as f64, frame.height() as f64);
        Ok(keep
            .into_iter()
            .filter_map(|i| {
                let face = &candidates[i];
                face.region.clamped(fw, fh).map(|region| LocatedFace {
                    region,
                    landmarks: face.landmarks.clone(),
                })
            })
            .collect())
    }
}

/// Decodes one output row: `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn parse_row(row: &[f32], lb: &Letterbox, min_confidence: f64) -> Option<LocatedFace> {
    if row.len() < 5 {
        return None;
    }
    let conf = row[4] as f64;
    if conf < min_confidence {
        return None;
    }

    let cx = row[0] as f64;
    let cy = row[1] as f64;
    let w = row[2] as f64;
    let h = row[3] as f64;
    let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
    let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);

    let mut landmarks = Vec::new();
    if row.len() >= 5 + NUM_KEYPOINT_VALUES {
        for k in 0..5 {
            let base = 5 + k * 3;
            if row[base + 2] as f64 >= KEYPOINT_CONF_THRESH {
                let (x, y) = lb.to_frame(row[base] as f64, row[base + 1] as f64);
                landmarks.push(Point::new(x, y));
            }
        }
    }

    Some(LocatedFace {
        region: Region::from_corners(x1, y1, x2, y2, conf),
        landmarks,
    })
}

struct Letterbox {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size` NCHW float32.
fn letterbox(frame: &Frame, target_size: u32) -> Option<Letterbox> {
    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    if src_w == 0 || src_h == 0 {
        return None;
    }

    let target = target_size as f64;
    let scale = (target / src_w as f64).min(target / src_h as f64);
    let new_w = ((src_w as f64 * scale).round() as u32).min(target_size);
    let new_h = ((src_h as f64 * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    // Padding is 114/255 gray, the YOLO convention.
    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    Some(Letterbox {
        tensor,
        scale,
        pad_x,
        pad_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(w: u32, h: u32, value: u8) -> Frame {
        Frame::new(vec![value; (w * h * 3) as usize], w, h, 0)
    }

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let lb = letterbox(&frame(200, 100, 128), 640).unwrap();
        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2, epsilon = 1e-9);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized() {
        let lb = letterbox(&frame(100, 50, 255), 640).unwrap();
        let y = lb.pad_y as usize + 1;
        assert_relative_eq!(lb.tensor[[0, 0, y, 1]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(lb.tensor[[0, 0, 0, 0]], 114.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn test_letterbox_empty_frame() {
        assert!(letterbox(&Frame::new(Vec::new(), 0, 0, 0), 640).is_none());
    }

    #[test]
    fn test_to_frame_inverts_letterbox() {
        let lb = letterbox(&frame(200, 100, 0), 640).unwrap();
        let (x, y) = lb.to_frame(320.0, 160.0 + 160.0);
        assert_relative_eq!(x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_parse_row_filters_low_confidence() {
        let lb = letterbox(&frame(640, 640, 0), 640).unwrap();
        let row = [320.0, 320.0, 100.0, 100.0, 0.2];
        assert!(parse_row(&row, &lb, 0.5).is_none());
    }

    #[test]
    fn test_parse_row_decodes_box_and_visible_keypoints() {
        let lb = letterbox(&frame(640, 640, 0), 640).unwrap();
        let mut row = vec![320.0f32, 320.0, 100.0, 200.0, 0.9];
        // left eye visible, right eye hidden, rest visible
        row.extend_from_slice(&[300.0, 280.0, 0.9]);
        row.extend_from_slice(&[340.0, 280.0, 0.1]);
        row.extend_from_slice(&[320.0, 320.0, 0.9]);
        row.extend_from_slice(&[305.0, 360.0, 0.9]);
        row.extend_from_slice(&[335.0, 360.0, 0.9]);

        let face = parse_row(&row, &lb, 0.5).unwrap();
        assert_relative_eq!(face.region.x, 270.0, epsilon = 1e-4);
        assert_relative_eq!(face.region.y, 220.0, epsilon = 1e-4);
        assert_relative_eq!(face.region.width, 100.0, epsilon = 1e-4);
        assert_relative_eq!(face.region.height, 200.0, epsilon = 1e-4);
        assert_relative_eq!(face.region.score, 0.9, epsilon = 1e-6);
        assert_eq!(face.landmarks.len(), 4);
        assert_relative_eq!(face.landmarks[0].x, 300.0, epsilon = 1e-4);
    }
}
