pub mod execution_provider;
pub mod math;
pub mod onnx_detection_provider;
pub mod onnx_expression_classifier;
pub mod onnx_face_locator;
