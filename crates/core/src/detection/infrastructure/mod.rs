pub mod model_resolver;
#[cfg(feature = "onnx")]
pub mod onnx_blazeface_detector;
