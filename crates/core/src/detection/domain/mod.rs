pub mod coordinate_rescaler;
pub mod detection;
pub mod detection_decoder;
pub mod face_detector;
pub mod inference_adapter;
