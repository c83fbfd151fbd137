pub mod execution_provider;
pub mod onnx_centerface_adapter;
