pub mod box_filter;
pub mod label_renderer;
pub mod mask_compositor;
