pub mod anonymization_config;
pub mod anonymization_region;
pub mod frame_anonymizer;
