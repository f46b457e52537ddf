pub mod linear_resampler;
pub mod logger;
pub mod null_audio_output;
pub mod system_time_source;
