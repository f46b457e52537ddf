pub mod audio;
pub mod display;
pub mod engine;
pub mod error;
pub mod input;
pub mod pcm;
pub mod session;
pub mod time_source;
pub mod video;

#[cfg(test)]
mod testing;
