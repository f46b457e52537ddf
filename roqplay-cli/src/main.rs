use crate::cpal_output::CpalAudioOutput;
use crate::pattern_engine::PatternEngine;
use crate::window_display::WindowDisplay;

use roqplay_common::logger;
use roqplay_common::null_audio_output::NullAudioOutput;
use roqplay_common::system_time_source::SystemTimeSource;
use roqplay_core::session::{PlaybackSession, SessionOptions};

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info};

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

mod cpal_output;
mod pattern_engine;
mod window_display;

#[derive(Debug, Parser)]
#[command(name = "roqplay", about = "RoQ-style playback synchronization demo")]
struct Opt {
    /// Media source identifier handed to the decode engine
    #[arg(value_name = "SOURCE", default_value = "pattern")]
    source: PathBuf,

    /// How long to run the test pattern, in seconds
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Disable audio
    #[arg(long = "no-audio")]
    disable_audio: bool,

    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,
}

fn main() -> ExitCode {
    let opt = Opt::parse();
    logger::initialize(&opt.verbosity);

    match run(&opt) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("playback failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(opt: &Opt) -> Result<(), Box<dyn Error>> {
    let display = WindowDisplay::new("roqplay").map_err(|e| format!("window: {}", e))?;
    let input = display.input();
    let mut engine = PatternEngine::new(opt.seconds);

    let options = SessionOptions {
        audio_enabled: !opt.disable_audio,
        ..SessionOptions::default()
    };

    if opt.disable_audio {
        info!("audio disabled");
        let mut session = PlaybackSession::with_options(
            display,
            NullAudioOutput,
            input,
            SystemTimeSource,
            options,
        );
        session.play(&mut engine, &opt.source)?;
    } else {
        let mut session = PlaybackSession::with_options(
            display,
            CpalAudioOutput,
            input,
            SystemTimeSource,
            options,
        );
        session.play(&mut engine, &opt.source)?;
    }

    info!("playback finished");
    Ok(())
}
