//! # Vocal Range - Command Line Host
//!
//! Feeds audio from a WAV file, or the default microphone with the `mic`
//! feature, through a `vocal_core` range session and prints the result as
//! JSON.
//!
//! ## Architecture
//! - **Reader / capture thread**: cuts audio into fixed-size mono frames
//! - **Main thread**: throttles frames to the analysis interval, runs the
//!   session, and stops it when the audio ends or the time limit is reached
//! - **Communication**: a bounded crossbeam channel carries frames between them

#[cfg(feature = "mic")]
mod audio;
mod cadence;
mod source;

use anyhow::{Context, Result, bail};
use cadence::Throttle;
use clap::{Arg, ArgMatches, Command};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::Serialize;
use source::Frame;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vocal_core::note::cents_between;
use vocal_core::{
    AudioFrame, NoteLabel, PitchEstimate, RangeObserver, RangeSession, SessionConfig,
    VocalRangeResult,
};

/// How long the analysis loop waits for a frame before giving up on the source.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Host-side policy. Everything that shapes the analysis itself lives in
/// `SessionConfig`.
#[derive(Debug)]
struct Options {
    input: Option<PathBuf>,
    mic: bool,
    max_duration: Option<Duration>,
    frame_size: usize,
    interval: Duration,
    config: Option<PathBuf>,
}

/// Printed to stdout when the session ends.
#[derive(Debug, Serialize)]
struct Report {
    result: Option<VocalRangeResult>,
    root_note: Option<NoteLabel>,
    stable_readings: usize,
    analysed_frames: usize,
}

/// Logs live pitch, progress and snapshots.
#[derive(Debug, Default)]
struct ConsoleObserver {
    analysed_frames: usize,
}

impl RangeObserver for ConsoleObserver {
    fn on_pitch(&mut self, estimate: &PitchEstimate) {
        self.analysed_frames += 1;
        if let Some(freq) = estimate.frequency_hz {
            let note = vocal_core::frequency_to_note(freq);
            let cents = cents_between(freq, note.frequency()).unwrap_or_default();
            log::debug!(
                "[{:>7.2}s] {freq:7.1} Hz  {note} {cents:+.1} cents",
                estimate.timestamp.as_secs_f32(),
            );
        }
    }

    fn on_progress(&mut self, lowest_hz: f32, highest_hz: f32) {
        log::debug!(
            "range so far: {} - {}",
            vocal_core::frequency_to_note(lowest_hz),
            vocal_core::frequency_to_note(highest_hz)
        );
    }

    fn on_snapshot(&mut self, result: &VocalRangeResult) {
        log::info!(
            "snapshot: {} ({:.1} Hz) - {} ({:.1} Hz), {} semitones, {}",
            result.lowest_note,
            result.lowest_frequency_hz,
            result.highest_note,
            result.highest_frequency_hz,
            result.range_semitones,
            result.voice_type
        );
    }
}

fn main() -> Result<()> {
    init_logging();

    let options = parse_options(&cli().get_matches())?;
    let config = load_config(options.config.as_deref())?;
    log::debug!("options: {options:?}, config: {config:?}");

    let report = run(&options, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cli() -> Command {
    let command = Command::new("vocal-range")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Find a singer's vocal range, voice type and a comfortable root note")
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("WAV recording of the singer")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("seconds")
                .short('s')
                .long("seconds")
                .value_name("SECONDS")
                .help("Stop the session after this much audio")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("frame-size")
                .long("frame-size")
                .value_name("SAMPLES")
                .help("Samples per analysed frame")
                .default_value("4096")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .value_name("MS")
                .help("Minimum time between analysed frames")
                .default_value("100")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON file overriding detector and tracker settings")
                .value_parser(clap::value_parser!(PathBuf)),
        );

    #[cfg(feature = "mic")]
    let command = command.arg(
        Arg::new("mic")
            .long("mic")
            .help("Capture from the default input device instead of a file")
            .action(clap::ArgAction::SetTrue)
            .conflicts_with("input"),
    );

    command
}

fn parse_options(matches: &ArgMatches) -> Result<Options> {
    let mic = matches
        .try_get_one::<bool>("mic")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false);
    let input = matches.get_one::<PathBuf>("input").cloned();
    if input.is_none() && !mic {
        let alternatives = if cfg!(feature = "mic") { " or --mic" } else { "" };
        bail!("no audio source: pass --input <FILE>{alternatives}");
    }

    let frame_size = matches.get_one::<usize>("frame-size").copied().unwrap_or(4096);
    if frame_size < 2 {
        bail!("--frame-size must be at least 2 samples");
    }

    let max_duration = match matches.get_one::<f64>("seconds").copied() {
        Some(secs) if secs > 0.0 => match Duration::try_from_secs_f64(secs) {
            Ok(limit) => Some(limit),
            Err(e) => bail!("--seconds {secs} is not a usable duration: {e}"),
        },
        Some(secs) => bail!("--seconds must be positive, got {secs}"),
        None => None,
    };

    let interval_ms = matches.get_one::<u64>("interval-ms").copied().unwrap_or(100);

    Ok(Options {
        input,
        mic,
        max_duration,
        frame_size,
        interval: Duration::from_millis(interval_ms),
        config: matches.get_one::<PathBuf>("config").cloned(),
    })
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

/// Keeps the audio source alive for the duration of the session.
enum SourceGuard {
    Reader(std::thread::JoinHandle<()>),
    #[cfg(feature = "mic")]
    Stream(cpal::Stream),
}

fn open_source(options: &Options) -> Result<(Receiver<Frame>, u32, SourceGuard)> {
    #[cfg(feature = "mic")]
    {
        if options.mic {
            let (tx, rx) = crossbeam_channel::bounded(source::CHANNEL_CAPACITY);
            let (stream, sample_rate) = audio::start_audio_capture(tx, options.frame_size)?;
            return Ok((rx, sample_rate, SourceGuard::Stream(stream)));
        }
    }

    let Some(path) = options.input.as_deref() else {
        bail!("no input file given");
    };
    let (samples, sample_rate) = source::read_wav_mono(path)?;
    if sample_rate == 0 {
        bail!("{} reports a sample rate of 0", path.display());
    }
    // Files have no real-time constraint, so frames are cut one interval
    // apart instead of being dropped by the throttle.
    let hop = (options.interval.as_secs_f64() * f64::from(sample_rate)).round() as usize;
    let hop = if hop == 0 { options.frame_size } else { hop };
    let (rx, handle) = source::spawn_reader(samples, options.frame_size, hop);
    Ok((rx, sample_rate, SourceGuard::Reader(handle)))
}

fn run(options: &Options, config: SessionConfig) -> Result<Report> {
    let (frames, sample_rate, guard) = open_source(options)?;

    let mut session = RangeSession::new(config, ConsoleObserver::default());
    let mut throttle = Throttle::new(options.interval);
    session.start();
    match &options.input {
        Some(path) if !options.mic => log::info!("Analysing {}", path.display()),
        _ => log::info!("Listening... sing from your lowest to your highest comfortable note"),
    }

    loop {
        let frame = match frames.recv_timeout(STALL_TIMEOUT) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Audio source finished");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("No audio for {STALL_TIMEOUT:?}, stopping");
                break;
            }
        };

        let timestamp = frame.timestamp(sample_rate);
        if options.max_duration.is_some_and(|limit| timestamp >= limit) {
            log::info!("Time limit reached at {timestamp:?}");
            break;
        }
        if !throttle.ready(timestamp) {
            continue;
        }
        session.process_frame(AudioFrame::new(&frame.samples, sample_rate), timestamp);
    }

    let result = session.stop();
    let root_note = session.root_note();
    let stable_readings = session.tracker().stable_reading_count();
    if let Some((low, high)) = session.tracker().running_extrema() {
        log::info!(
            "Session extremes: {low:.1} Hz - {high:.1} Hz ({stable_readings} stable readings)"
        );
    }
    match (&result, root_note) {
        (Some(result), Some(root)) => {
            log::info!("Voice type: {}, root note: {root}", result.voice_type)
        }
        _ => log::warn!("Not enough stable singing for a result"),
    }

    drop(frames);
    match guard {
        SourceGuard::Reader(handle) => {
            if handle.join().is_err() {
                log::error!("Frame reader thread panicked");
            }
        }
        #[cfg(feature = "mic")]
        SourceGuard::Stream(stream) => {
            use cpal::traits::StreamTrait;
            if let Err(e) = stream.pause() {
                log::error!("Error pausing stream: {e}");
            }
        }
    }

    Ok(Report {
        result,
        root_note,
        stable_readings,
        analysed_frames: session.observer().analysed_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn options_require_a_source() {
        let matches = cli().try_get_matches_from(["vocal-range"]).unwrap();
        assert!(parse_options(&matches).is_err());
    }

    #[test]
    fn options_parse_defaults() {
        let matches = cli()
            .try_get_matches_from(["vocal-range", "-i", "take.wav", "-s", "30"])
            .unwrap();
        let options = parse_options(&matches).unwrap();
        assert_eq!(options.input, Some(PathBuf::from("take.wav")));
        assert_eq!(options.frame_size, 4096);
        assert_eq!(options.interval, Duration::from_millis(100));
        assert_eq!(options.max_duration, Some(Duration::from_secs(30)));
        assert!(!options.mic);
    }

    #[test]
    fn oversized_duration_is_rejected() {
        for secs in ["1e30", "inf", "NaN"] {
            let matches = cli()
                .try_get_matches_from(["vocal-range", "-i", "take.wav", "-s", secs])
                .unwrap();
            assert!(parse_options(&matches).is_err(), "{secs}");
        }
    }

    #[test]
    fn negative_duration_is_rejected() {
        let matches = cli()
            .try_get_matches_from(["vocal-range", "-i", "take.wav", "-s", "-1"])
            .unwrap();
        assert!(parse_options(&matches).is_err());
    }

    #[test]
    fn missing_config_means_defaults() {
        assert_eq!(load_config(None).unwrap(), SessionConfig::default());
    }

    #[test]
    fn wav_session_end_to_end() {
        let path = std::env::temp_dir().join(format!("vocal-range-{}.wav", std::process::id()));
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        // One second each of A3 and A4.
        for freq in [220.0f32, 440.0] {
            for i in 0..44100 {
                let s = 0.4 * (2.0 * std::f32::consts::PI * freq * i as f32 / 44100.0).sin();
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();

        let options = Options {
            input: Some(path.clone()),
            mic: false,
            max_duration: None,
            frame_size: 4096,
            interval: Duration::from_millis(100),
            config: None,
        };
        let report = run(&options, SessionConfig::default()).unwrap();
        std::fs::remove_file(&path).ok();

        let result = report.result.expect("result");
        assert_eq!(result.lowest_note.to_string(), "A3");
        assert_eq!(result.highest_note.to_string(), "A4");
        assert_eq!(result.range_semitones, 12);
        assert!(report.root_note.is_some());
        assert_eq!(report.analysed_frames, report.stable_readings);
    }
}
