//! # Frame Source Module
//!
//! Turns a WAV file into a stream of analysis frames delivered over a channel,
//! the same way live capture delivers them.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Frames buffered between the reader and the analysis loop.
pub const CHANNEL_CAPACITY: usize = 16;

/// A mono frame and its position in the stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub samples: Vec<f32>,
    /// Index of the first sample since the start of the stream.
    pub offset: u64,
}

impl Frame {
    /// Stream position of the frame's first sample.
    pub fn timestamp(&self, sample_rate: u32) -> Duration {
        samples_to_duration(self.offset, sample_rate)
    }
}

pub fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(samples.saturating_mul(1_000_000_000) / u64::from(sample_rate))
}

/// Reads a WAV file as mono f32 samples in [-1, 1].
///
/// # Returns
/// * `Ok((samples, sample_rate))`
/// * `Err(e)` - The file could not be opened or decoded
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = int_scale(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    log::info!(
        "Loaded {}: {} Hz, {} channel(s), {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    Ok((mix_to_mono(&interleaved, spec.channels), spec.sample_rate))
}

/// Full-scale value of a signed integer sample with `bits` bits.
fn int_scale(bits: u16) -> f32 {
    (1u64 << bits.clamp(1, 32).saturating_sub(1)) as f32
}

fn mix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = usize::from(channels.max(1));
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Start offsets of every full `frame_size` window spaced `hop` samples apart.
fn frame_offsets(len: usize, frame_size: usize, hop: usize) -> impl Iterator<Item = usize> {
    let last_start = len.checked_sub(frame_size);
    (0..).step_by(hop.max(1)).take_while(move |&start| last_start.is_some_and(|last| start <= last))
}

/// Spawns a thread that sends `samples` as overlapping frames. The channel
/// disconnects once the file is exhausted or the receiver is dropped.
pub fn spawn_reader(
    samples: Vec<f32>,
    frame_size: usize,
    hop: usize,
) -> (Receiver<Frame>, JoinHandle<()>) {
    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_CAPACITY);
    let handle = thread::spawn(move || send_frames(&samples, frame_size, hop, &tx));
    (rx, handle)
}

fn send_frames(samples: &[f32], frame_size: usize, hop: usize, tx: &Sender<Frame>) {
    for start in frame_offsets(samples.len(), frame_size, hop) {
        let frame = Frame {
            samples: samples[start..start + frame_size].to_vec(),
            offset: start as u64,
        };
        if tx.send(frame).is_err() {
            log::debug!("frame receiver dropped, reader exiting");
            return;
        }
    }
}
