//! # Audio Capture Module
//!
//! Live capture from the default input device using CPAL. Only built with the
//! `mic` feature.
//!
//! Incoming callback buffers are mixed down to mono and cut into fixed-size
//! frames, which are sent to the analysis loop over a channel.

use crate::source::Frame;
use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

/// Sample rate requested from the device when it supports it.
const TARGET_SAMPLE_RATE: u32 = 44100;

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel receiving one [`Frame`] per `frame_size` samples
/// * `frame_size` - Samples per frame
///
/// # Returns
/// * `Ok((stream, sample_rate))` - The running stream, which must be kept
///   alive, and its sample rate
/// * `Err(e)` - No device or no usable f32 input format
pub fn start_audio_capture(
    sender: Sender<Frame>,
    frame_size: usize,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    log::info!("Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = TARGET_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config: cpal::StreamConfig = supported_config
        .with_sample_rate(cpal::SampleRate(sample_rate))
        .into();
    let channels = usize::from(config.channels.max(1));

    log::info!("Selected sample rate: {sample_rate} Hz, {channels} channel(s)");

    let err_fn = |err| log::error!("An error occurred on the audio stream: {err}");

    let mut pending = Vec::with_capacity(frame_size * 2);
    let mut offset: u64 = 0;

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            pending.extend(
                data.chunks(channels)
                    .map(|c| c.iter().sum::<f32>() / c.len() as f32),
            );

            while pending.len() >= frame_size {
                let frame = Frame {
                    samples: pending[..frame_size].to_vec(),
                    offset,
                };
                offset += frame_size as u64;

                // Dropped when the analysis loop falls behind.
                let _ = sender.try_send(frame);

                pending.drain(..frame_size);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the f32 input configuration closest to `target_rate`, preferring mono.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let (min_rate, max_rate) = (c.min_sample_rate().0, c.max_sample_rate().0);
            let rate_distance = if (min_rate..=max_rate).contains(&target_rate) {
                0
            } else {
                min_rate.abs_diff(target_rate).min(max_rate.abs_diff(target_rate))
            };
            (rate_distance, c.channels())
        })
}
