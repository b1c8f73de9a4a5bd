//! The default speaker and the default microphone.
use std::{io::Cursor, thread, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use rodio::{
    buffer::SamplesBuffer,
    cpal::{
        self,
        traits::{DeviceTrait, HostTrait, StreamTrait},
    },
};
use tokio::{sync::mpsc, task};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{SpeechService, TranslationRequest};
use speech_bridge_core::{
    AudioFormat, AudioPlayer, AudioSource, OutputFormat, PronunciationAssessmentResult,
    SpeechError,
};

/// Plays audio on the default output device.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSpeaker;

#[async_trait]
impl AudioPlayer for DefaultSpeaker {
    async fn play(&self, format: OutputFormat, audio: Bytes) -> Result<()> {
        task::spawn_blocking(move || play_blocking(format, &audio)).await?
    }
}

fn play_blocking(format: OutputFormat, audio: &[u8]) -> Result<()> {
    let (audio_format, samples) = decode(format, audio)?;
    let mut stream = rodio::OutputStreamBuilder::open_default_stream()
        .context("Opening the default audio output")?;
    stream.log_on_drop(false);
    let sink = rodio::Sink::connect_new(stream.mixer());
    sink.append(SamplesBuffer::new(
        audio_format.channels,
        audio_format.sample_rate,
        samples,
    ));
    sink.sleep_until_end();
    Ok(())
}

fn decode(format: OutputFormat, audio: &[u8]) -> Result<(AudioFormat, Vec<f32>)> {
    if format.is_riff() {
        let reader = hound::WavReader::new(Cursor::new(audio)).context("Reading WAV audio")?;
        let spec = reader.spec();
        let samples = reader
            .into_samples::<i16>()
            .map(|s| s.map(i16_to_f32))
            .collect::<Result<Vec<f32>, _>>()
            .context("Decoding WAV samples")?;
        return Ok((AudioFormat::new(spec.channels, spec.sample_rate), samples));
    }

    let Some(audio_format) = format.pcm_format() else {
        bail!("`{format}`: Playback of compressed audio is not supported");
    };
    let samples = audio
        .chunks_exact(2)
        .map(|b| i16_to_f32(i16::from_le_bytes([b[0], b[1]])))
        .collect();
    Ok((audio_format, samples))
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// The rate the microphone audio is sent with.
const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Record from the default input device until `stop` is triggered.
///
/// The audio is delivered as 16 kHz mono PCM, whatever the device records.
///
/// The capture runs on its own thread because audio streams can not be moved between threads.
pub fn default_microphone(stop: CancellationToken) -> Result<AudioSource, SpeechError> {
    let (started_sender, started) = std::sync::mpsc::sync_channel(1);
    let (chunk_sender, mut chunks) = mpsc::unbounded_channel::<Bytes>();

    thread::spawn(move || {
        let stream = match open_input_stream(chunk_sender) {
            Ok(stream) => {
                let _ = started_sender.send(Ok(()));
                stream
            }
            Err(e) => {
                let _ = started_sender.send(Err(e));
                return;
            }
        };
        futures::executor::block_on(stop.cancelled());
        info!("Microphone stopped");
        drop(stream);
    });

    started
        .recv()
        .map_err(|_| anyhow!("Microphone thread ended unexpectedly"))
        .and_then(|r| r)
        .map_err(|e| {
            SpeechError::configuration(format!("No default audio input device available: {e:#}"))
        })?;

    Ok(AudioSource::from_pcm(
        AudioFormat::new(1, CAPTURE_SAMPLE_RATE),
        stream! {
            while let Some(chunk) = chunks.recv().await {
                yield chunk;
            }
        },
    ))
}

fn open_input_stream(chunks: mpsc::UnboundedSender<Bytes>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("Failed to get default input device")?;
    let config = input_config(&device)?;

    let device_format = AudioFormat::new(config.channels(), config.sample_rate().0);
    info!("Recording from the default microphone: {device_format:?}");
    let mut resampler = Resampler::new(device_format, CAPTURE_SAMPLE_RATE);

    let stream = device.build_input_stream(
        &config.into(),
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let bytes: Vec<u8> = resampler
                .process(data)
                .into_iter()
                .flat_map(|s| f32_to_i16(s).to_le_bytes())
                .collect();
            // Receiver gone: the consumer is not interested anymore.
            let _ = chunks.send(bytes.into());
        },
        move |err| {
            error!("Error occurred on input stream: {err}");
        },
        Some(Duration::from_secs(1)),
    )?;
    stream.play()?;
    Ok(stream)
}

/// A 16 kHz mono configuration if the device supports one, the device default otherwise.
fn input_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig> {
    let capture = device.supported_input_configs().ok().and_then(|mut configs| {
        configs.find(|c| {
            c.channels() == 1
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate().0 <= CAPTURE_SAMPLE_RATE
                && c.max_sample_rate().0 >= CAPTURE_SAMPLE_RATE
        })
    });
    match capture {
        Some(range) => Ok(range.with_sample_rate(cpal::SampleRate(CAPTURE_SAMPLE_RATE))),
        None => device
            .default_input_config()
            .context("Failed to get default input config"),
    }
}

/// Downmixes interleaved samples to mono and converts them to another rate by linear
/// interpolation. Keeps its position across chunks.
#[derive(Debug)]
struct Resampler {
    channels: usize,
    /// Input samples per output sample.
    step: f64,
    /// Position of the next output sample, relative to `previous`.
    position: f64,
    previous: Option<f32>,
}

impl Resampler {
    fn new(from: AudioFormat, to_sample_rate: u32) -> Self {
        Self {
            channels: usize::from(from.channels.max(1)),
            step: f64::from(from.sample_rate) / f64::from(to_sample_rate),
            position: 0.0,
            previous: None,
        }
    }

    fn process(&mut self, interleaved: &[f32]) -> Vec<f32> {
        let mut output = Vec::with_capacity((interleaved.len() as f64 / self.step) as usize + 1);
        for frame in interleaved.chunks(self.channels) {
            let sample = frame.iter().sum::<f32>() / frame.len() as f32;
            let Some(previous) = self.previous.replace(sample) else {
                continue;
            };
            while self.position < 1.0 {
                output.push(previous + (sample - previous) * self.position as f32);
                self.position += self.step;
            }
            self.position -= 1.0;
        }
        output
    }
}

impl SpeechService {
    /// Assess `duration` of speech recorded from the default microphone.
    pub async fn assess_pronunciation_from_default_microphone(
        &self,
        reference_text: &str,
        duration: Duration,
    ) -> Result<PronunciationAssessmentResult, SpeechError> {
        let stop = CancellationToken::new();
        let audio = default_microphone(stop.clone())?;
        let _timer = {
            let stop = stop.clone();
            task::spawn(async move {
                tokio::time::sleep(duration).await;
                stop.cancel();
            })
        };
        let _stop_on_return = stop.drop_guard();
        self.assess_pronunciation(reference_text, audio).await
    }

    /// Translate speech from the default microphone until `stop` is triggered and speak the
    /// translations on the default speaker.
    pub async fn translate_continuous_from_default_microphone(
        &self,
        request: TranslationRequest,
        stop: CancellationToken,
    ) -> Result<Vec<String>, SpeechError> {
        let audio = default_microphone(stop)?;
        self.translate_continuous(request, audio).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_pcm_is_decoded_little_endian() {
        let (format, samples) =
            decode(OutputFormat::Raw16Khz16BitMonoPcm, &[0xff, 0x7f, 0, 0]).unwrap();
        assert_eq!(format, AudioFormat::new(1, 16000));
        assert_eq!(samples, [1.0, 0.0]);
    }

    #[test]
    fn mp3_is_not_decoded() {
        assert!(decode(OutputFormat::Audio16Khz32KBitRateMonoMp3, &[]).is_err());
    }

    #[test]
    fn sample_conversion_clamps() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
    }

    #[test]
    fn stereo_48khz_is_captured_as_16khz_mono() {
        let mut resampler = Resampler::new(AudioFormat::new(2, 48_000), CAPTURE_SAMPLE_RATE);
        // Three callbacks of 20ms each.
        let chunk = vec![0.5f32; 2 * 960];
        let output: Vec<f32> = (0..3).flat_map(|_| resampler.process(&chunk)).collect();
        assert_eq!(output.len(), 960);
        assert!(output.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn channels_are_averaged() {
        let mut resampler = Resampler::new(AudioFormat::new(2, 16_000), CAPTURE_SAMPLE_RATE);
        let output = resampler.process(&[1.0, 0.0, 0.0, 1.0, 0.5, 0.5]);
        assert_eq!(output, [0.5, 0.5]);
    }

    #[test]
    fn interpolates_between_samples() {
        let mut resampler = Resampler::new(AudioFormat::new(1, 8_000), CAPTURE_SAMPLE_RATE);
        let output = resampler.process(&[0.0, 1.0, 0.0]);
        assert_eq!(output, [0.0, 0.5, 1.0, 0.5]);
    }
}
