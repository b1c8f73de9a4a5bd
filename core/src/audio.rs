use std::{
    fmt,
    io::{self, Cursor, Read},
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream::BoxStream};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

use crate::SpeechError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioFormat {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// WAV header for a 16 bit PCM stream of unknown length.
    pub fn wav_header(&self) -> Vec<u8> {
        hound::WavSpec {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
        .into_header_for_infinite_file()
    }
}

impl Default for AudioFormat {
    /// 16 kHz, 16 bit mono, what the speech service expects if nothing else is said.
    fn default() -> Self {
        Self::new(1, 16000)
    }
}

/// Audio input for recognition, translation and assessment.
///
/// Always a WAV stream: a header followed by 16 bit little endian PCM.
pub struct AudioSource {
    format: AudioFormat,
    chunks: BoxStream<'static, io::Result<Bytes>>,
}

impl AudioSource {
    /// A stream that already starts with a WAV header, for example a file.
    pub fn from_wav_stream(
        format: AudioFormat,
        chunks: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
    ) -> Self {
        Self {
            format,
            chunks: chunks.boxed(),
        }
    }

    /// A complete WAV file in memory. The format is taken from its header.
    pub fn from_wav_bytes(wav: impl Into<Bytes>) -> Result<Self, SpeechError> {
        let wav = wav.into();
        let spec = hound::WavReader::new(Cursor::new(&wav[..]))
            .map_err(|e| SpeechError::validation(format!("Invalid WAV audio: {e}")))?
            .spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(SpeechError::validation(format!(
                "Unsupported WAV sample format: {} bit {:?}, expected 16 bit PCM",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        let format = AudioFormat::new(spec.channels, spec.sample_rate);
        Ok(Self::from_wav_stream(
            format,
            futures::stream::iter([Ok(wav)]),
        ))
    }

    /// Raw 16 bit little endian PCM chunks. A WAV header is sent first.
    pub fn from_pcm(
        format: AudioFormat,
        chunks: impl Stream<Item = Bytes> + Send + 'static,
    ) -> Self {
        let header = Bytes::from(format.wav_header());
        let chunks = futures::stream::once(async move { header })
            .chain(chunks)
            .map(Ok);
        Self::from_wav_stream(format, chunks)
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        self.chunks
    }
}

impl fmt::Debug for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSource")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Synthesized audio formats, named after the `X-Microsoft-OutputFormat` values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    Riff8Khz16BitMonoPcm,
    #[default]
    Riff16Khz16BitMonoPcm,
    Riff22050Hz16BitMonoPcm,
    Riff24Khz16BitMonoPcm,
    Riff44100Hz16BitMonoPcm,
    Riff48Khz16BitMonoPcm,
    Raw8Khz16BitMonoPcm,
    Raw16Khz16BitMonoPcm,
    Raw22050Hz16BitMonoPcm,
    Raw24Khz16BitMonoPcm,
    Raw44100Hz16BitMonoPcm,
    Raw48Khz16BitMonoPcm,
    Audio16Khz32KBitRateMonoMp3,
    Audio24Khz48KBitRateMonoMp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Riff8Khz16BitMonoPcm => "riff-8khz-16bit-mono-pcm",
            Self::Riff16Khz16BitMonoPcm => "riff-16khz-16bit-mono-pcm",
            Self::Riff22050Hz16BitMonoPcm => "riff-22050hz-16bit-mono-pcm",
            Self::Riff24Khz16BitMonoPcm => "riff-24khz-16bit-mono-pcm",
            Self::Riff44100Hz16BitMonoPcm => "riff-44100hz-16bit-mono-pcm",
            Self::Riff48Khz16BitMonoPcm => "riff-48khz-16bit-mono-pcm",
            Self::Raw8Khz16BitMonoPcm => "raw-8khz-16bit-mono-pcm",
            Self::Raw16Khz16BitMonoPcm => "raw-16khz-16bit-mono-pcm",
            Self::Raw22050Hz16BitMonoPcm => "raw-22050hz-16bit-mono-pcm",
            Self::Raw24Khz16BitMonoPcm => "raw-24khz-16bit-mono-pcm",
            Self::Raw44100Hz16BitMonoPcm => "raw-44100hz-16bit-mono-pcm",
            Self::Raw48Khz16BitMonoPcm => "raw-48khz-16bit-mono-pcm",
            Self::Audio16Khz32KBitRateMonoMp3 => "audio-16khz-32kbitrate-mono-mp3",
            Self::Audio24Khz48KBitRateMonoMp3 => "audio-24khz-48kbitrate-mono-mp3",
        }
    }

    /// Sample rate and channels of the PCM formats. `None` for compressed formats.
    pub fn pcm_format(&self) -> Option<AudioFormat> {
        let sample_rate = match self {
            Self::Riff8Khz16BitMonoPcm | Self::Raw8Khz16BitMonoPcm => 8000,
            Self::Riff16Khz16BitMonoPcm | Self::Raw16Khz16BitMonoPcm => 16000,
            Self::Riff22050Hz16BitMonoPcm | Self::Raw22050Hz16BitMonoPcm => 22050,
            Self::Riff24Khz16BitMonoPcm | Self::Raw24Khz16BitMonoPcm => 24000,
            Self::Riff44100Hz16BitMonoPcm | Self::Raw44100Hz16BitMonoPcm => 44100,
            Self::Riff48Khz16BitMonoPcm | Self::Raw48Khz16BitMonoPcm => 48000,
            Self::Audio16Khz32KBitRateMonoMp3 | Self::Audio24Khz48KBitRateMonoMp3 => return None,
        };
        Some(AudioFormat::new(1, sample_rate))
    }

    /// `true` if the audio starts with a WAV header.
    pub fn is_riff(&self) -> bool {
        self.as_str().starts_with("riff-")
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The default audio output device.
#[async_trait]
pub trait AudioPlayer: fmt::Debug + Send + Sync {
    /// Play the audio and return when playback has finished.
    async fn play(&self, format: OutputFormat, audio: Bytes) -> anyhow::Result<()>;
}

/// Synthesized audio the caller drains at its own pace.
#[derive(Debug, Clone, Default)]
pub struct PullAudioStream {
    audio: Bytes,
    position: usize,
}

impl PullAudioStream {
    pub fn new(audio: Bytes) -> Self {
        Self { audio, position: 0 }
    }

    /// Copy the next bytes into `buffer`. Returns 0 when drained.
    pub fn read(&mut self, buffer: &mut [u8]) -> usize {
        let remaining = &self.audio[self.position..];
        let n = remaining.len().min(buffer.len());
        buffer[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }

    pub fn remaining(&self) -> usize {
        self.audio.len() - self.position
    }

    pub fn is_drained(&self) -> bool {
        self.remaining() == 0
    }
}

impl Read for PullAudioStream {
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        Ok(PullAudioStream::read(self, buffer))
    }
}

impl AsyncRead for PullAudioStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let remaining = &this.audio[this.position..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        this.position += n;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    fn wav_file(format: AudioFormat, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for sample in samples {
                writer.write_sample(*sample).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[tokio::test]
    async fn pcm_source_starts_with_a_wav_header() {
        let format = AudioFormat::new(1, 8000);
        let source = AudioSource::from_pcm(
            format,
            futures::stream::iter([Bytes::from_static(&[1, 0, 2, 0])]),
        );
        assert_eq!(source.format(), format);

        let chunks: Vec<Bytes> = source
            .into_stream()
            .map(|chunk| chunk.unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0][..4], b"RIFF");
        assert_eq!(chunks[0].to_vec(), format.wav_header());
        assert_eq!(&chunks[1][..], &[1, 0, 2, 0]);
    }

    #[test]
    fn wav_bytes_provide_their_format() {
        let format = AudioFormat::new(1, 24000);
        let source = AudioSource::from_wav_bytes(wav_file(format, &[0, 1, 2])).unwrap();
        assert_eq!(source.format(), format);
    }

    #[test]
    fn garbage_is_not_a_wav_file() {
        assert!(matches!(
            AudioSource::from_wav_bytes(Bytes::from_static(b"definitely not audio")),
            Err(SpeechError::Validation { .. })
        ));
    }

    #[test]
    fn output_format_properties() {
        assert_eq!(
            OutputFormat::default().as_str(),
            "riff-16khz-16bit-mono-pcm"
        );
        assert!(OutputFormat::default().is_riff());
        assert_eq!(
            OutputFormat::Raw48Khz16BitMonoPcm.pcm_format(),
            Some(AudioFormat::new(1, 48000))
        );
        assert_eq!(OutputFormat::Audio16Khz32KBitRateMonoMp3.pcm_format(), None);
    }

    #[test]
    fn pull_stream_drains_in_pieces() {
        let mut stream = PullAudioStream::new(Bytes::from_static(b"abcdefg"));
        let mut buffer = [0u8; 3];
        assert_eq!(stream.read(&mut buffer), 3);
        assert_eq!(&buffer, b"abc");
        assert_eq!(stream.remaining(), 4);
        assert_eq!(stream.read(&mut buffer), 3);
        assert_eq!(stream.read(&mut buffer), 1);
        assert_eq!(buffer[0], b'g');
        assert_eq!(stream.read(&mut buffer), 0);
        assert!(stream.is_drained());
    }

    #[tokio::test]
    async fn pull_stream_is_async_readable() {
        let mut stream = PullAudioStream::new(Bytes::from_static(b"audio bytes"));
        let mut all = Vec::new();
        // `Read` is implemented as well.
        AsyncReadExt::read_to_end(&mut stream, &mut all)
            .await
            .unwrap();
        assert_eq!(all, b"audio bytes");
    }
}
