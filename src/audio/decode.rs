use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer as DecodedSamples;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::features::SampleBuffer;

/// Decode any supported file into a mono buffer at its native sample rate.
pub fn decode_audio(path: &Path) -> Result<SampleBuffer> {
    let mut track = TrackReader::open(path)?;
    let mut mono = Vec::new();
    while track.read_block(&mut mono)? {}

    let buffer = SampleBuffer::new(mono, track.sample_rate);
    log::info!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        buffer.samples.len(),
        buffer.sample_rate,
        buffer.duration()
    );
    Ok(buffer)
}

/// The first decodable track of a container, read one packet at a time.
struct TrackReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    // (frames, channels, buffer); reallocated when a packet outgrows it
    scratch: Option<(u64, usize, DecodedSamples<f32>)>,
}

impl TrackReader {
    fn open(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let stream = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        let format = symphonia::default::get_probe()
            .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
            .context("Failed to probe audio format")?
            .format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio tracks found")?;
        let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create audio decoder")?;
        let track_id = track.id;

        Ok(Self { format, decoder, track_id, sample_rate, scratch: None })
    }

    /// Decode the next packet of this track onto `out`. Returns `false` at end of stream.
    fn read_block(&mut self, out: &mut Vec<f32>) -> Result<bool> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(false);
            }
            Err(SymphoniaError::ResetRequired) => {
                log::warn!("Track layout changed mid-stream; stopping decode");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != self.track_id {
            return Ok(true);
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                log::debug!("Skipping corrupt packet: {}", err);
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.capacity() as u64;
        let fits = matches!(
            &self.scratch,
            Some((capacity, layout, _)) if *capacity >= frames && *layout == channels
        );
        if !fits {
            self.scratch = None;
        }
        let (_, _, scratch) = self
            .scratch
            .get_or_insert_with(|| (frames, channels, DecodedSamples::new(frames, spec)));
        scratch.copy_interleaved_ref(decoded);
        downmix_into(out, scratch.samples(), channels);
        Ok(true)
    }
}

/// Append interleaved frames to `out`, averaging channels to mono.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.extend(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}
