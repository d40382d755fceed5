//! Clip sample formats and conversion to signed little-endian PCM.
//!
//! Output lines only ever see signed little-endian PCM. Everything else is
//! converted once, at load time:
//!
//! - unsigned PCM is re-centered around zero
//! - big-endian samples are byte-swapped
//! - 32/64-bit float is scaled and clamped to 16-bit
//! - A-law and µ-law (G.711) are expanded to 16-bit

use mediaplay_common::{PlaybackError, Result};

/// Sample encoding of raw clip data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Two's-complement integer samples.
    PcmSigned,
    /// Offset-binary integer samples.
    PcmUnsigned,
    /// IEEE float samples in `-1.0..=1.0`.
    PcmFloat,
    /// 8-bit G.711 A-law.
    ALaw,
    /// 8-bit G.711 µ-law.
    ULaw,
}

/// Layout of raw clip data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    /// Sample encoding
    pub encoding: Encoding,
    /// Frames per second
    pub sample_rate: u32,
    /// Bits per sample
    pub sample_size_bits: u16,
    /// Interleaved channel count
    pub channels: u16,
    /// Byte order of multi-byte samples
    pub big_endian: bool,
}

impl AudioFormat {
    /// Signed little-endian PCM.
    pub fn pcm_signed(sample_rate: u32, sample_size_bits: u16, channels: u16) -> Self {
        Self {
            encoding: Encoding::PcmSigned,
            sample_rate,
            sample_size_bits,
            channels,
            big_endian: false,
        }
    }

    /// Bytes per sample.
    pub fn sample_bytes(&self) -> usize {
        usize::from(self.sample_size_bits).div_ceil(8)
    }

    /// Bytes per interleaved frame.
    pub fn frame_size(&self) -> usize {
        self.sample_bytes() * usize::from(self.channels)
    }

    /// Whether data in this format can go to an output line unchanged.
    pub fn is_output_pcm(&self) -> bool {
        self.encoding == Encoding::PcmSigned && (!self.big_endian || self.sample_size_bits <= 8)
    }

    /// Format produced by [`normalize`] for this input.
    pub fn output_format(&self) -> AudioFormat {
        let bits = match self.encoding {
            Encoding::PcmSigned | Encoding::PcmUnsigned => self.sample_size_bits,
            Encoding::PcmFloat | Encoding::ALaw | Encoding::ULaw => 16,
        };
        AudioFormat::pcm_signed(self.sample_rate, bits, self.channels)
    }

    /// Frame index at `micros` from the start.
    pub fn frames_at_micros(&self, micros: u64) -> u64 {
        (u128::from(micros) * u128::from(self.sample_rate) / 1_000_000) as u64
    }

    /// Time offset of `frame` from the start.
    pub fn micros_at_frame(&self, frame: u64) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (u128::from(frame) * 1_000_000 / u128::from(self.sample_rate)) as u64
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(PlaybackError::UnsupportedFormat(format!(
                "{self}: sample rate and channel count must be non-zero"
            )));
        }
        let supported = match self.encoding {
            Encoding::PcmSigned | Encoding::PcmUnsigned => {
                matches!(self.sample_size_bits, 8 | 16 | 24 | 32)
            }
            Encoding::PcmFloat => matches!(self.sample_size_bits, 32 | 64),
            Encoding::ALaw | Encoding::ULaw => self.sample_size_bits == 8,
        };
        if supported {
            Ok(())
        } else {
            Err(PlaybackError::UnsupportedFormat(format!(
                "{self}: unsupported sample size"
            )))
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} {} Hz, {}-bit, {} ch, {}",
            self.encoding,
            self.sample_rate,
            self.sample_size_bits,
            self.channels,
            if self.big_endian { "BE" } else { "LE" }
        )
    }
}

/// Decoded clip ready to be handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipMedia {
    /// Layout of `data`
    pub format: AudioFormat,
    /// Interleaved sample bytes
    pub data: Vec<u8>,
}

impl ClipMedia {
    /// Wrap raw sample bytes.
    pub fn new(format: AudioFormat, data: Vec<u8>) -> Self {
        Self { format, data }
    }

    /// Number of whole frames.
    pub fn frame_count(&self) -> u64 {
        match self.format.frame_size() {
            0 => 0,
            size => (self.data.len() / size) as u64,
        }
    }

    /// Playing time of the clip.
    pub fn duration_micros(&self) -> u64 {
        self.format.micros_at_frame(self.frame_count())
    }

    /// Convert to signed little-endian PCM.
    pub fn normalized(self) -> Result<ClipMedia> {
        let (format, data) = normalize(&self.format, &self.data)?;
        Ok(ClipMedia { format, data })
    }
}

/// Convert `data` in `format` to signed little-endian PCM.
///
/// A trailing partial frame is dropped.
pub fn normalize(format: &AudioFormat, data: &[u8]) -> Result<(AudioFormat, Vec<u8>)> {
    format.validate()?;
    let whole = data.len() - data.len() % format.frame_size();
    if whole != data.len() {
        log::debug!(
            "dropping {} trailing bytes of partial frame",
            data.len() - whole
        );
    }
    let data = &data[..whole];
    let output = format.output_format();
    let width = format.sample_bytes();

    let converted = match format.encoding {
        Encoding::PcmSigned => to_little_endian(data, width, format.big_endian),
        Encoding::PcmUnsigned => {
            let mut bytes = to_little_endian(data, width, format.big_endian);
            for sample in bytes.chunks_exact_mut(width) {
                sample[width - 1] ^= 0x80;
            }
            bytes
        }
        Encoding::PcmFloat => data
            .chunks_exact(width)
            .flat_map(|chunk| float_to_i16(chunk, format.big_endian).to_le_bytes())
            .collect(),
        Encoding::ALaw => data
            .iter()
            .flat_map(|&byte| alaw_to_linear(byte).to_le_bytes())
            .collect(),
        Encoding::ULaw => data
            .iter()
            .flat_map(|&byte| ulaw_to_linear(byte).to_le_bytes())
            .collect(),
    };
    Ok((output, converted))
}

fn to_little_endian(data: &[u8], width: usize, big_endian: bool) -> Vec<u8> {
    let mut bytes = data.to_vec();
    if big_endian && width > 1 {
        for sample in bytes.chunks_exact_mut(width) {
            sample.reverse();
        }
    }
    bytes
}

fn float_to_i16(chunk: &[u8], big_endian: bool) -> i16 {
    let value = match chunk.len() {
        4 => {
            let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
            f64::from(if big_endian {
                f32::from_be_bytes(raw)
            } else {
                f32::from_le_bytes(raw)
            })
        }
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&chunk[..8]);
            if big_endian {
                f64::from_be_bytes(raw)
            } else {
                f64::from_le_bytes(raw)
            }
        }
    };
    if value.is_nan() {
        return 0;
    }
    (value.clamp(-1.0, 1.0) * f64::from(i16::MAX)).round() as i16
}

/// G.711 µ-law expansion.
fn ulaw_to_linear(byte: u8) -> i16 {
    let byte = !byte;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = i32::from(byte & 0x0F);
    let magnitude = (((mantissa << 3) + 0x84) << exponent) - 0x84;
    if byte & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// G.711 A-law expansion.
fn alaw_to_linear(byte: u8) -> i16 {
    let byte = byte ^ 0x55;
    let exponent = (byte >> 4) & 0x07;
    let mantissa = i32::from(byte & 0x0F);
    let mut magnitude = (mantissa << 4) + 8;
    if exponent != 0 {
        magnitude = (magnitude + 0x100) << (exponent - 1);
    }
    // Sign bit set means positive in A-law.
    if byte & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}
