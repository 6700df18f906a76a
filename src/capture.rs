//! Raw IQ capture files. A capture is a headerless sequence of records, each an interleaved
//! (real, imaginary) pair:
//!  - `Sc16`: two little-endian `i16`, scaled by 2^-15 so they land in [-1, 1)
//!  - `Fc32`: two little-endian `f32`, used as-is

use crate::error::ChannelEstError;
use byteorder::{ByteOrder, LittleEndian};
use num::Complex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SC16_SCALE: f32 = 32768.;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Interleaved 16-bit signed integers
    Sc16,
    /// Interleaved 32-bit floats
    Fc32,
}

impl SampleFormat {
    /// Bytes in one (re, im) record
    pub fn record_size(self) -> usize {
        match self {
            SampleFormat::Sc16 => 4,
            SampleFormat::Fc32 => 8,
        }
    }
}

/// Decode a raw byte buffer. `path` is only used to make errors readable
pub fn decode_samples(
    bytes: &[u8],
    format: SampleFormat,
    path: &str,
) -> Result<Vec<Complex<f32>>, ChannelEstError> {
    let record = format.record_size();
    if bytes.is_empty() {
        return Err(ChannelEstError::CaptureRead {
            path: path.to_string(),
            reason: "file is empty".to_string(),
        });
    }
    if bytes.len() % record != 0 {
        return Err(ChannelEstError::CaptureRead {
            path: path.to_string(),
            reason: format!(
                "length {} is not a multiple of the {}-byte record",
                bytes.len(),
                record
            ),
        });
    }

    let samps = bytes
        .chunks_exact(record)
        .map(|r| match format {
            SampleFormat::Sc16 => Complex::new(
                LittleEndian::read_i16(&r[0..2]) as f32 / SC16_SCALE,
                LittleEndian::read_i16(&r[2..4]) as f32 / SC16_SCALE,
            ),
            SampleFormat::Fc32 => Complex::new(
                LittleEndian::read_f32(&r[0..4]),
                LittleEndian::read_f32(&r[4..8]),
            ),
        })
        .collect();
    Ok(samps)
}

/// Read a whole capture file into memory
pub fn load_capture<P: AsRef<Path>>(
    path: P,
    format: SampleFormat,
) -> Result<Vec<Complex<f32>>, ChannelEstError> {
    let path = path.as_ref();
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| ChannelEstError::CaptureRead {
        path: name.clone(),
        reason: e.to_string(),
    })?;
    let samps = decode_samples(&bytes, format, &name)?;
    debug!("Loaded {} samples from {}", samps.len(), name);
    Ok(samps)
}

/// Inverse of `decode_samples`. Integer formats saturate instead of wrapping
pub fn encode_samples(samps: &[Complex<f32>], format: SampleFormat) -> Vec<u8> {
    let record = format.record_size();
    let mut res = Vec::with_capacity(samps.len() * record);
    let mut buf = [0u8; 8];
    for s in samps {
        match format {
            SampleFormat::Sc16 => {
                LittleEndian::write_i16(&mut buf[0..2], to_sc16(s.re));
                LittleEndian::write_i16(&mut buf[2..4], to_sc16(s.im));
            }
            SampleFormat::Fc32 => {
                LittleEndian::write_f32(&mut buf[0..4], s.re);
                LittleEndian::write_f32(&mut buf[4..8], s.im);
            }
        }
        res.extend_from_slice(&buf[..record]);
    }
    res
}

fn to_sc16(x: f32) -> i16 {
    (x * SC16_SCALE)
        .round()
        .max(i16::MIN as f32)
        .min(i16::MAX as f32) as i16
}

pub fn write_capture<P: AsRef<Path>>(
    path: P,
    samps: &[Complex<f32>],
    format: SampleFormat,
) -> std::io::Result<()> {
    std::fs::write(path, encode_samples(samps, format))
}

/// Where one receiver channel's capture lives
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSource {
    pub id: String,
    pub path: PathBuf,
}

impl CaptureSource {
    /// Use the file stem as the channel id
    pub fn from_path<P: Into<PathBuf>>(path: P) -> Self {
        let path = path.into();
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { id, path }
    }
}

/// The samples of one receiver channel
#[derive(Clone, Debug)]
pub struct CaptureChannel {
    pub id: String,
    /// File the samples were read from
    pub path: PathBuf,
    pub samples: Vec<Complex<f32>>,
}

/// Sample count of one channel, for reporting channels that disagree
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelLength {
    pub channel: String,
    pub path: PathBuf,
    pub samples: usize,
}

/// All channels captured in one experiment, at one sample rate
#[derive(Clone, Debug)]
pub struct CaptureBuffer {
    pub sample_rate: f64,
    pub channels: Vec<CaptureChannel>,
}

impl CaptureBuffer {
    pub fn new(sample_rate: f64, channels: Vec<CaptureChannel>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Load every source. A channel that can't be read is left out and its error returned
    /// alongside, so one bad file doesn't stop the others
    pub fn load(
        sources: &[CaptureSource],
        format: SampleFormat,
        sample_rate: f64,
    ) -> (Self, Vec<(CaptureSource, ChannelEstError)>) {
        let mut channels = Vec::with_capacity(sources.len());
        let mut errors = Vec::new();
        for src in sources {
            match load_capture(&src.path, format) {
                Ok(samples) => channels.push(CaptureChannel {
                    id: src.id.clone(),
                    path: src.path.clone(),
                    samples,
                }),
                Err(e) => {
                    warn!("Skipping channel '{}': {}", src.id, e);
                    errors.push((src.clone(), e));
                }
            }
        }
        (Self::new(sample_rate, channels), errors)
    }

    pub fn channel(&self, id: &str) -> Option<&CaptureChannel> {
        self.channels.iter().find(|c| c.id == id)
    }

    /// All channels are supposed to have the same number of samples. If they don't, returns every
    /// channel with its file and length
    pub fn length_mismatch(&self) -> Option<Vec<ChannelLength>> {
        let first = self.channels.first()?.samples.len();
        if self.channels.iter().all(|c| c.samples.len() == first) {
            None
        } else {
            Some(
                self.channels
                    .iter()
                    .map(|c| ChannelLength {
                        channel: c.id.clone(),
                        path: c.path.clone(),
                        samples: c.samples.len(),
                    })
                    .collect(),
            )
        }
    }
}
