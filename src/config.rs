use crate::burst_locate::BurstLocator;
use crate::capture::{CaptureSource, SampleFormat};
use crate::error::ChannelEstError;
use crate::segment::DEFAULT_SEGMENT_CAP;
use crate::zadoff_chu::{ReferenceSequence, ToneOrdering, ZcParams};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::path::{Path, PathBuf};

/// Which channel's detections decide where every channel is sliced
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Detect on the first channel that loaded and slice every channel at those onsets
    FirstChannel,
    /// Same, but detect on the channel with this id
    Channel(String),
    /// Every channel uses its own detections
    PerChannel,
}

impl Default for Alignment {
    fn default() -> Self {
        Alignment::FirstChannel
    }
}

/// ZC parameters as written in the config file. Kept as reals so that non-integers are caught
/// by the generator's checks rather than by the JSON parser
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ZcParamsDes {
    pub root: f64,
    pub length: f64,
    pub shift: f64,
}

impl Default for ZcParamsDes {
    fn default() -> Self {
        Self {
            root: 7.,
            length: 353.,
            shift: 0.,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CaptureSourceDes {
    pub path: String,
    /// Defaults to the file stem
    pub id: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TxConfigDes {
    pub peak_scale: Option<f32>,
}

/// Config exactly as read from JSON. Turn it into a `ChannelEstConfig` with `try_into` to have it
/// validated
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ChannelEstConfigDes {
    pub zc: ZcParamsDes,
    pub ordering: ToneOrdering,
    /// Burst length; the sequence length if not given
    pub num_samples: Option<usize>,
    pub threshold: f32,
    pub max_peaks: usize,
    pub segment_cap: usize,
    pub format: SampleFormat,
    pub sample_rate: f64,
    pub alignment: Alignment,
    pub captures: Vec<CaptureSourceDes>,
    pub tx: TxConfigDes,
}

impl Default for ChannelEstConfigDes {
    fn default() -> Self {
        Self {
            zc: ZcParamsDes::default(),
            ordering: ToneOrdering::Centered,
            num_samples: None,
            threshold: 0.9,
            max_peaks: 10,
            segment_cap: DEFAULT_SEGMENT_CAP,
            format: SampleFormat::Fc32,
            sample_rate: 250e3,
            alignment: Alignment::FirstChannel,
            captures: Vec::new(),
            tx: TxConfigDes::default(),
        }
    }
}

/// How the transmitter burst is built
#[derive(Clone, Debug, PartialEq)]
pub struct TxConfig {
    /// Largest |re| or |im| in the burst, in (0, 1]
    pub peak_scale: f32,
}

/// Validated configuration for one experiment
#[derive(Clone, Debug)]
pub struct ChannelEstConfig {
    pub zc: ZcParams,
    pub ordering: ToneOrdering,
    /// Samples per burst, at least the sequence length. The sequence is zero-padded up to it both
    /// when the burst is built and when it is estimated from
    pub num_samples: usize,
    /// Normalized correlation a lag has to exceed to count as a burst
    pub threshold: f32,
    /// Most bursts reported per detection channel
    pub max_peaks: usize,
    /// Most segments extracted per channel
    pub segment_cap: usize,
    pub format: SampleFormat,
    pub sample_rate: f64,
    pub alignment: Alignment,
    pub captures: Vec<CaptureSource>,
    pub tx: TxConfig,
}

impl TryFrom<ChannelEstConfigDes> for ChannelEstConfig {
    type Error = ChannelEstError;

    fn try_from(des: ChannelEstConfigDes) -> Result<Self, Self::Error> {
        let zc = ZcParams::from_reals(des.zc.root, des.zc.length, des.zc.shift)?;
        // Same checks the locator does
        BurstLocator::new(des.threshold, des.max_peaks)?;
        if des.segment_cap == 0 {
            return Err(ChannelEstError::invalid("segment_cap must be at least 1"));
        }
        if !(des.sample_rate.is_finite() && des.sample_rate > 0.) {
            return Err(ChannelEstError::invalid(format!(
                "sample rate {} must be positive",
                des.sample_rate
            )));
        }

        let num_samples = des.num_samples.unwrap_or_else(|| zc.len());
        if num_samples < zc.len() {
            return Err(ChannelEstError::invalid(format!(
                "num_samples {} is shorter than the sequence ({})",
                num_samples,
                zc.len()
            )));
        }
        let tx = TxConfig {
            peak_scale: des.tx.peak_scale.unwrap_or(0.85),
        };
        if !(tx.peak_scale > 0. && tx.peak_scale <= 1.) {
            return Err(ChannelEstError::invalid(format!(
                "tx peak_scale {} is not in (0, 1]",
                tx.peak_scale
            )));
        }

        let captures = des
            .captures
            .into_iter()
            .map(|c| {
                let src = CaptureSource::from_path(PathBuf::from(c.path));
                match c.id {
                    Some(id) => CaptureSource { id, ..src },
                    None => src,
                }
            })
            .collect();

        Ok(Self {
            zc,
            ordering: des.ordering,
            num_samples,
            threshold: des.threshold,
            max_peaks: des.max_peaks,
            segment_cap: des.segment_cap,
            format: des.format,
            sample_rate: des.sample_rate,
            alignment: des.alignment,
            captures,
            tx,
        })
    }
}

impl Default for ChannelEstConfig {
    fn default() -> Self {
        let zc = ZcParams {
            root: 7,
            length: 353,
            shift: 0,
        };
        Self {
            zc,
            ordering: ToneOrdering::Centered,
            num_samples: zc.len(),
            threshold: 0.9,
            max_peaks: 10,
            segment_cap: DEFAULT_SEGMENT_CAP,
            format: SampleFormat::Fc32,
            sample_rate: 250e3,
            alignment: Alignment::FirstChannel,
            captures: Vec::new(),
            tx: TxConfig { peak_scale: 0.85 },
        }
    }
}

impl ChannelEstConfig {
    pub fn from_json_str(s: &str) -> Result<Self, failure::Error> {
        let des: ChannelEstConfigDes = serde_json::from_str(s)?;
        Ok(Self::try_from(des)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, failure::Error> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }

    /// The reference the transmitter, the locator and the estimator must all use
    pub fn reference(&self) -> Result<ReferenceSequence, ChannelEstError> {
        ReferenceSequence::with_burst_len(self.zc, self.ordering, self.num_samples)
    }

    pub fn locator(&self) -> Result<BurstLocator, ChannelEstError> {
        BurstLocator::new(self.threshold, self.max_peaks)
    }
}
