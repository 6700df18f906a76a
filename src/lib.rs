//! Channel estimation with a Zadoff-Chu (ZC) sounding burst. The transmitter repeatedly sends the
//! inverse DFT of a known ZC sequence; receivers record raw IQ. Offline, for each capture:
//!
//! <raw IQ file> -> samples -> cross-correlate with the known burst -> onsets
//!   -> burst-length segment per onset -> DFT / reference tones -> channel estimate
//!
//! The estimate is per occupied DFT bin. Its inverse DFT is the power-delay profile, and its phase
//! (after removing the slope left by an onset error) is what is left of the channel's phase.
//!
//! The tone-to-bin convention (`ToneOrdering`) and the burst length are carried by
//! `ReferenceSequence`; the transmitter burst, the locator and the estimator all take them from
//! there, so they can't disagree.

mod burst_locate;
mod capture;
mod config;
mod dft;
mod error;
mod estimate;
mod logging;
mod pipeline;
mod segment;
mod tx_waveform;
mod zadoff_chu;

pub use burst_locate::{cross_correlate, rank_candidates, BurstCandidate, BurstLocator};
pub use capture::{
    decode_samples, encode_samples, load_capture, write_capture, CaptureBuffer, CaptureChannel,
    CaptureSource, ChannelLength, SampleFormat,
};
pub use config::{
    Alignment, CaptureSourceDes, ChannelEstConfig, ChannelEstConfigDes, TxConfig, TxConfigDes,
    ZcParamsDes,
};
pub use error::ChannelEstError;
pub use estimate::{to_db, unwrap_phase, ChannelEstimate, ChannelEstimator};
pub use logging::init_logging;
pub use pipeline::{ChannelDetections, ChannelFailure, Experiment, ExperimentReport};
pub use segment::{extract_segments, AlignedSegment, DEFAULT_SEGMENT_CAP};
pub use tx_waveform::{build_configured_burst, build_tx_burst};
pub use zadoff_chu::{centered_roll, ReferenceSequence, ToneOrdering, ZcParams};
