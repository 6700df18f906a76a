//! Runs the whole estimation for one experiment: detect bursts, slice every channel at the
//! detected onsets and estimate the channel for each slice. Channels are independent and are
//! processed on separate threads; a failure on one channel or one burst is recorded in the report
//! and doesn't stop the rest.

use crate::burst_locate::{BurstCandidate, BurstLocator};
use crate::capture::{CaptureBuffer, CaptureChannel, CaptureSource, ChannelLength, SampleFormat};
use crate::config::{Alignment, ChannelEstConfig};
use crate::error::ChannelEstError;
use crate::estimate::{ChannelEstimate, ChannelEstimator};
use crate::segment::extract_segments;
use crate::zadoff_chu::{ReferenceSequence, ToneOrdering, ZcParams};
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::{debug, info, warn};

fn serialize_display<T: Display, S: Serializer>(x: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(x)
}

/// Something that went wrong for one channel, or for one burst of a channel (`onset` is set)
#[derive(Clone, Debug, Serialize)]
pub struct ChannelFailure {
    pub channel: String,
    /// Capture file of the channel
    pub path: PathBuf,
    pub onset: Option<usize>,
    #[serde(serialize_with = "serialize_display")]
    pub error: ChannelEstError,
}

/// Bursts found on one channel
#[derive(Clone, Debug, Serialize)]
pub struct ChannelDetections {
    pub channel: String,
    pub candidates: Vec<BurstCandidate>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ExperimentReport {
    pub reference: ZcParams,
    pub ordering: ToneOrdering,
    pub sample_rate: f64,
    /// Set if the channels don't all have the same number of samples
    pub length_mismatch: Option<Vec<ChannelLength>>,
    pub detections: Vec<ChannelDetections>,
    /// In channel order, then onset order
    pub estimates: Vec<ChannelEstimate>,
    pub failures: Vec<ChannelFailure>,
}

/// What one channel's worker hands back
struct ChannelOutcome {
    detections: Option<ChannelDetections>,
    estimates: Vec<ChannelEstimate>,
    failures: Vec<ChannelFailure>,
}

pub struct Experiment {
    reference: ReferenceSequence,
    locator: BurstLocator,
    segment_cap: usize,
    alignment: Alignment,
}

impl Experiment {
    pub fn new(config: &ChannelEstConfig) -> Result<Self, ChannelEstError> {
        if config.segment_cap == 0 {
            return Err(ChannelEstError::invalid("segment_cap must be at least 1"));
        }
        Ok(Self {
            reference: config.reference()?,
            locator: config.locator()?,
            segment_cap: config.segment_cap,
            alignment: config.alignment.clone(),
        })
    }

    pub fn reference(&self) -> &ReferenceSequence {
        &self.reference
    }

    /// Load the capture files and run. Files that can't be read show up as failures
    pub fn run_files(
        &self,
        sources: &[CaptureSource],
        format: SampleFormat,
        sample_rate: f64,
    ) -> ExperimentReport {
        let (captures, load_errors) = CaptureBuffer::load(sources, format, sample_rate);
        let mut report = self.run(&captures);
        let mut failures: Vec<_> = load_errors
            .into_iter()
            .map(|(src, error)| ChannelFailure {
                channel: src.id,
                path: src.path,
                onset: None,
                error,
            })
            .collect();
        failures.append(&mut report.failures);
        report.failures = failures;
        report
    }

    pub fn run(&self, captures: &CaptureBuffer) -> ExperimentReport {
        let mut report = ExperimentReport {
            reference: *self.reference.params(),
            ordering: self.reference.ordering(),
            sample_rate: captures.sample_rate,
            length_mismatch: None,
            detections: Vec::new(),
            estimates: Vec::new(),
            failures: Vec::new(),
        };
        if captures.channels.is_empty() {
            warn!("No channels to process");
            return report;
        }
        if let Some(lens) = captures.length_mismatch() {
            warn!("Channels have different lengths: {:?}", lens);
            report.length_mismatch = Some(lens);
        }

        // Onsets every channel is sliced at, unless each channel detects on its own
        let shared_onsets = match self.detection_channel(captures) {
            Err(e) => {
                warn!("{}", e);
                report.failures = captures
                    .channels
                    .iter()
                    .map(|c| ChannelFailure {
                        channel: c.id.clone(),
                        path: c.path.clone(),
                        onset: None,
                        error: e.clone(),
                    })
                    .collect();
                return report;
            }
            Ok(Some(chan)) => {
                let det = self.detect(chan);
                let onsets: Vec<usize> = det.candidates.iter().map(|c| c.onset).collect();
                report.detections.push(det);
                Some(onsets)
            }
            Ok(None) => None,
        };
        let shared_onsets = shared_onsets.as_deref();

        let outcomes: Vec<ChannelOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = captures
                .channels
                .iter()
                .map(|chan| s.spawn(move || self.process_channel(chan, shared_onsets)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(outcome) => outcome,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        });

        for mut outcome in outcomes {
            report.detections.extend(outcome.detections);
            report.estimates.append(&mut outcome.estimates);
            report.failures.append(&mut outcome.failures);
        }
        info!(
            "{} channel estimate(s), {} failure(s)",
            report.estimates.len(),
            report.failures.len()
        );
        report
    }

    fn detection_channel<'a>(
        &self,
        captures: &'a CaptureBuffer,
    ) -> Result<Option<&'a CaptureChannel>, ChannelEstError> {
        match &self.alignment {
            Alignment::PerChannel => Ok(None),
            Alignment::FirstChannel => Ok(captures.channels.first()),
            Alignment::Channel(id) => captures.channel(id).map(Some).ok_or_else(|| {
                ChannelEstError::invalid(format!(
                    "alignment channel '{}' is not among the loaded captures",
                    id
                ))
            }),
        }
    }

    fn detect(&self, chan: &CaptureChannel) -> ChannelDetections {
        let candidates = self.locator.locate(&chan.samples, &self.reference);
        match candidates.first() {
            Some(first) => info!(
                "Channel '{}': {} burst(s), first at {} (score {:.3})",
                chan.id,
                candidates.len(),
                first.onset,
                first.score
            ),
            None => warn!(
                "Channel '{}': no burst above threshold {}",
                chan.id,
                self.locator.threshold()
            ),
        }
        ChannelDetections {
            channel: chan.id.clone(),
            candidates,
        }
    }

    fn process_channel(&self, chan: &CaptureChannel, shared: Option<&[usize]>) -> ChannelOutcome {
        let (detections, onsets) = match shared {
            Some(onsets) => (None, onsets.to_vec()),
            None => {
                let det = self.detect(chan);
                let onsets = det.candidates.iter().map(|c| c.onset).collect();
                (Some(det), onsets)
            }
        };

        let segments = extract_segments(
            &chan.samples,
            &chan.id,
            &onsets,
            self.reference.burst_len(),
            self.segment_cap,
        );
        debug!(
            "Channel '{}': {} of {} onset(s) gave a full segment",
            chan.id,
            segments.len(),
            onsets.len()
        );

        let estimator = ChannelEstimator::new(&self.reference);
        let mut estimates = Vec::with_capacity(segments.len());
        let mut failures = Vec::new();
        for (seg, res) in segments.iter().zip(estimator.estimate_all(&segments)) {
            match res {
                Ok(est) => estimates.push(est),
                Err(error) => {
                    warn!("Channel '{}', onset {}: {}", seg.channel, seg.onset, error);
                    failures.push(ChannelFailure {
                        channel: seg.channel.clone(),
                        path: chan.path.clone(),
                        onset: Some(seg.onset),
                        error,
                    });
                }
            }
        }

        ChannelOutcome {
            detections,
            estimates,
            failures,
        }
    }
}
