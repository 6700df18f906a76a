use crate::dft::{fft, ifft};
use crate::error::ChannelEstError;
use crate::zadoff_chu::ReferenceSequence;
use num::{Complex, Zero};
use serde::Serialize;
use std::cmp::Ordering;

/// A lag at which the stream looks like the start of a reference burst
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BurstCandidate {
    /// Sample index in the stream where the burst starts
    pub onset: usize,
    /// Correlation magnitude at `onset` divided by the largest magnitude at any lag. In [0, 1]
    pub score: f32,
}

/// Sort candidates strongest first. Equal scores keep the earlier onset first
pub fn rank_candidates(candidates: &mut [BurstCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.onset.cmp(&b.onset))
    });
}

/// Full linear cross-correlation `c[j] = sum_n stream[n + j - (len(reference) - 1)] *
/// conj(reference[n])`, laid out like numpy's `correlate(.., mode="full")`. Index
/// `len(reference) - 1` is lag 0. Computed with one zero-padded DFT
pub fn cross_correlate(stream: &[Complex<f32>], reference: &[Complex<f32>]) -> Vec<Complex<f32>> {
    if stream.is_empty() || reference.is_empty() {
        return Vec::new();
    }
    let full_len = stream.len() + reference.len() - 1;

    let mut padded = stream.to_vec();
    padded.resize(full_len, Complex::zero());
    let stream_fft = fft(&padded);

    let mut padded = reference.to_vec();
    padded.resize(full_len, Complex::zero());
    let ref_fft = fft(&padded);

    let prod: Vec<_> = stream_fft
        .iter()
        .zip(&ref_fft)
        .map(|(s, r)| s * r.conj())
        .collect();
    // Circular correlation; negative lags wrapped around to the end
    let circ = ifft(&prod);

    // Lag 0 is circ[0] and sits at index len(reference) - 1 of the full layout
    (0..full_len)
        .map(|i| circ[(i + stream.len()) % full_len])
        .collect()
}

/// Finds where reference bursts start in a captured stream by thresholding the globally
/// normalized cross-correlation
#[derive(Clone, Debug)]
pub struct BurstLocator {
    threshold: f32,
    max_peaks: usize,
}

impl BurstLocator {
    /// `threshold` must be in (0, 1] and `max_peaks` at least 1
    pub fn new(threshold: f32, max_peaks: usize) -> Result<Self, ChannelEstError> {
        if !(threshold > 0. && threshold <= 1.) {
            return Err(ChannelEstError::invalid(format!(
                "detection threshold {} is not in (0, 1]",
                threshold
            )));
        }
        if max_peaks == 0 {
            return Err(ChannelEstError::invalid("max_peaks must be at least 1"));
        }
        Ok(Self {
            threshold,
            max_peaks,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn max_peaks(&self) -> usize {
        self.max_peaks
    }

    /// Returns the first `max_peaks` onsets (in increasing onset order, not by score) whose
    /// normalized correlation is strictly above the threshold. An empty result just means nothing
    /// was found; whether that is a problem is up to the caller.
    pub fn locate(
        &self,
        stream: &[Complex<f32>],
        reference: &ReferenceSequence,
    ) -> Vec<BurstCandidate> {
        let corr = cross_correlate(stream, reference.time_domain());
        let mags: Vec<f32> = corr.iter().map(|c| c.norm()).collect();
        // Normalize over every lag, including the partially overlapping negative ones
        let max = mags.iter().cloned().fold(0f32, f32::max);
        if max <= 0. {
            return Vec::new();
        }

        let zero_lag = reference.burst_len() - 1;
        mags[zero_lag..]
            .iter()
            .enumerate()
            .map(|(onset, m)| BurstCandidate {
                onset,
                score: m / max,
            })
            .filter(|c| c.score > self.threshold)
            .take(self.max_peaks)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::zadoff_chu::{ToneOrdering, ZcParams};
    use rand::{Rng, SeedableRng};

    fn embed(len: usize, at: &[usize], burst: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut stream = vec![Complex::zero(); len];
        for &p in at {
            stream[p..p + burst.len()].copy_from_slice(burst);
        }
        stream
    }

    #[test]
    fn correlation_matches_direct_sum() {
        let stream: Vec<_> = (0..20)
            .map(|i| Complex::new((i as f32 * 0.3).sin(), (i as f32 * 0.7).cos()))
            .collect();
        let reference: Vec<_> = (0..5)
            .map(|i| Complex::new(i as f32 - 2., 1. / (i as f32 + 1.)))
            .collect();
        let corr = cross_correlate(&stream, &reference);
        assert_eq!(corr.len(), stream.len() + reference.len() - 1);

        for (j, c) in corr.iter().enumerate() {
            let lag = j as i64 - (reference.len() as i64 - 1);
            let mut expected = Complex::zero();
            for (n, r) in reference.iter().enumerate() {
                let idx = n as i64 + lag;
                if idx >= 0 && (idx as usize) < stream.len() {
                    expected = expected + stream[idx as usize] * r.conj();
                }
            }
            assert!((c - expected).norm() < 1e-3, "lag {}", lag);
        }
    }

    #[test]
    fn finds_single_embedded_burst() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        let stream = embed(2000, &[500], reference.time_domain());
        let locator = BurstLocator::new(0.9, 10).unwrap();

        let found = locator.locate(&stream, &reference);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].onset, 500);
        assert!(found[0].score >= 0.99);
    }

    #[test]
    fn finds_padded_burst() {
        let params = ZcParams::new(1, 813, 0).unwrap();
        let reference =
            ReferenceSequence::with_burst_len(params, ToneOrdering::Centered, 1024).unwrap();
        let stream = embed(4000, &[1000], reference.time_domain());
        let found = BurstLocator::new(0.9, 10)
            .unwrap()
            .locate(&stream, &reference);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].onset, 1000);
    }

    #[test]
    fn burst_at_start_of_stream() {
        let reference = ReferenceSequence::generate(1, 139, 0).unwrap();
        let stream = embed(400, &[0], reference.time_domain());
        let found = BurstLocator::new(0.9, 10)
            .unwrap()
            .locate(&stream, &reference);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].onset, 0);
    }

    #[test]
    fn survives_noise() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        let mut stream = embed(3000, &[1234], reference.time_domain());
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        for s in stream.iter_mut() {
            *s = *s + Complex::new(rng.gen::<f32>() - 0.5, rng.gen::<f32>() - 0.5) * 0.02;
        }
        let found = BurstLocator::new(0.9, 10)
            .unwrap()
            .locate(&stream, &reference);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].onset, 1234);
    }

    #[test]
    fn takes_first_peaks_in_onset_order() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        // Later bursts are stronger, but the policy is "first in index order"
        let mut stream = embed(2500, &[100], reference.time_domain());
        for (i, x) in reference.time_domain().iter().enumerate() {
            stream[1000 + i] = *x * 1.02;
            stream[1900 + i] = *x * 1.05;
        }
        let found = BurstLocator::new(0.9, 2)
            .unwrap()
            .locate(&stream, &reference);
        let onsets: Vec<_> = found.iter().map(|c| c.onset).collect();
        assert_eq!(onsets, vec![100, 1000]);
        assert!(found[0].score < found[1].score);

        let all = BurstLocator::new(0.9, 10)
            .unwrap()
            .locate(&stream, &reference);
        assert_eq!(all.len(), 3);
        assert!((all[2].score - 1.).abs() < 1e-6);
    }

    #[test]
    fn nothing_above_threshold_is_empty_not_error() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        let locator = BurstLocator::new(0.9, 10).unwrap();
        assert!(locator
            .locate(&vec![Complex::zero(); 1000], &reference)
            .is_empty());
        assert!(locator.locate(&[], &reference).is_empty());
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(BurstLocator::new(0., 10).is_err());
        assert!(BurstLocator::new(1.1, 10).is_err());
        assert!(BurstLocator::new(f32::NAN, 10).is_err());
        assert!(BurstLocator::new(0.5, 0).is_err());
        assert!(BurstLocator::new(1., 1).is_ok());
    }

    #[test]
    fn ranking_breaks_ties_by_onset() {
        let mut cands = vec![
            BurstCandidate { onset: 30, score: 0.95 },
            BurstCandidate { onset: 10, score: 0.97 },
            BurstCandidate { onset: 5, score: 0.95 },
        ];
        rank_candidates(&mut cands);
        let onsets: Vec<_> = cands.iter().map(|c| c.onset).collect();
        assert_eq!(onsets, vec![10, 5, 30]);
    }
}
