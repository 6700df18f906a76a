use crate::dft::{fft, ifft};
use crate::error::ChannelEstError;
use crate::segment::AlignedSegment;
use crate::zadoff_chu::ReferenceSequence;
use num::Complex;
use serde::{Serialize, Serializer};
use std::f64::consts::PI;

/// Reference tones weaker than this can't be divided by
pub const DEGENERACY_EPS: f32 = 1e-6;
/// Magnitudes are clamped to this before going to dB, so exact zeros give -200 dB and not -inf
pub const MIN_DB_MAGNITUDE: f32 = 1e-10;

pub fn to_db(mag: f32) -> f32 {
    20. * mag.max(MIN_DB_MAGNITUDE).log10()
}

/// Remove 2π jumps between consecutive phases, like numpy's `unwrap`
pub fn unwrap_phase(phase: &[f32]) -> Vec<f32> {
    let two_pi = 2. * std::f32::consts::PI;
    let pi = std::f32::consts::PI;
    let mut res = Vec::with_capacity(phase.len());
    let mut correction = 0.;
    for (i, &p) in phase.iter().enumerate() {
        if i > 0 {
            let d = p - phase[i - 1];
            if d.abs() >= pi {
                let mut d_mod = (d + pi).rem_euclid(two_pi) - pi;
                if d_mod == -pi && d > 0. {
                    d_mod = pi;
                }
                correction += d_mod - d;
            }
        }
        res.push(p + correction);
    }
    res
}

pub(crate) fn serialize_complex<S: Serializer>(
    x: &[Complex<f32>],
    s: S,
) -> Result<S::Ok, S::Error> {
    s.collect_seq(x.iter().map(|c| [c.re, c.im]))
}

/// Channel frequency response for one burst on one channel, plus views derived from it. All
/// vectors have one entry per occupied tone, in ascending DFT-bin order (or per delay bin for the
/// power-delay profile). When the burst is as long as the sequence that is simply every bin
#[derive(Clone, Debug, Serialize)]
pub struct ChannelEstimate {
    pub channel: String,
    pub onset: usize,
    /// Received spectrum divided by the reference spectrum
    #[serde(serialize_with = "serialize_complex")]
    pub coefficients: Vec<Complex<f32>>,
    /// `20 log10 |coefficients|`
    pub magnitude_db: Vec<f32>,
    /// Phase after removing the linear ramp caused by the onset being off by `peak_delay` samples
    pub phase: Vec<f32>,
    /// `phase`, unwrapped across bins
    pub unwrapped_phase: Vec<f32>,
    /// `20 log10 |ifft(coefficients)|`; multipath taps show up as peaks
    pub power_delay_profile_db: Vec<f32>,
    /// Delay bin with the most energy. One delay bin is `burst_len / len` samples
    pub peak_delay: usize,
}

/// Divides received spectra by the reference spectrum on the occupied bins
#[derive(Clone, Debug)]
pub struct ChannelEstimator {
    burst_len: usize,
    /// Ascending DFT bins carrying a tone
    bins: Vec<usize>,
    /// Reference value on each of `bins`
    tones: Vec<Complex<f32>>,
}

impl ChannelEstimator {
    pub fn new(reference: &ReferenceSequence) -> Self {
        Self {
            burst_len: reference.burst_len(),
            bins: reference.occupied_bins().to_vec(),
            tones: reference.occupied_spectrum(),
        }
    }

    /// Use an arbitrary reference spectrum (one value per DFT bin, every bin occupied) in place
    /// of a ZC one
    pub fn with_spectrum(spectrum: Vec<Complex<f32>>) -> Self {
        Self {
            burst_len: spectrum.len(),
            bins: (0..spectrum.len()).collect(),
            tones: spectrum,
        }
    }

    /// Samples a segment must have
    pub fn burst_len(&self) -> usize {
        self.burst_len
    }

    pub fn estimate(&self, segment: &AlignedSegment) -> Result<ChannelEstimate, ChannelEstError> {
        if segment.samples.len() != self.burst_len {
            return Err(ChannelEstError::ShapeMismatch {
                channel: segment.channel.clone(),
                onset: segment.onset,
                expected: self.burst_len,
                actual: segment.samples.len(),
            });
        }
        if let Some((tone, r)) = self
            .tones
            .iter()
            .enumerate()
            .find(|(_, r)| !(r.norm() >= DEGENERACY_EPS))
        {
            return Err(ChannelEstError::NumericDegeneracy {
                channel: segment.channel.clone(),
                onset: segment.onset,
                tone,
                magnitude: r.norm(),
            });
        }

        let received = fft(&segment.samples);
        let coefficients: Vec<Complex<f32>> = self
            .bins
            .iter()
            .zip(&self.tones)
            .map(|(&b, r)| received[b] / r)
            .collect();
        let n = coefficients.len();

        let magnitude_db = coefficients.iter().map(|h| to_db(h.norm())).collect();

        let delay = ifft(&coefficients);
        let power_delay_profile_db = delay.iter().map(|h| to_db(h.norm())).collect();
        let (peak_delay, _) = delay
            .iter()
            .map(|h| h.norm_sqr())
            .enumerate()
            .fold((0, -1f32), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        // Undo the linear phase slope of a `peak_delay` sample timing offset. Reduce the product
        // modulo n so the angle stays exact for large bins
        let phase: Vec<f32> = coefficients
            .iter()
            .enumerate()
            .map(|(k, h)| {
                let ramp = 2. * PI * ((peak_delay * k) % n) as f64 / n as f64;
                (h * Complex::new(ramp.cos() as f32, ramp.sin() as f32)).arg()
            })
            .collect();
        let unwrapped_phase = unwrap_phase(&phase);

        Ok(ChannelEstimate {
            channel: segment.channel.clone(),
            onset: segment.onset,
            coefficients,
            magnitude_db,
            phase,
            unwrapped_phase,
            power_delay_profile_db,
            peak_delay,
        })
    }

    /// Estimate every segment. A bad segment only fails itself
    pub fn estimate_all(
        &self,
        segments: &[AlignedSegment],
    ) -> Vec<Result<ChannelEstimate, ChannelEstError>> {
        segments.iter().map(|s| self.estimate(s)).collect()
    }
}
