//! Zadoff-Chu reference sequence. The transmitter sends the inverse DFT of the sequence, with the
//! sequence's tones laid onto DFT bins according to a `ToneOrdering`. Whoever correlates against
//! or divides by the sequence has to use the same `ReferenceSequence`, otherwise bins won't line
//! up and the estimates are garbage.

use crate::dft::{ifft, roll};
use crate::error::ChannelEstError;
use num::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Largest magnitude at which every integer is exactly representable as an `f64`
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.;

/// How the tones of the sequence map to DFT bins
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneOrdering {
    /// The (zero-padded) sequence is rolled left by `ceil(N/2)` before the inverse DFT, so tone
    /// `ceil(N/2)` sits on DC and the tones below it wrap to the top bins
    Centered,
    /// Tone `n` of the sequence goes to DFT bin `n`
    Natural,
}

impl Default for ToneOrdering {
    fn default() -> Self {
        ToneOrdering::Centered
    }
}

/// Validated parameters of a ZC sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ZcParams {
    /// Root index `u`. 0 < u < length and coprime with length
    pub root: i64,
    /// Sequence length `N`, usually prime
    pub length: i64,
    /// Cyclic shift `q`
    pub shift: i64,
}

impl ZcParams {
    pub fn new(root: i64, length: i64, shift: i64) -> Result<Self, ChannelEstError> {
        if length <= 0 {
            return Err(ChannelEstError::invalid("sequence length must be positive"));
        }
        if root <= 0 {
            return Err(ChannelEstError::invalid("root index must be positive"));
        }
        if root >= length {
            return Err(ChannelEstError::invalid(
                "root index must be smaller than sequence length",
            ));
        }
        if gcd(root, length) != 1 {
            return Err(ChannelEstError::invalid(
                "root index and length must be coprime",
            ));
        }
        Ok(Self {
            root,
            length,
            shift,
        })
    }

    /// Same as `new`, but for parameters that arrive as reals (e.g. from JSON). Anything that
    /// isn't an exact integer is rejected
    pub fn from_reals(root: f64, length: f64, shift: f64) -> Result<Self, ChannelEstError> {
        Self::new(
            as_integer(root)?,
            as_integer(length)?,
            as_integer(shift)?,
        )
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }
}

fn as_integer(x: f64) -> Result<i64, ChannelEstError> {
    if !x.is_finite() || x.fract() != 0. || x.abs() > MAX_EXACT_INT {
        return Err(ChannelEstError::invalid(format!("{} is not an integer", x)));
    }
    Ok(x as i64)
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs()
}

/// Bin offset of tone 0 for a sequence of length `n`. Rolling by `(-n) div 2` rounds towards
/// minus infinity, the way the transmitter has always done it
pub fn centered_roll(n: usize) -> i64 {
    (-(n as i64)).div_euclid(2)
}

/// The known reference: the ZC sequence itself, the spectrum the transmitter puts on the DFT bins
/// and the corresponding time-domain burst. Immutable; generate a new one if the parameters change
///
/// The burst may be longer than the sequence. The sequence is then zero-padded to the burst length
/// before the tones are laid onto bins, so only `len()` of the `burst_len()` bins are occupied.
#[derive(Clone, Debug)]
pub struct ReferenceSequence {
    params: ZcParams,
    ordering: ToneOrdering,
    sequence: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    /// Occupied bins, ascending
    occupied: Vec<usize>,
    time: Vec<Complex<f32>>,
}

impl ReferenceSequence {
    /// Generate the reference for root `u`, length `n` and shift `q` with centered tones
    pub fn generate(u: i64, n: i64, q: i64) -> Result<Self, ChannelEstError> {
        Ok(Self::from_params(ZcParams::new(u, n, q)?, ToneOrdering::Centered))
    }

    /// Reference whose burst is exactly one sequence long
    pub fn from_params(params: ZcParams, ordering: ToneOrdering) -> Self {
        Self::build(params, ordering, params.len())
    }

    /// Reference for a burst of `burst_len` samples, at least the sequence length
    pub fn with_burst_len(
        params: ZcParams,
        ordering: ToneOrdering,
        burst_len: usize,
    ) -> Result<Self, ChannelEstError> {
        if burst_len < params.len() {
            return Err(ChannelEstError::invalid(format!(
                "burst of {} samples can't hold a sequence of length {}",
                burst_len,
                params.len()
            )));
        }
        Ok(Self::build(params, ordering, burst_len))
    }

    fn build(params: ZcParams, ordering: ToneOrdering, burst_len: usize) -> Self {
        let sequence = zc_sequence(&params);
        let n = sequence.len();
        let shift = match ordering {
            ToneOrdering::Centered => centered_roll(n),
            ToneOrdering::Natural => 0,
        };

        let mut padded = sequence.clone();
        padded.resize(burst_len, Complex::new(0., 0.));
        let spectrum = roll(&padded, shift);
        // Rolling moves tone k to bin (k + shift) mod burst_len
        let mut occupied: Vec<usize> = (0..n as i64)
            .map(|k| (k + shift).rem_euclid(burst_len as i64) as usize)
            .collect();
        occupied.sort_unstable();
        let time = ifft(&spectrum);
        Self {
            params,
            ordering,
            sequence,
            spectrum,
            occupied,
            time,
        }
    }

    pub fn params(&self) -> &ZcParams {
        &self.params
    }

    pub fn ordering(&self) -> ToneOrdering {
        self.ordering
    }

    /// Sequence length `N`
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Samples in one burst, which is also the DFT size used to estimate from it
    pub fn burst_len(&self) -> usize {
        self.time.len()
    }

    /// The ZC sequence in tone order, `x[n] = exp(-iπ·u·n·(n + cf + 2q) / N)`
    pub fn sequence(&self) -> &[Complex<f32>] {
        &self.sequence
    }

    /// The sequence as laid out on the `burst_len()` DFT bins, zeros on unoccupied bins
    pub fn spectrum(&self) -> &[Complex<f32>] {
        &self.spectrum
    }

    /// DFT bins carrying a tone, in ascending bin order. Read in this order the tones are the
    /// `len()`-point DFT layout of the occupied band (positive frequencies, then negative ones)
    pub fn occupied_bins(&self) -> &[usize] {
        &self.occupied
    }

    /// `spectrum()` at `occupied_bins()`. Received spectra are divided by this
    pub fn occupied_spectrum(&self) -> Vec<Complex<f32>> {
        self.occupied.iter().map(|&b| self.spectrum[b]).collect()
    }

    /// Inverse DFT of `spectrum`. This is what shows up in the captured stream
    pub fn time_domain(&self) -> &[Complex<f32>] {
        &self.time
    }
}

fn zc_sequence(params: &ZcParams) -> Vec<Complex<f32>> {
    let (u, n_len, q) = (
        params.root as i128,
        params.length as i128,
        params.shift as i128,
    );
    let cf = n_len % 2;
    // exp(-iπk/N) has period 2N in k, so reduce exactly before going to floating point
    (0..n_len)
        .map(|n| {
            let k = (u * n * (n + cf + 2 * q)).rem_euclid(2 * n_len);
            let phase = -PI * k as f64 / n_len as f64;
            Complex::new(phase.cos() as f32, phase.sin() as f32)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dft::{fft, roll};

    #[test]
    fn sequence_has_unit_modulus() {
        for &(u, n, q) in &[(7, 353, 0), (1, 813, 0), (25, 139, 3), (3, 64, -5), (5, 2, 0)] {
            let u = if u >= n { 1 } else { u };
            let reference = ReferenceSequence::generate(u, n, q).unwrap();
            assert_eq!(reference.len(), n as usize);
            for x in reference.sequence() {
                assert!((x.norm() - 1.).abs() < 1e-6);
            }
            for x in reference.spectrum() {
                assert!((x.norm() - 1.).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = ReferenceSequence::generate(7, 353, 2).unwrap();
        let b = ReferenceSequence::generate(7, 353, 2).unwrap();
        assert_eq!(a.sequence(), b.sequence());
        assert_eq!(a.spectrum(), b.spectrum());
        assert_eq!(a.time_domain(), b.time_domain());
    }

    #[test]
    fn matches_closed_form() {
        let reference = ReferenceSequence::generate(7, 353, 1).unwrap();
        for (n, x) in reference.sequence().iter().enumerate() {
            let n = n as f64;
            let phase = -PI * 7. * n * (n + 1. + 2.) / 353.;
            let expected = Complex::new(phase.cos() as f32, phase.sin() as f32);
            assert!((x - expected).norm() < 1e-4);
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let is_invalid = |r: Result<ZcParams, ChannelEstError>| match r {
            Err(ChannelEstError::InvalidParameter(_)) => true,
            _ => false,
        };
        assert!(is_invalid(ZcParams::new(0, 353, 0)));
        assert!(is_invalid(ZcParams::new(-3, 353, 0)));
        assert!(is_invalid(ZcParams::new(353, 353, 0)));
        assert!(is_invalid(ZcParams::new(354, 353, 0)));
        assert!(is_invalid(ZcParams::new(2, 4, 0)));
        assert!(is_invalid(ZcParams::new(1, 0, 0)));
        assert!(is_invalid(ZcParams::from_reals(1.5, 353., 0.)));
        assert!(is_invalid(ZcParams::from_reals(7., 353.2, 0.)));
        assert!(is_invalid(ZcParams::from_reals(7., 353., f64::NAN)));
        assert!(ReferenceSequence::generate(2, 4, 0).is_err());
        assert_eq!(
            ZcParams::from_reals(7., 353., 0.).unwrap(),
            ZcParams::new(7, 353, 0).unwrap()
        );
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(
            ZcParams::new(4, 6, 0).unwrap_err(),
            ChannelEstError::InvalidParameter("root index and length must be coprime".to_string())
        );
        assert_eq!(
            ZcParams::new(6, 6, 0).unwrap_err(),
            ChannelEstError::InvalidParameter(
                "root index must be smaller than sequence length".to_string()
            )
        );
    }

    #[test]
    fn centered_spectrum_is_rolled_sequence() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        let seq = reference.sequence();
        let spec = reference.spectrum();
        // Same as numpy's roll(seq, -353 // 2), which is a roll by -177
        assert_eq!(centered_roll(353), -177);
        assert_eq!(spec, &roll(seq, -177)[..]);
        assert_eq!(spec[0], seq[177]);
        assert_eq!(spec[176], seq[0]);
        assert_eq!(reference.occupied_bins(), &(0..353).collect::<Vec<_>>()[..]);
        assert_eq!(centered_roll(64), -32);

        let natural = ReferenceSequence::from_params(*reference.params(), ToneOrdering::Natural);
        assert_eq!(natural.spectrum(), natural.sequence());
    }

    #[test]
    fn padded_spectrum_matches_transmitter_layout() {
        let params = ZcParams::new(1, 813, 0).unwrap();
        let reference =
            ReferenceSequence::with_burst_len(params, ToneOrdering::Centered, 1024).unwrap();
        assert_eq!(reference.len(), 813);
        assert_eq!(reference.burst_len(), 1024);

        // Zero-pad to 1024, then roll by -813 // 2 = -407
        let mut padded = reference.sequence().to_vec();
        padded.resize(1024, Complex::new(0., 0.));
        assert_eq!(reference.spectrum(), &roll(&padded, -407)[..]);

        // Tones 407.. sit on bins 0..406, tones ..407 on the top 407 bins
        let bins = reference.occupied_bins();
        assert_eq!(bins.len(), 813);
        assert_eq!(bins[0], 0);
        assert_eq!(bins[405], 405);
        assert_eq!(bins[406], 1024 - 407);
        assert_eq!(bins[812], 1023);
        let tones = reference.occupied_spectrum();
        assert_eq!(tones[0], reference.sequence()[407]);
        assert_eq!(tones[406], reference.sequence()[0]);

        let natural =
            ReferenceSequence::with_burst_len(params, ToneOrdering::Natural, 1024).unwrap();
        assert_eq!(natural.occupied_bins(), &(0..813).collect::<Vec<_>>()[..]);
        assert!(ReferenceSequence::with_burst_len(params, ToneOrdering::Natural, 812).is_err());
    }

    #[test]
    fn time_domain_transforms_back_to_spectrum() {
        let reference = ReferenceSequence::generate(7, 353, 0).unwrap();
        let spec = fft(reference.time_domain());
        for (a, b) in spec.iter().zip(reference.spectrum()) {
            assert!((a - b).norm() < 1e-4);
        }
        // Unit energy burst
        let energy: f32 = reference.time_domain().iter().map(|x| x.norm_sqr()).sum();
        assert!((energy - 1.).abs() < 1e-4);

        let params = ZcParams::new(1, 813, 0).unwrap();
        let padded =
            ReferenceSequence::with_burst_len(params, ToneOrdering::Centered, 1024).unwrap();
        assert_eq!(padded.time_domain().len(), 1024);
        let spec = fft(padded.time_domain());
        for (a, b) in spec.iter().zip(padded.spectrum()) {
            assert!((a - b).norm() < 1e-3);
        }
    }
}
