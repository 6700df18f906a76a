use crate::config::TxConfig;
use crate::error::ChannelEstError;
use crate::zadoff_chu::ReferenceSequence;
use num::Complex;

/// Build the burst the transmitter sends: the reference's time-domain burst (the sequence
/// zero-padded to `burst_len()` tones, laid onto DFT bins with the reference's ordering and
/// inverse transformed) scaled so the largest real or imaginary part is `peak_scale`. This keeps
/// the DAC out of clipping when interpolating.
///
/// The burst is `reference.time_domain()` times a positive constant, so the same reference finds
/// and estimates it.
pub fn build_tx_burst(
    reference: &ReferenceSequence,
    peak_scale: f32,
) -> Result<Vec<Complex<f32>>, ChannelEstError> {
    if !(peak_scale > 0. && peak_scale <= 1.) {
        return Err(ChannelEstError::invalid(format!(
            "peak scale {} is not in (0, 1]",
            peak_scale
        )));
    }

    let burst = reference.time_domain();
    let peak = burst
        .iter()
        .map(|x| x.re.abs().max(x.im.abs()))
        .fold(0f32, f32::max);
    if peak <= 0. {
        return Err(ChannelEstError::invalid("transmit burst is all zeros"));
    }
    let scale = peak_scale / peak;
    Ok(burst.iter().map(|x| *x * scale).collect())
}

/// `build_tx_burst` with the settings from the config
pub fn build_configured_burst(
    reference: &ReferenceSequence,
    tx: &TxConfig,
) -> Result<Vec<Complex<f32>>, ChannelEstError> {
    build_tx_burst(reference, tx.peak_scale)
}
