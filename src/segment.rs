use num::Complex;
use tracing::debug;

/// Most segments taken from one channel. Bounds the work on long or noisy captures
pub const DEFAULT_SEGMENT_CAP: usize = 10;

/// One reference-length window of a channel, starting at a detected onset
#[derive(Clone, Debug, PartialEq)]
pub struct AlignedSegment {
    pub channel: String,
    pub onset: usize,
    pub samples: Vec<Complex<f32>>,
}

/// Slice `len` samples out of `stream` at each onset, visiting onsets in increasing order. Onsets
/// too close to the end for a whole window are skipped silently (a burst cut off by the end of
/// the capture is normal). Stops once `cap` segments have been produced.
pub fn extract_segments(
    stream: &[Complex<f32>],
    channel: &str,
    onsets: &[usize],
    len: usize,
    cap: usize,
) -> Vec<AlignedSegment> {
    let mut onsets = onsets.to_vec();
    onsets.sort_unstable();

    let mut res = Vec::new();
    for p in onsets {
        if res.len() >= cap {
            break;
        }
        match p.checked_add(len) {
            Some(end) if end <= stream.len() => res.push(AlignedSegment {
                channel: channel.to_string(),
                onset: p,
                samples: stream[p..end].to_vec(),
            }),
            _ => debug!(
                "Channel '{}': burst at {} runs past the end of the capture ({} samples)",
                channel,
                p,
                stream.len()
            ),
        }
    }
    res
}
