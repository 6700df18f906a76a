use failure::Fail;

/// Everything that can go wrong between reading a capture and producing a channel estimate.
/// Each variant carries enough context (channel id, onset) to find the offending data.
#[derive(Clone, Debug, PartialEq, Fail)]
pub enum ChannelEstError {
    /// Bad generator or pipeline configuration. The caller has to fix the config
    #[fail(display = "invalid parameter: {}", _0)]
    InvalidParameter(String),
    #[fail(display = "could not read capture '{}': {}", path, reason)]
    CaptureRead { path: String, reason: String },
    #[fail(
        display = "segment of channel '{}' at onset {} has {} samples, reference has {}",
        channel, onset, actual, expected
    )]
    ShapeMismatch {
        channel: String,
        onset: usize,
        expected: usize,
        actual: usize,
    },
    /// The reference spectrum has a (near) zero at `tone`
    #[fail(
        display = "reference tone {} has magnitude {} (channel '{}', onset {})",
        tone, magnitude, channel, onset
    )]
    NumericDegeneracy {
        channel: String,
        onset: usize,
        tone: usize,
        magnitude: f32,
    },
}

impl ChannelEstError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        ChannelEstError::InvalidParameter(msg.into())
    }
}
