// Tagsd - A noiseless, tag-extended Statsd client for Rust!
//
// Copyright 2018-2021 Nick Pillitteri
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use crate::types::{ErrorKind, MetricError};
use rand::Rng;

/// Sample rate of a metric, the probability that any individual call
/// actually produces bytes on the wire.
///
/// Valid rates are in `(0.0, 1.0]`. A rate of `1.0` means every call is
/// sent and nothing is appended to the metric line; any other rate is
/// rendered as an `|@<rate>` suffix after the metric type so the server can
/// scale the received values back up.
#[derive(Debug, Clone)]
pub(crate) struct SampleRate {
    value: f32,
    suffix: String,
}

impl SampleRate {
    const MIN_SUFFIX_LEN: usize = "|@0.1".len();

    fn new(value: f32) -> Self {
        let mut suffix = format!("|@{:.6}", value);
        while suffix.len() > Self::MIN_SUFFIX_LEN && suffix.ends_with('0') {
            suffix.pop();
        }

        SampleRate { value, suffix }
    }

    /// True when this rate sends every call, meaning no draw is made and
    /// no suffix is written.
    pub fn is_always(&self) -> bool {
        self.value >= 1.0
    }

    /// Wire suffix for this rate, e.g. `|@0.5`.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Make the single uniform draw that decides whether the current call
    /// is sent. Each call to the client draws exactly once, no matter how
    /// many lines the call ends up emitting.
    pub fn roll(&self) -> bool {
        self.roll_with(&mut rand::thread_rng())
    }

    fn roll_with<R: Rng>(&self, rng: &mut R) -> bool {
        self.is_always() || rng.gen_bool(f64::from(self.value))
    }
}

impl TryFrom<f32> for SampleRate {
    type Error = MetricError;

    fn try_from(rate: f32) -> Result<Self, Self::Error> {
        if rate > 0.0 && rate <= 1.0 {
            Ok(Self::new(rate))
        } else {
            Err(MetricError::from((
                ErrorKind::InvalidInput,
                "sample rate must be in (0.0, 1.0]",
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SampleRate;
    use crate::types::ErrorKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_sample_rate_suffix_trims_trailing_zeros() {
        assert_eq!("|@0.5", SampleRate::try_from(0.5).unwrap().suffix());
        assert_eq!("|@0.25", SampleRate::try_from(0.25).unwrap().suffix());
        assert_eq!("|@0.125", SampleRate::try_from(0.125).unwrap().suffix());
    }

    #[test]
    fn test_sample_rate_suffix_keeps_significant_digits() {
        let rate = SampleRate::try_from(1.0 / 54.0).unwrap();
        assert_eq!("|@0.018519", rate.suffix());
    }

    #[test]
    fn test_sample_rate_one_is_always() {
        let rate = SampleRate::try_from(1.0).unwrap();
        assert!(rate.is_always());
        assert!(rate.roll());
    }

    #[test]
    fn test_sample_rate_rejects_out_of_range() {
        assert_eq!(ErrorKind::InvalidInput, SampleRate::try_from(0.0).unwrap_err().kind());
        assert_eq!(ErrorKind::InvalidInput, SampleRate::try_from(-0.5).unwrap_err().kind());
        assert_eq!(ErrorKind::InvalidInput, SampleRate::try_from(1.5).unwrap_err().kind());
    }

    #[test]
    fn test_sample_rate_roll_distribution() {
        let mut rng = ChaCha8Rng::seed_from_u64(20);
        let rate = SampleRate::try_from(0.25).unwrap();

        let kept = (0..10_000).filter(|_| rate.roll_with(&mut rng)).count();

        // binomial with p = 0.25, n = 10k: anything outside this window
        // means the draw is broken, not unlucky
        assert!(kept > 2_000, "kept {} of 10000", kept);
        assert!(kept < 3_000, "kept {} of 10000", kept);
    }
}
