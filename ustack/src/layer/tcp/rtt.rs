//! Round-trip time estimation after RFC 6298.
use crate::time::Duration;

/// Clock granularity, the `G` of RFC 6298.
const GRANULARITY_MS: f64 = 0.0;
/// Variance multiplier, the `K` of RFC 6298.
const K: f64 = 4.0;

/// Smoothed round-trip estimator producing the retransmission timeout.
///
/// All arithmetic is in fractional milliseconds so that the smoothing does not lose precision on
/// sub-millisecond links.
#[derive(Clone, Copy, Debug)]
pub struct RttEstimator {
    srtt: Option<f64>,
    rttvar: f64,
    rto: f64,
    backoff: u32,
    min: f64,
    max: f64,
}

impl RttEstimator {
    /// An estimator without samples, reporting `initial` as timeout.
    pub fn new(initial: Duration, min: Duration, max: Duration) -> Self {
        let (min, max) = (as_millis(min), as_millis(max));
        RttEstimator {
            srtt: None,
            rttvar: 0.0,
            rto: as_millis(initial).max(min).min(max),
            backoff: 0,
            min,
            max,
        }
    }

    /// Feed one round-trip measurement.
    ///
    /// Also ends any backoff, the path evidently delivers again.
    pub fn sample(&mut self, rtt: Duration) {
        let rtt = as_millis(rtt);
        match self.srtt {
            None => {
                self.srtt = Some(rtt);
                self.rttvar = rtt / 2.0;
            },
            Some(srtt) => {
                self.rttvar = 0.75 * self.rttvar + 0.25 * (srtt - rtt).abs();
                self.srtt = Some(0.875 * srtt + 0.125 * rtt);
            },
        }

        let srtt = self.srtt.unwrap_or(rtt);
        self.rto = (srtt + GRANULARITY_MS.max(K * self.rttvar))
            .max(self.min)
            .min(self.max);
        self.backoff = 0;
        net_debug!("rtt sample {:.1}ms: srtt={:.1}ms rttvar={:.1}ms rto={:.1}ms",
            rtt, srtt, self.rttvar, self.rto);
    }

    /// Double the timeout for the next retransmission.
    pub fn back_off(&mut self) {
        if self.backed_off_millis() < self.max {
            self.backoff += 1;
        }
    }

    /// The current retransmission timeout, including backoff.
    pub fn rto(&self) -> Duration {
        from_millis(self.backed_off_millis())
    }

    /// The smoothed round-trip time, if any sample was taken.
    pub fn srtt(&self) -> Option<Duration> {
        self.srtt.map(from_millis)
    }

    /// The smoothed round-trip time in fractional milliseconds.
    pub fn srtt_millis(&self) -> Option<f64> {
        self.srtt
    }

    /// The round-trip variance in fractional milliseconds.
    pub fn rttvar_millis(&self) -> f64 {
        self.rttvar
    }

    /// The timeout without backoff in fractional milliseconds.
    pub fn rto_millis(&self) -> f64 {
        self.rto
    }

    fn backed_off_millis(&self) -> f64 {
        let factor = 2f64.powi(self.backoff.min(32) as i32);
        (self.rto * factor).min(self.max)
    }
}

fn as_millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1e6
}

fn from_millis(millis: f64) -> Duration {
    Duration::from_nanos((millis * 1e6).round() as u64)
}
