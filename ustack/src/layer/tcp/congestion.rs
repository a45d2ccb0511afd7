/// Slow start and congestion avoidance.
///
/// The window grows by the acknowledged amount while below the threshold and by about one MSS per
/// round trip above it. A retransmission timeout halves the threshold and restarts from a single
/// segment. There is no fast retransmit or recovery.
#[derive(Clone, Copy, Debug)]
pub struct Congestion {
    cwnd: usize,
    ssthresh: usize,
    mss: usize,
    limit: usize,
}

impl Congestion {
    /// The initial state for a given segment size.
    ///
    /// The initial window is that of RFC 5681, the threshold starts at `limit` which is also the
    /// largest window that will ever be reached.
    pub fn new(mss: usize, limit: usize) -> Self {
        let initial = (4 * mss).min((2 * mss).max(4380));
        Congestion {
            cwnd: initial.min(limit).max(mss),
            ssthresh: limit,
            mss,
            limit,
        }
    }

    /// The congestion window in bytes.
    pub fn window(&self) -> usize {
        self.cwnd
    }

    /// The slow start threshold in bytes.
    pub fn ssthresh(&self) -> usize {
        self.ssthresh
    }

    /// Check if the window is still growing exponentially.
    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }

    /// Account for `acked` newly acknowledged bytes.
    pub fn on_ack(&mut self, acked: usize) {
        let increase = if self.in_slow_start() {
            acked
        } else {
            (self.mss * self.mss / self.cwnd).max(1)
        };
        self.cwnd = self.cwnd.saturating_add(increase).min(self.limit);
    }

    /// React to a retransmission timeout.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2).max(2 * self.mss);
        self.cwnd = self.mss;
    }
}
