use crate::time::Duration;

/// Tunables of every connection created on an interface.
///
/// The defaults follow the usual values: a full 16-bit window of buffer in each direction, the
/// Ethernet MSS, the RFC 6298 retransmission bounds and a TIME-WAIT of one minute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Capacity of the send and of the receive store, in bytes.
    pub buffer_size: usize,
    /// Largest payload put into one segment.
    pub mss: usize,
    /// Retransmission timeout used before the first round-trip sample.
    pub initial_rto: Duration,
    /// Lower bound of the retransmission timeout.
    pub rto_min: Duration,
    /// Upper bound of the retransmission timeout, also for backoff.
    pub rto_max: Duration,
    /// How long a connection lingers in TIME-WAIT.
    pub time_wait: Duration,
    /// Retransmissions of a single segment before the connection is aborted.
    ///
    /// `None` retransmits until acknowledged or closed.
    pub max_retransmissions: Option<u32>,
    /// Interval of the timer thread.
    pub tick: Duration,
}

impl Config {
    /// Largest window that can be advertised in the header without scaling.
    pub const MAX_WINDOW: usize = 65535;

    /// Largest payload of a segment that still fits an IPv4 datagram.
    pub const MAX_MSS: usize = Config::MAX_WINDOW - 40;

    /// Bring the segment size and the buffer size into their usable ranges.
    ///
    /// The MSS is kept in `1..=MAX_MSS`, a buffer holds at least one byte.
    pub fn clamped(self) -> Self {
        let mss = self.mss.max(1).min(Config::MAX_MSS);
        let buffer_size = self.buffer_size.max(1);
        if mss != self.mss || buffer_size != self.buffer_size {
            net_warn!("clamped mss {} to {} and buffer size {} to {}",
                self.mss, mss, self.buffer_size, buffer_size);
        }
        Config { mss, buffer_size, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            buffer_size: Config::MAX_WINDOW,
            mss: 1460,
            initial_rto: Duration::from_millis(200),
            rto_min: Duration::from_millis(200),
            rto_max: Duration::from_secs(60),
            time_wait: Duration::from_secs(60),
            max_retransmissions: None,
            tick: Duration::from_millis(10),
        }
    }
}
