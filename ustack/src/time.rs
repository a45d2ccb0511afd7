/*! Time structures.

The protocol engines never read a clock themselves. They are handed an [Instant] by the caller
and compare it against deadlines kept as an [Expiration].

 - [Instant] is used to represent absolute time.
 - [Duration] is used to represet relative time.

[Instant]: struct.Instant.html
[Expiration]: enum.Expiration.html
[Duration]: https://doc.rust-lang.org/core/time/struct.Duration.html
*/
use core::{fmt, ops};
pub use core::time::Duration;

/// A representation of an absolute time value.
///
/// The `Instant` type is a wrapper around a `i64` value that
/// represents a number of milliseconds, monotonically increasing
/// since an arbitrary moment in time, such as process startup.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    millis: i64,
}

/// An expiration time, inversion of `Option`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires at the contained instant.
    When(Instant),
    /// Never expires.
    Never,
}

use Expiration::{When, Never};

impl Instant {
    /// Create a new `Instant` from a number of milliseconds.
    pub fn from_millis<T: Into<i64>>(millis: T) -> Instant {
        Instant { millis: millis.into() }
    }

    /// Create a new `Instant` from a number of seconds.
    pub fn from_secs<T: Into<i64>>(secs: T) -> Instant {
        Instant { millis: secs.into() * 1000 }
    }

    /// The current time of the monotonic process clock.
    ///
    /// The origin is the first call to this function in the process.
    pub fn now() -> Instant {
        use std::sync::OnceLock;
        static ORIGIN: OnceLock<std::time::Instant> = OnceLock::new();

        let origin = ORIGIN.get_or_init(std::time::Instant::now);
        Instant::from_millis(origin.elapsed().as_millis() as i64)
    }

    /// The fractional number of milliseconds that have passed
    /// since the beginning of time.
    pub fn millis(&self) -> i64 {
        self.millis % 1000
    }

    /// The number of whole seconds that have passed since the
    /// beginning of time.
    pub fn secs(&self) -> i64 {
        self.millis / 1000
    }

    /// The total number of milliseconds that have passed since
    /// the biginning of time.
    pub fn total_millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{:03}s", self.secs(), self.millis())
    }
}

impl ops::Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis + rhs.as_millis() as i64)
    }
}

impl ops::AddAssign<Duration> for Instant {
    fn add_assign(&mut self, rhs: Duration) {
        self.millis += rhs.as_millis() as i64;
    }
}

impl ops::Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Instant {
        Instant::from_millis(self.millis - rhs.as_millis() as i64)
    }
}

/// Saturates at zero when `rhs` lies in the future.
impl ops::Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Instant) -> Duration {
        Duration::from_millis((self.millis - rhs.millis).max(0) as u64)
    }
}

impl Expiration {
    /// Check if the expiration has been reached at the instant.
    pub fn is_expired(self, now: Instant) -> bool {
        match self {
            When(at) => at <= now,
            Never => false,
        }
    }

    /// The instant of expiration, if there is one.
    pub fn instant(self) -> Option<Instant> {
        match self {
            When(at) => Some(at),
            Never => None,
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::Never
    }
}

impl From<Instant> for Expiration {
    fn from(instant: Instant) -> Self {
        When(instant)
    }
}

impl From<Option<Instant>> for Expiration {
    fn from(instant: Option<Instant>) -> Self {
        instant.map(When).unwrap_or(Never)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instant_ops() {
        assert_eq!(Instant::from_millis(4) + Duration::from_millis(6), Instant::from_millis(10));
        assert_eq!(Instant::from_millis(7) - Duration::from_millis(5), Instant::from_millis(2));
        assert_eq!(Instant::from_millis(10) - Instant::from_millis(4), Duration::from_millis(6));
        assert_eq!(Instant::from_millis(4) - Instant::from_millis(10), Duration::from_millis(0));
    }

    #[test]
    fn instant_display() {
        assert_eq!(format!("{}", Instant::from_millis(5674)), "5.674s");
        assert_eq!(format!("{}", Instant::from_millis(5005)), "5.005s");
    }

    #[test]
    fn expiration() {
        let at = Expiration::When(Instant::from_secs(2));
        assert!(!at.is_expired(Instant::from_millis(1999)));
        assert!(at.is_expired(Instant::from_secs(2)));
        assert!(!Expiration::Never.is_expired(Instant::from_secs(i32::max_value())));
        assert_eq!(Expiration::from(None), Expiration::Never);
    }

    #[test]
    fn now_is_monotonic() {
        let first = Instant::now();
        let second = Instant::now();
        assert!(first <= second);
    }
}
