// Clock-domain time. Values are offsets from the clock's own origin, never wall-clock.

use std::fmt;
use std::ops::Add;
use std::time::Duration;

/// A timestamp in the transport clock's domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScheduledTime(Duration);

impl ScheduledTime {
    pub const ZERO: ScheduledTime = ScheduledTime(Duration::ZERO);

    pub fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }
}

impl Add<Duration> for ScheduledTime {
    type Output = ScheduledTime;

    fn add(self, rhs: Duration) -> Self::Output {
        ScheduledTime(self.0 + rhs)
    }
}

impl fmt::Display for ScheduledTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}
