//! The status state machine owned by the queue store.
//!
//! `Initial --Claim--> Running --failure--> Retry --Claim--> Running --success--> (deleted)`
//! with `Recovered` standing in for `Retry` on rows orphaned by a crash.

use core::fmt::{self, Display, Formatter};

/// Fixed integer values per the persisted schema: `Initial=0, Running=1, Retry=2, Recovered=3`.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub enum Status {
    #[default]
    Initial = 0,
    Running = 1,
    Retry = 2,
    Recovered = 3,
}

impl Status {
    /// Rows in this status are eligible to be claimed by `LoadDue`.
    #[must_use]
    pub const fn is_claimable(self) -> bool {
        matches!(self, Self::Initial | Self::Retry | Self::Recovered)
    }

    /// Rows in this status are currently claimed by a dispatcher.
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            0 => Self::Initial,
            1 => Self::Running,
            2 => Self::Retry,
            _ => Self::Recovered,
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        value as Self
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}

#[cfg(test)]
mod test {
    use super::Status;

    #[test]
    fn claimable_statuses() {
        assert!(Status::Initial.is_claimable());
        assert!(Status::Retry.is_claimable());
        assert!(Status::Recovered.is_claimable());
        assert!(!Status::Running.is_claimable());
    }

    #[test]
    fn round_trips_through_u32() {
        for s in [
            Status::Initial,
            Status::Running,
            Status::Retry,
            Status::Recovered,
        ] {
            assert_eq!(Status::from(u32::from(s)), s);
        }
    }

    #[test]
    fn fixed_integer_values() {
        assert_eq!(u32::from(Status::Initial), 0);
        assert_eq!(u32::from(Status::Running), 1);
        assert_eq!(u32::from(Status::Retry), 2);
        assert_eq!(u32::from(Status::Recovered), 3);
    }
}
