//! Occupancy budget for the running job.
//!
//! The budget is selected from a fixed enumerated set, never an arbitrary
//! duration: the choices mirror what operators actually pick, and a bad
//! free-form value can silently disable preemption.

use std::time::Duration;

use thiserror::Error;

/// Maximum time one job may occupy the hardware before it is halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KillThreshold {
    /// Never preempt.
    #[default]
    Unlimited,
    TenSeconds,
    ThirtySeconds,
    OneMinute,
    TwoMinutes,
    FiveMinutes,
}

impl KillThreshold {
    /// Every selectable budget, in menu order.
    pub const ALL: [KillThreshold; 6] = [
        KillThreshold::Unlimited,
        KillThreshold::TenSeconds,
        KillThreshold::ThirtySeconds,
        KillThreshold::OneMinute,
        KillThreshold::TwoMinutes,
        KillThreshold::FiveMinutes,
    ];

    /// The budget in seconds; `None` means never preempt.
    pub fn limit_secs(&self) -> Option<u64> {
        match self {
            KillThreshold::Unlimited => None,
            KillThreshold::TenSeconds => Some(10),
            KillThreshold::ThirtySeconds => Some(30),
            KillThreshold::OneMinute => Some(60),
            KillThreshold::TwoMinutes => Some(120),
            KillThreshold::FiveMinutes => Some(300),
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        self.limit_secs().map(Duration::from_secs)
    }

    /// True when a *known* age exceeds the budget. Ages at or below the
    /// budget, and the unlimited budget, never trigger.
    pub fn exceeded_by(&self, age_secs: f64) -> bool {
        match self.limit_secs() {
            Some(limit) => age_secs > limit as f64,
            None => false,
        }
    }
}

impl std::fmt::Display for KillThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KillThreshold::Unlimited => "inf",
            KillThreshold::TenSeconds => "10s",
            KillThreshold::ThirtySeconds => "30s",
            KillThreshold::OneMinute => "1min",
            KillThreshold::TwoMinutes => "2min",
            KillThreshold::FiveMinutes => "5min",
        };
        f.write_str(s)
    }
}

/// Error parsing a threshold token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown kill threshold {0:?} (expected one of: inf, 10s, 30s, 1min, 2min, 5min)")]
pub struct ParseThresholdError(pub String);

impl std::str::FromStr for KillThreshold {
    type Err = ParseThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inf" => Ok(KillThreshold::Unlimited),
            "10s" => Ok(KillThreshold::TenSeconds),
            "30s" => Ok(KillThreshold::ThirtySeconds),
            "1min" => Ok(KillThreshold::OneMinute),
            "2min" => Ok(KillThreshold::TwoMinutes),
            "5min" => Ok(KillThreshold::FiveMinutes),
            _ => Err(ParseThresholdError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("inf", KillThreshold::Unlimited, None)]
    #[case("10s", KillThreshold::TenSeconds, Some(10))]
    #[case("30s", KillThreshold::ThirtySeconds, Some(30))]
    #[case("1min", KillThreshold::OneMinute, Some(60))]
    #[case("2min", KillThreshold::TwoMinutes, Some(120))]
    #[case("5min", KillThreshold::FiveMinutes, Some(300))]
    fn parse_display_roundtrip(
        #[case] token: &str,
        #[case] expected: KillThreshold,
        #[case] secs: Option<u64>,
    ) {
        let parsed: KillThreshold = token.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_string(), token);
        assert_eq!(parsed.limit_secs(), secs);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "90s".parse::<KillThreshold>().unwrap_err();
        assert_eq!(err.0, "90s");
    }

    #[test]
    fn budget_boundary_is_exclusive() {
        let threshold = KillThreshold::FiveMinutes;
        assert!(!threshold.exceeded_by(299.9));
        assert!(!threshold.exceeded_by(300.0));
        assert!(threshold.exceeded_by(300.1));
        assert!(threshold.exceeded_by(400.0));
    }

    #[test]
    fn unlimited_never_triggers() {
        assert!(!KillThreshold::Unlimited.exceeded_by(f64::MAX));
    }

    #[test]
    fn menu_covers_every_variant_once() {
        for threshold in KillThreshold::ALL {
            let round: KillThreshold = threshold.to_string().parse().unwrap();
            assert_eq!(round, threshold);
        }
    }
}
