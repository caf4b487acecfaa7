use std::fmt;
use std::time::Duration;

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The fixed set of strategies an agent can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "immediate", alias = "sniper")]
    Immediate,
    #[serde(rename = "periodic_1", alias = "volume_1")]
    Periodic1,
    #[serde(rename = "periodic_2", alias = "volume_2")]
    Periodic2,
    #[serde(rename = "periodic_3", alias = "volume_3")]
    Periodic3,
    #[serde(rename = "periodic_4", alias = "volume_4")]
    Periodic4,
    #[serde(rename = "periodic_5", alias = "volume_5")]
    Periodic5,
    #[serde(rename = "periodic_6", alias = "volume_6")]
    Periodic6,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 7] = [
        StrategyKind::Immediate,
        StrategyKind::Periodic1,
        StrategyKind::Periodic2,
        StrategyKind::Periodic3,
        StrategyKind::Periodic4,
        StrategyKind::Periodic5,
        StrategyKind::Periodic6,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Immediate => "immediate",
            StrategyKind::Periodic1 => "periodic_1",
            StrategyKind::Periodic2 => "periodic_2",
            StrategyKind::Periodic3 => "periodic_3",
            StrategyKind::Periodic4 => "periodic_4",
            StrategyKind::Periodic5 => "periodic_5",
            StrategyKind::Periodic6 => "periodic_6",
        }
    }

    /// Timing and sizing parameters of this strategy.
    pub fn profile(&self) -> StrategyProfile {
        match self {
            StrategyKind::Immediate => StrategyProfile::OneShot,
            StrategyKind::Periodic1 => StrategyProfile::RandomVolume {
                interval: Duration::from_secs(30),
                size: SizeRange::new(Decimal::new(1, 2), Decimal::new(6, 2)),
                buy_probability: 0.5,
            },
            StrategyKind::Periodic2 => StrategyProfile::RandomVolume {
                interval: Duration::from_secs(60),
                size: SizeRange::new(Decimal::new(5, 2), Decimal::new(15, 2)),
                buy_probability: 0.5,
            },
            StrategyKind::Periodic3 => StrategyProfile::RandomVolume {
                interval: Duration::from_secs(180),
                size: SizeRange::new(Decimal::new(10, 2), Decimal::new(30, 2)),
                buy_probability: 0.5,
            },
            StrategyKind::Periodic4 => StrategyProfile::RandomVolume {
                interval: Duration::from_secs(120),
                size: SizeRange::new(Decimal::new(5, 2), Decimal::new(20, 2)),
                buy_probability: 0.6,
            },
            StrategyKind::Periodic5 => StrategyProfile::Support {
                interval: Duration::from_secs(60),
                size: SizeRange::new(Decimal::new(10, 2), Decimal::new(20, 2)),
            },
            StrategyKind::Periodic6 => StrategyProfile::ProfitTaking {
                interval: Duration::from_secs(300),
                fraction: SizeRange::new(Decimal::new(10, 2), Decimal::new(30, 2)),
            },
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed description of what a strategy does on each firing.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyProfile {
    /// A single buy at the agent's max buy size, then nothing.
    OneShot,
    /// Random buy or sell every interval, sized in native units.
    RandomVolume {
        interval: Duration,
        size: SizeRange,
        buy_probability: f64,
    },
    /// Buy when the price drops below the agent's support price.
    Support { interval: Duration, size: SizeRange },
    /// Sell a fraction of the token balance when the price rises above the profit price.
    ProfitTaking {
        interval: Duration,
        fraction: SizeRange,
    },
}

impl StrategyProfile {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            StrategyProfile::OneShot => None,
            StrategyProfile::RandomVolume { interval, .. }
            | StrategyProfile::Support { interval, .. }
            | StrategyProfile::ProfitTaking { interval, .. } => Some(*interval),
        }
    }

    /// Replace the firing interval. One-shot profiles are returned unchanged.
    pub fn with_interval(mut self, period: Duration) -> Self {
        match &mut self {
            StrategyProfile::OneShot => {}
            StrategyProfile::RandomVolume { interval, .. }
            | StrategyProfile::Support { interval, .. }
            | StrategyProfile::ProfitTaking { interval, .. } => *interval = period,
        }
        self
    }
}

/// Inclusive-exclusive range a random trade size is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl SizeRange {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Decimal {
        let unit = Decimal::from_f64(rng.gen::<f64>()).unwrap_or(Decimal::ZERO);
        (self.min + (self.max - self.min) * unit).round_dp(9)
    }

    pub fn contains(&self, value: Decimal) -> bool {
        value >= self.min && value <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn serde_names() {
        let json = serde_json::to_string(&StrategyKind::Periodic3).unwrap();
        assert_eq!(json, "\"periodic_3\"");

        let parsed: StrategyKind = serde_json::from_str("\"immediate\"").unwrap();
        assert_eq!(parsed, StrategyKind::Immediate);
    }

    #[test]
    fn legacy_names_are_accepted() {
        let sniper: StrategyKind = serde_json::from_str("\"sniper\"").unwrap();
        let volume: StrategyKind = serde_json::from_str("\"volume_5\"").unwrap();
        assert_eq!(sniper, StrategyKind::Immediate);
        assert_eq!(volume, StrategyKind::Periodic5);
    }

    #[test]
    fn display_matches_serde() {
        for kind in StrategyKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json.trim_matches('"'), kind.to_string());
        }
    }

    #[test]
    fn immediate_has_no_interval() {
        assert_eq!(StrategyKind::Immediate.profile(), StrategyProfile::OneShot);
        assert_eq!(StrategyKind::Immediate.profile().interval(), None);
    }

    #[test]
    fn volume_intervals_grow_with_variant() {
        let p1 = StrategyKind::Periodic1.profile().interval().unwrap();
        let p2 = StrategyKind::Periodic2.profile().interval().unwrap();
        let p3 = StrategyKind::Periodic3.profile().interval().unwrap();
        assert!(p1 < p2 && p2 < p3);
    }

    #[test]
    fn periodic_4_is_biased_toward_buys() {
        match StrategyKind::Periodic4.profile() {
            StrategyProfile::RandomVolume {
                buy_probability, ..
            } => assert_eq!(buy_probability, 0.6),
            other => panic!("unexpected profile: {other:?}"),
        }
    }

    #[test]
    fn with_interval_overrides_periodic_profiles() {
        let profile = StrategyKind::Periodic6
            .profile()
            .with_interval(Duration::from_secs(5));
        assert_eq!(profile.interval(), Some(Duration::from_secs(5)));
        assert_eq!(
            StrategyKind::Immediate
                .profile()
                .with_interval(Duration::from_secs(5)),
            StrategyProfile::OneShot
        );
    }

    #[test]
    fn samples_stay_in_range() {
        let range = SizeRange::new(dec!(0.05), dec!(0.15));
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            assert!(range.contains(range.sample(&mut rng)));
        }
    }
}
