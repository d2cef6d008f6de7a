use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Property-wide capacity. One value, shared by everything that needs totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    rooms: u32,
    halls: u32,
}

impl Capacity {
    pub const fn new(rooms: u32, halls: u32) -> Self {
        Self { rooms, halls }
    }

    pub fn total_rooms(&self) -> u32 {
        self.rooms
    }

    pub fn total_halls(&self) -> u32 {
        self.halls
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::new(13, 2)
    }
}

/// Whether a hall is charged once per stay or once per night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HallBilling {
    PerNight,
    #[default]
    PerStay,
}

impl FromStr for HallBilling {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-night" => Ok(HallBilling::PerNight),
            "per-stay" => Ok(HallBilling::PerStay),
            other => Err(ConfigError::Invalid {
                key: "STAYLEDGER_HALL_BILLING",
                value: other.to_string(),
            }),
        }
    }
}

/// Pricing knobs applied uniformly by the booking manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    pub hall_billing: HallBilling,
    /// Share of the total due up front, in percent.
    pub advance_percent: u32,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            hall_billing: HallBilling::PerStay,
            advance_percent: 50,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub capacity: Capacity,
    pub policy: BookingPolicy,
    /// WAL appends before the compactor rewrites the log.
    pub compact_threshold: u64,
    /// How often the reconciler rebuilds the ledger. `None` disables it.
    pub reconcile_interval: Option<Duration>,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            capacity: Capacity::default(),
            policy: BookingPolicy::default(),
            compact_threshold: 1000,
            reconcile_interval: Some(Duration::from_secs(3600)),
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `STAYLEDGER_*` variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let data_dir = lookup("STAYLEDGER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let rooms = parse_or(&lookup, "STAYLEDGER_TOTAL_ROOMS", defaults.capacity.total_rooms())?;
        let halls = parse_or(&lookup, "STAYLEDGER_TOTAL_HALLS", defaults.capacity.total_halls())?;
        if rooms == 0 {
            return Err(ConfigError::Invalid {
                key: "STAYLEDGER_TOTAL_ROOMS",
                value: rooms.to_string(),
            });
        }
        if halls > 2 {
            // Bookings carry exactly two hall flags.
            return Err(ConfigError::Invalid {
                key: "STAYLEDGER_TOTAL_HALLS",
                value: halls.to_string(),
            });
        }

        let hall_billing = match lookup("STAYLEDGER_HALL_BILLING") {
            Some(v) => v.parse()?,
            None => defaults.policy.hall_billing,
        };
        let advance_percent = parse_or(
            &lookup,
            "STAYLEDGER_ADVANCE_PERCENT",
            defaults.policy.advance_percent,
        )?;
        if advance_percent > 100 {
            return Err(ConfigError::Invalid {
                key: "STAYLEDGER_ADVANCE_PERCENT",
                value: advance_percent.to_string(),
            });
        }

        let compact_threshold = parse_or(
            &lookup,
            "STAYLEDGER_COMPACT_THRESHOLD",
            defaults.compact_threshold,
        )?;
        let reconcile_secs: u64 = parse_or(&lookup, "STAYLEDGER_RECONCILE_SECS", 3600)?;
        let metrics_port = match lookup("STAYLEDGER_METRICS_PORT") {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::Invalid {
                key: "STAYLEDGER_METRICS_PORT",
                value: v,
            })?),
            None => None,
        };

        Ok(Self {
            data_dir,
            capacity: Capacity::new(rooms, halls),
            policy: BookingPolicy {
                hall_billing,
                advance_percent,
            },
            compact_threshold,
            reconcile_interval: (reconcile_secs > 0).then(|| Duration::from_secs(reconcile_secs)),
            metrics_port,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid { key, value: v }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_property() {
        let cfg = Config::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.capacity.total_rooms(), 13);
        assert_eq!(cfg.capacity.total_halls(), 2);
        assert_eq!(cfg.policy.hall_billing, HallBilling::PerStay);
        assert_eq!(cfg.policy.advance_percent, 50);
        assert_eq!(cfg.reconcile_interval, Some(Duration::from_secs(3600)));
        assert_eq!(cfg.metrics_port, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("STAYLEDGER_TOTAL_ROOMS", "20"),
            ("STAYLEDGER_TOTAL_HALLS", "1"),
            ("STAYLEDGER_HALL_BILLING", "per-night"),
            ("STAYLEDGER_ADVANCE_PERCENT", "30"),
            ("STAYLEDGER_RECONCILE_SECS", "0"),
            ("STAYLEDGER_METRICS_PORT", "9100"),
        ]))
        .unwrap();
        assert_eq!(cfg.capacity, Capacity::new(20, 1));
        assert_eq!(cfg.policy.hall_billing, HallBilling::PerNight);
        assert_eq!(cfg.policy.advance_percent, 30);
        assert_eq!(cfg.reconcile_interval, None);
        assert_eq!(cfg.metrics_port, Some(9100));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("STAYLEDGER_TOTAL_ROOMS", "many")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STAYLEDGER_TOTAL_ROOMS", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STAYLEDGER_TOTAL_HALLS", "3")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STAYLEDGER_HALL_BILLING", "weekly")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("STAYLEDGER_ADVANCE_PERCENT", "150")])).is_err());
    }
}
