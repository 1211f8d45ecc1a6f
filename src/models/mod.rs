use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;


/// Which numbering convention the meter uses for its tariff registers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ProtocolProfile {
    /// Dutch DSMR: register 1 is the low tariff
    #[default]
    Standard,
    /// Belgian e-MUCS: register 1 is the normal tariff
    Belgian,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tariff {
    Low,
    Normal,
}

impl Tariff {
    /// Resolve a tariff register number (1 or 2) to its label
    pub fn from_register(register: i64, profile: ProtocolProfile) -> Self {
        match (profile, register) {
            (ProtocolProfile::Standard, 1) => Tariff::Low,
            (ProtocolProfile::Belgian, 2) => Tariff::Low,
            _ => Tariff::Normal,
        }
    }

    pub fn to_string(&self) -> String {
        match self {
            Tariff::Low => "low".to_string(),
            Tariff::Normal => "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Disconnected,
    Connected,
    Ready,
}

impl BreakerState {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(BreakerState::Disconnected),
            1 => Some(BreakerState::Connected),
            2 => Some(BreakerState::Ready),
            _ => None,
        }
    }
}

/// Utility metered on an auxiliary channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Gas,
    Water,
    Thermal,
    Other(u8),
}

impl ChannelKind {
    pub fn from_code(code: u8) -> Self {
        match code {
            3 => ChannelKind::Gas,
            4 => ChannelKind::Thermal,
            7 => ChannelKind::Water,
            other => ChannelKind::Other(other),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Gas => write!(f, "gas"),
            ChannelKind::Water => write!(f, "water"),
            ChannelKind::Thermal => write!(f, "thermal"),
            ChannelKind::Other(code) => write!(f, "d{}", code),
        }
    }
}

impl Serialize for ChannelKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Consumption {
    pub low: Option<f64>,
    pub normal: Option<f64>,
    /// low + normal, rounded to Wh
    pub total: Option<f64>,
}

impl Consumption {
    pub fn new(low: Option<f64>, normal: Option<f64>) -> Self {
        let total = match (low, normal) {
            (Some(l), Some(n)) => Some(((l + n) * 1000.0).round() / 1000.0),
            _ => None,
        };
        Consumption { low, normal, total }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Failures {
    pub short: Option<i64>,
    pub long: Option<i64>,
    /// Power failure start time -> duration in seconds
    pub log: Option<BTreeMap<NaiveDateTime, i64>>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PhaseRecord {
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub sags: Option<i64>,
    pub swells: Option<i64>,
    pub power: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MaxDemand {
    pub time: Option<NaiveDateTime>,
    pub power: Option<f64>,
}

/// Consumption or back-feed side of the electricity meter
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ElectricityRecord {
    pub id: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
    pub tariff: Option<Tariff>,
    pub consumption: Consumption,
    pub power: Option<f64>,
    pub failures: Option<Failures>,
    pub breaker: Option<BreakerState>,
    pub limiter_threshold: Option<f64>,
    pub fuse_threshold: Option<f64>,
    pub average_demand: Option<f64>,
    pub max_demand: Option<MaxDemand>,
    pub l1: PhaseRecord,
    pub l2: Option<PhaseRecord>,
    pub l3: Option<PhaseRecord>,
}

impl ElectricityRecord {
    pub fn is_polyphase(&self) -> bool {
        self.l2.is_some() && self.l3.is_some()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelRecord {
    /// Slot number 1-4 in the telegram
    pub channel: u8,
    #[serde(skip)]
    pub kind: ChannelKind,
    pub id: Option<String>,
    pub last_updated: Option<NaiveDateTime>,
    pub consumption: Option<f64>,
    pub valve: Option<BreakerState>,
}

/// One fully assembled telegram
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reading {
    #[serde(rename = "type")]
    pub header: String,
    pub version: String,
    pub profile: ProtocolProfile,
    pub msg_text: Option<String>,
    pub msg_num: Option<String>,
    pub electricity: ElectricityRecord,
    pub electricity_back: ElectricityRecord,
    /// Auxiliary meters, serialised as top-level `gas`, `water`, `thermal` or `d<n>` keys
    #[serde(flatten)]
    pub channels: BTreeMap<ChannelKind, ChannelRecord>,
}

impl Reading {
    pub fn channel(&self, kind: ChannelKind) -> Option<&ChannelRecord> {
        self.channels.get(&kind)
    }

    pub fn gas(&self) -> Option<&ChannelRecord> {
        self.channel(ChannelKind::Gas)
    }

    /// Back-feed only matters when the meter actually registered export
    pub fn has_back_feed(&self) -> bool {
        let c = &self.electricity_back.consumption;
        c.low.unwrap_or(0.0) > 0.0 || c.normal.unwrap_or(0.0) > 0.0
    }
}
