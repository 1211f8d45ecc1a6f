use log::debug;
use std::collections::BTreeMap;

use crate::models::{
    ChannelKind, ChannelRecord, Consumption, ElectricityRecord, Failures, MaxDemand, PhaseRecord, ProtocolProfile, Reading,
};
use super::meter_definitions::AUX_CHANNELS;
use super::structs::FlatFieldMap;
use super::utils::version_from_digits;

/// Version assumed when a telegram does not announce one
pub const DEFAULT_VERSION: &str = "2.2";

/// Import or export side of the electricity registers
#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Import,
    Export,
}

impl Direction {
    fn suffix(&self) -> &'static str {
        match self {
            Direction::Import => "",
            Direction::Export => "_back",
        }
    }
}

pub fn resolve_profile(fields: &FlatFieldMap) -> ProtocolProfile {
    if fields.contains("version_be") {
        ProtocolProfile::Belgian
    } else {
        ProtocolProfile::Standard
    }
}

pub fn resolve_version(fields: &FlatFieldMap, profile: ProtocolProfile) -> String {
    let version = match profile {
        ProtocolProfile::Belgian => fields.text("version_be").and_then(|v| version_from_digits(&v)),
        ProtocolProfile::Standard => fields.text("version"),
    };
    version.unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// Folds the flat field map of one telegram into a nested reading
pub fn assemble(fields: &FlatFieldMap) -> Reading {
    let profile = resolve_profile(fields);
    let version = resolve_version(fields, profile);
    debug!("Assembling reading, DSMR {} ({:?} profile), {} fields", version, profile, fields.len());

    let electricity = electricity_record(fields, profile, Direction::Import);
    let mut electricity_back = electricity_record(fields, profile, Direction::Export);
    electricity_back.id = electricity.id.as_ref().map(|id| format!("{}B", id));

    Reading {
        header: fields.text("type").unwrap_or_default(),
        version,
        profile,
        msg_text: fields.text("msg_text"),
        msg_num: fields.text("msg_num"),
        electricity,
        electricity_back,
        channels: channel_records(fields),
    }
}

fn consumption(fields: &FlatFieldMap, profile: ProtocolProfile, direction: Direction) -> Consumption {
    let t1 = fields.f64(&format!("consumption{}_t1", direction.suffix()));
    let t2 = fields.f64(&format!("consumption{}_t2", direction.suffix()));

    match profile {
        ProtocolProfile::Standard => Consumption::new(t1, t2),
        ProtocolProfile::Belgian => Consumption::new(t2, t1),
    }
}

/// A phase counts once both its voltage and its current were decoded
fn has_phase(fields: &FlatFieldMap, phase: u8) -> bool {
    fields.contains(&format!("l{}_voltage", phase)) && fields.contains(&format!("l{}_current", phase))
}

fn phase_record(fields: &FlatFieldMap, phase: u8, direction: Direction) -> PhaseRecord {
    let power = fields.f64(&format!("l{}_power{}", phase, direction.suffix()));

    if direction == Direction::Export {
        return PhaseRecord { power, ..Default::default() };
    }

    PhaseRecord {
        voltage: fields.f64(&format!("l{}_voltage", phase)),
        current: fields.f64(&format!("l{}_current", phase)),
        sags: fields.i64(&format!("l{}_sags", phase)),
        swells: fields.i64(&format!("l{}_swells", phase)),
        power,
    }
}

fn electricity_record(fields: &FlatFieldMap, profile: ProtocolProfile, direction: Direction) -> ElectricityRecord {
    let polyphase = has_phase(fields, 2) && has_phase(fields, 3);

    let mut record = ElectricityRecord {
        id: fields.text("id").map(|id| id.trim().to_string()),
        last_updated: fields.timestamp("lastupdated"),
        tariff: fields.tariff("tariff"),
        consumption: consumption(fields, profile, direction),
        power: fields.f64(&format!("power{}", direction.suffix())),
        l1: phase_record(fields, 1, direction),
        l2: polyphase.then(|| phase_record(fields, 2, direction)),
        l3: polyphase.then(|| phase_record(fields, 3, direction)),
        ..Default::default()
    };

    if direction == Direction::Export {
        return record;
    }

    if fields.contains("failures_short") || fields.contains("failures_long") || fields.contains("log") {
        record.failures = Some(Failures {
            short: fields.i64("failures_short"),
            long: fields.i64("failures_long"),
            log: fields.log("log"),
        });
    }

    record.breaker = fields.breaker("breaker");
    record.limiter_threshold = fields.f64("limiter_threshold");
    record.fuse_threshold = fields.f64("fuse_threshold");
    record.average_demand = fields.f64("average_demand");

    if fields.contains("max_demand") || fields.contains("max_demand_time") {
        record.max_demand = Some(MaxDemand {
            time: fields.timestamp("max_demand_time"),
            power: fields.f64("max_demand"),
        });
    }

    record
}

/// One record per device kind, a later slot replaces an earlier one of the same kind
fn channel_records(fields: &FlatFieldMap) -> BTreeMap<ChannelKind, ChannelRecord> {
    let mut channels = BTreeMap::new();

    for n in 1..=AUX_CHANNELS {
        let Some(kind) = fields.channel(&format!("d{}_type", n)) else { continue };
        let record = ChannelRecord {
            channel: n,
            kind,
            id: fields.text(&format!("d{}_id", n)).map(|id| id.trim().to_string()),
            last_updated: fields.timestamp(&format!("d{}_lastupdated", n)),
            consumption: fields.f64(&format!("d{}_consumption", n)),
            valve: fields.breaker(&format!("d{}_valve", n)),
        };

        if let Some(previous) = channels.insert(kind, record) {
            debug!("Channel {} replaces channel {} as {}", n, previous.channel, kind);
        }
    }

    channels
}
