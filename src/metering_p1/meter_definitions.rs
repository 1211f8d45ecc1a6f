use lazy_static::lazy_static;
use std::collections::HashMap;

use super::structs::DecodeRule;
use super::utils::*;

/// Number of auxiliary M-Bus channels a P1 telegram can carry
pub const AUX_CHANNELS: u8 = 4;

/// Marker whose presence identifies the Belgian e-MUCS profile
pub const BELGIAN_MARKER: &str = "0-0:96.1.4";

pub type DecodeTable = HashMap<String, Vec<DecodeRule>>;

lazy_static! {
    pub static ref DECODE_TABLE: DecodeTable = build_decode_table();
}

fn single(table: &mut DecodeTable, code: &str, rule: DecodeRule) {
    table.insert(code.to_string(), vec![rule]);
}

fn build_decode_table() -> DecodeTable {
    let mut table: DecodeTable = HashMap::new();

    // Header and meter identification
    single(&mut table, "1-3:0.2.8", DecodeRule::token("version", parse_version));
    single(&mut table, BELGIAN_MARKER, DecodeRule::token("version_be", parse_raw));
    single(&mut table, "0-0:1.0.0", DecodeRule::token("lastupdated", parse_timestamp));
    single(&mut table, "0-0:96.1.1", DecodeRule::token("id", parse_text));
    single(&mut table, "0-0:96.14.0", DecodeRule::token("tariff", parse_tariff));
    single(&mut table, "0-0:96.13.0", DecodeRule::token("msg_text", parse_text));
    single(&mut table, "0-0:96.13.1", DecodeRule::token("msg_num", parse_text));

    // Power quality
    single(&mut table, "0-0:96.7.21", DecodeRule::token("failures_short", parse_value));
    single(&mut table, "0-0:96.7.9", DecodeRule::token("failures_long", parse_value));
    single(&mut table, "1-0:99.97.0", DecodeRule::all_tokens("log", parse_log));

    // Belgian e-MUCS extensions
    single(&mut table, "0-0:96.3.10", DecodeRule::token("breaker", parse_breaker));
    single(&mut table, "0-0:17.0.0", DecodeRule::token("limiter_threshold", parse_value));
    single(&mut table, "1-0:31.4.0", DecodeRule::token("fuse_threshold", parse_value));
    single(&mut table, "1-0:1.4.0", DecodeRule::token("average_demand", parse_value));
    table.insert("1-0:1.6.0".to_string(), vec![
        DecodeRule::token("max_demand_time", parse_timestamp),
        DecodeRule::token("max_demand", parse_value),
    ]);

    // Electricity registers, tariff 1 and 2
    single(&mut table, "1-0:1.7.0", DecodeRule::token("power", parse_value));
    single(&mut table, "1-0:1.8.1", DecodeRule::token("consumption_t1", parse_value));
    single(&mut table, "1-0:1.8.2", DecodeRule::token("consumption_t2", parse_value));
    single(&mut table, "1-0:2.7.0", DecodeRule::token("power_back", parse_value));
    single(&mut table, "1-0:2.8.1", DecodeRule::token("consumption_back_t1", parse_value));
    single(&mut table, "1-0:2.8.2", DecodeRule::token("consumption_back_t2", parse_value));

    // Per phase: L1 uses C=21/22/31/32, L2 adds 20, L3 adds 40
    for phase in 1..=3u32 {
        let offset = (phase - 1) * 20;
        let l = format!("l{}", phase);
        single(&mut table, &format!("1-0:{}.7.0", 21 + offset), DecodeRule::token(&format!("{}_power", l), parse_value));
        single(&mut table, &format!("1-0:{}.7.0", 22 + offset), DecodeRule::token(&format!("{}_power_back", l), parse_value));
        single(&mut table, &format!("1-0:{}.7.0", 31 + offset), DecodeRule::token(&format!("{}_current", l), parse_value));
        single(&mut table, &format!("1-0:{}.7.0", 32 + offset), DecodeRule::token(&format!("{}_voltage", l), parse_value));
        single(&mut table, &format!("1-0:{}.32.0", 32 + offset), DecodeRule::token(&format!("{}_sags", l), parse_value));
        single(&mut table, &format!("1-0:{}.36.0", 32 + offset), DecodeRule::token(&format!("{}_swells", l), parse_value));
    }

    // Auxiliary channels (gas, water, thermal)
    for channel in 1..=AUX_CHANNELS {
        let d = format!("d{}", channel);
        let code = |c: &str| format!("0-{}:{}", channel, c);

        single(&mut table, &code("24.1.0"), DecodeRule::token(&format!("{}_type", d), parse_channel_type));
        single(&mut table, &code("96.1.0"), DecodeRule::token(&format!("{}_id", d), parse_text));
        single(&mut table, &code("96.1.1"), DecodeRule::token(&format!("{}_id", d), parse_text));
        single(&mut table, &code("24.4.0"), DecodeRule::token(&format!("{}_valve", d), parse_breaker));

        let reading = vec![
            DecodeRule::token(&format!("{}_lastupdated", d), parse_timestamp),
            DecodeRule::token(&format!("{}_consumption", d), parse_value),
        ];
        table.insert(code("24.2.1"), reading.clone());
        table.insert(code("24.2.3"), reading);

        // DSMR 2.2: (time)(period)(interval)(values)(code)(unit) then the volume
        let mut legacy = vec![DecodeRule::token(&format!("{}_lastupdated", d), parse_timestamp)];
        legacy.extend((0..5).map(|_| DecodeRule::skip()));
        legacy.push(DecodeRule::token(&format!("{}_consumption", d), parse_volume));
        table.insert(code("24.3.0"), legacy);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obis_utils::validate_obis_code;

    #[test]
    fn test_all_codes_are_valid() {
        for code in DECODE_TABLE.keys() {
            assert!(validate_obis_code(code), "invalid reference code {}", code);
        }
    }

    #[test]
    fn test_every_rule_list_names_a_field() {
        for (code, rules) in DECODE_TABLE.iter() {
            assert!(!rules.is_empty(), "{} has no rules", code);
            assert!(rules.iter().any(|r| r.field.is_some()), "{} decodes nothing", code);
        }
    }

    #[test]
    fn test_phase_codes() {
        let field = |code: &str| DECODE_TABLE.get(code).and_then(|r| r[0].field.clone());
        assert_eq!(field("1-0:21.7.0").as_deref(), Some("l1_power"));
        assert_eq!(field("1-0:52.7.0").as_deref(), Some("l2_voltage"));
        assert_eq!(field("1-0:71.7.0").as_deref(), Some("l3_current"));
        assert_eq!(field("1-0:72.36.0").as_deref(), Some("l3_swells"));
        assert_eq!(field("1-0:62.7.0").as_deref(), Some("l3_power_back"));
    }

    #[test]
    fn test_channel_codes() {
        let rules = DECODE_TABLE.get("0-4:24.2.1").unwrap();
        assert_eq!(rules[1].field.as_deref(), Some("d4_consumption"));

        let legacy = DECODE_TABLE.get("0-1:24.3.0").unwrap();
        assert_eq!(legacy.len(), 7);
        assert_eq!(legacy[6].field.as_deref(), Some("d1_consumption"));
        assert!(legacy[1..6].iter().all(|r| r.field.is_none()));

        assert!(DECODE_TABLE.get("0-5:24.1.0").is_none());
    }

    #[test]
    fn test_log_consumes_all_tokens() {
        let rules = DECODE_TABLE.get("1-0:99.97.0").unwrap();
        assert!(rules[0].consumes_all_tokens());
    }
}
