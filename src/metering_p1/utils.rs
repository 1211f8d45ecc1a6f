use chrono::NaiveDate;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

use crate::models::{BreakerState, ChannelKind, Tariff};
use crate::obis_utils::split_unit;
use super::structs::{DecoderConfig, FieldValue};
use super::FieldError;

lazy_static! {
    static ref TIMESTAMP: Regex = Regex::new(r"^(\d\d)(\d\d)(\d\d)(\d\d)(\d\d)(\d\d)([SW])?$").unwrap();
    static ref NUMBER: Regex = Regex::new(r"^\d+(?:\.\d+)?$").unwrap();
}

/// `YYMMDDhhmmss[S|W]` to a naive local timestamp.
/// The DST marker is parsed but not applied as an offset.
pub fn parse_timestamp(token: &str, _config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let caps = TIMESTAMP.captures(token)
        .ok_or_else(|| FieldError::InvalidTimestamp(token.to_string()))?;

    let part = |i: usize| -> u32 {
        caps.get(i).map(|m| m.as_str()).unwrap_or("0").parse::<u32>().unwrap_or(0)
    };

    NaiveDate::from_ymd_opt(2000 + part(1) as i32, part(2), part(3))
        .and_then(|d| d.and_hms_opt(part(4), part(5), part(6)))
        .map(FieldValue::Timestamp)
        .ok_or_else(|| FieldError::InvalidTimestamp(token.to_string()))
}

/// One character per byte (ISO 8859-1)
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| *b as char).collect()
}

/// Hex encoded octet string, one character per byte
pub fn parse_text(token: &str, _config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let bytes = hex::decode(token)
        .map_err(|_| FieldError::InvalidToken(token.to_string()))?;

    Ok(FieldValue::Text(latin1(&bytes)))
}

/// Token kept as is
pub fn parse_raw(token: &str, _config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    Ok(FieldValue::Text(token.to_string()))
}

/// Numeric value with optional `*unit`; kW is normalised to W
pub fn parse_value(token: &str, _config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let (number, unit) = split_unit(token);
    if !NUMBER.is_match(number) {
        return Err(FieldError::InvalidToken(token.to_string()));
    }

    let float = || number.parse::<f64>().map_err(|_| FieldError::InvalidToken(token.to_string()));

    match unit {
        None | Some("s") => {
            let integer_part = number.split('.').next().unwrap_or(number);
            integer_part.parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| FieldError::InvalidToken(token.to_string()))
        }
        Some("kWh") | Some("V") | Some("A") | Some("m3") | Some("GJ") => Ok(FieldValue::Float(float()?)),
        Some("kW") => Ok(FieldValue::Float((float()? * 1000.0).round())),
        Some(other) => Err(FieldError::UnknownUnit(other.to_string())),
    }
}

/// Volume without unit, as sent by DSMR 2.2 gas meters
pub fn parse_volume(token: &str, config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    match split_unit(token) {
        (_, Some(_)) => parse_value(token, config),
        (number, None) => parse_value(&format!("{}*m3", number), config),
    }
}

fn parse_integer(token: &str, config: &DecoderConfig) -> Result<i64, FieldError> {
    match parse_value(token, config)? {
        FieldValue::Integer(v) => Ok(v),
        _ => Err(FieldError::InvalidToken(token.to_string())),
    }
}

pub fn parse_tariff(token: &str, config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let register = parse_integer(token, config)?;
    Ok(FieldValue::Tariff(Tariff::from_register(register, config.profile)))
}

pub fn parse_breaker(token: &str, config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let code = parse_integer(token, config)?;
    BreakerState::from_code(code)
        .map(FieldValue::Breaker)
        .ok_or(FieldError::UnknownBreakerValue(code))
}

pub fn parse_channel_type(token: &str, config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let code = parse_integer(token, config)?;
    let code = u8::try_from(code).map_err(|_| FieldError::InvalidToken(token.to_string()))?;
    Ok(FieldValue::Channel(ChannelKind::from_code(code)))
}

/// `50` -> `5.0`
pub fn version_from_digits(digits: &str) -> Option<String> {
    let mut chars = digits.chars().filter(|c| c.is_ascii_digit());
    match (chars.next(), chars.next()) {
        (Some(major), Some(minor)) => Some(format!("{}.{}", major, minor)),
        _ => None,
    }
}

pub fn parse_version(token: &str, _config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    version_from_digits(token)
        .map(FieldValue::Text)
        .ok_or_else(|| FieldError::InvalidToken(token.to_string()))
}

/// Entry count, the log's own reference code, then (timestamp, duration) pairs.
/// Pairs that do not parse are dropped.
pub fn parse_log(tokens: &[String], config: &DecoderConfig) -> Result<FieldValue, FieldError> {
    let first = tokens.first().ok_or(FieldError::MissingToken(0))?;
    let entries = parse_integer(first, config)?;

    let mut log = BTreeMap::new();
    for i in 1..=entries.max(0) as usize {
        let (Some(date), Some(duration)) = (tokens.get(2 * i), tokens.get(2 * i + 1)) else {
            debug!("Power failure log announces {} entries, entry {} is missing", entries, i);
            break;
        };

        match (parse_timestamp(date, config), parse_value(duration, config)) {
            (Ok(FieldValue::Timestamp(date)), Ok(FieldValue::Integer(seconds))) => {
                log.insert(date, seconds);
            }
            _ => debug!("Dropping power failure entry ({})({})", date, duration),
        }
    }

    Ok(FieldValue::Log(log))
}
