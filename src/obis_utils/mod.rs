use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref REFERENCE_CODE: Regex = Regex::new(r"^(\d+-\d+:\d+\.\d+\.\d+)").unwrap();
    static ref TOKEN: Regex = Regex::new(r"\(([^)]*)\)").unwrap();
}

/// One reference-coded line of a telegram, continuation lines included
#[derive(Debug, Clone, PartialEq)]
pub struct ObisLine {
    pub code: String,
    pub tokens: Vec<String>,
    pub raw: String,
}

/// Returns the reference code a line starts with, if any
pub fn reference_code(line: &str) -> Option<&str> {
    REFERENCE_CODE.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Contents of all parenthesized tokens, in order
pub fn extract_tokens(data: &str) -> Vec<String> {
    TOKEN.captures_iter(data)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Groups the physical lines of a telegram body into reference lines.
/// A line starting with `(` continues the previous reference line (DSMR 2.2 gas).
pub fn split_reference_lines(body: &str) -> Vec<ObisLine> {
    let mut result: Vec<ObisLine> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');

        if line.starts_with('!') {
            break;
        }

        if let Some(code) = reference_code(line) {
            result.push(ObisLine {
                code: code.to_string(),
                tokens: extract_tokens(&line[code.len()..]),
                raw: line.to_string(),
            });
        } else if line.starts_with('(') {
            if let Some(last) = result.last_mut() {
                last.tokens.extend(extract_tokens(line));
                last.raw.push_str(line);
            }
        }
    }

    result
}

/// Human readable name of a reference code, for diagnostics
pub fn get_obis_description(obis_code: &str) -> Option<&'static str> {
    DESCRIPTIONS.get(obis_code).copied()
}

lazy_static! {
    static ref DESCRIPTIONS: HashMap<&'static str, &'static str> = HashMap::from([
        // Header
        ("1-3:0.2.8", "DSMR version"),
        ("0-0:96.1.4", "e-MUCS version"),
        ("0-0:1.0.0", "Telegram timestamp"),
        ("0-0:96.1.1", "Meter serial number"),
        ("0-0:96.14.0", "Active tariff register"),
        ("0-0:96.13.0", "Consumer message"),
        ("0-0:96.13.1", "Consumer message code"),

        // Registers
        ("1-0:1.8.1", "Imported energy, tariff 1"),
        ("1-0:1.8.2", "Imported energy, tariff 2"),
        ("1-0:2.8.1", "Exported energy, tariff 1"),
        ("1-0:2.8.2", "Exported energy, tariff 2"),
        ("1-0:1.7.0", "Import power"),
        ("1-0:2.7.0", "Export power"),
        ("1-0:1.4.0", "Average demand of the running quarter"),
        ("1-0:1.6.0", "Peak demand this month"),

        // Phases
        ("1-0:21.7.0", "Import power L1"),
        ("1-0:41.7.0", "Import power L2"),
        ("1-0:61.7.0", "Import power L3"),
        ("1-0:22.7.0", "Export power L1"),
        ("1-0:42.7.0", "Export power L2"),
        ("1-0:62.7.0", "Export power L3"),
        ("1-0:32.7.0", "Voltage L1"),
        ("1-0:52.7.0", "Voltage L2"),
        ("1-0:72.7.0", "Voltage L3"),
        ("1-0:31.7.0", "Current L1"),
        ("1-0:51.7.0", "Current L2"),
        ("1-0:71.7.0", "Current L3"),
        ("1-0:32.32.0", "Voltage sags L1"),
        ("1-0:52.32.0", "Voltage sags L2"),
        ("1-0:72.32.0", "Voltage sags L3"),
        ("1-0:32.36.0", "Voltage swells L1"),
        ("1-0:52.36.0", "Voltage swells L2"),
        ("1-0:72.36.0", "Voltage swells L3"),

        // Outages
        ("0-0:96.7.21", "Power failures"),
        ("0-0:96.7.9", "Long power failures"),
        ("1-0:99.97.0", "Long power failure log"),

        // e-MUCS
        ("0-0:96.3.10", "Breaker state"),
        ("0-0:17.0.0", "Limiter threshold"),
        ("1-0:31.4.0", "Fuse supervision threshold"),
    ]);

    static ref OBIS_CODE: Regex = Regex::new(r"^(\d+)-(\d+):(\d+)\.(\d+)\.(\d+)(?:\*(\d+))?$").unwrap();
}

/// Checks the `A-B:C.D.E[*F]` shape with every group in 0..=255
pub fn validate_obis_code(code: &str) -> bool {
    let Some(caps) = OBIS_CODE.captures(code) else {
        return false;
    };

    caps.iter()
        .skip(1)
        .flatten()
        .all(|group| group.as_str().parse::<u8>().is_ok())
}

/// Splits `123.456*kWh` into value and unit
pub fn split_unit(token: &str) -> (&str, Option<&str>) {
    match token.split_once('*') {
        Some((value, unit)) => (value, Some(unit)),
        None => (token, None),
    }
}
