use log::{debug, warn};

use crate::models::ProtocolProfile;
use crate::obis_utils::{self, ObisLine};
use super::meter_definitions::{DecodeTable, BELGIAN_MARKER, DECODE_TABLE};
use super::structs::{Conversion, DecoderConfig, FieldValue, FlatFieldMap};
use super::validator::ValidatedTelegram;
use super::FieldError;

/// Result of one decode pass
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutcome {
    pub fields: FlatFieldMap,
    pub warnings: Vec<String>,
}

/// Table driven decoder for the reference-coded lines of a telegram
pub struct FieldDecoder {
    table: &'static DecodeTable,
}

impl Default for FieldDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldDecoder {
    pub fn new() -> Self {
        FieldDecoder { table: &DECODE_TABLE }
    }

    /// Profile of a telegram, derived from the presence of the Belgian marker
    pub fn detect_config(lines: &[ObisLine]) -> DecoderConfig {
        let profile = if lines.iter().any(|l| l.code == BELGIAN_MARKER) {
            ProtocolProfile::Belgian
        } else {
            ProtocolProfile::Standard
        };
        DecoderConfig::new(profile)
    }

    /// Decodes a telegram using the profile found in the telegram itself
    pub fn decode(&self, telegram: &ValidatedTelegram) -> DecodeOutcome {
        let lines = obis_utils::split_reference_lines(telegram.body());
        let config = Self::detect_config(&lines);
        self.decode_lines(&telegram.header, &lines, &config)
    }

    pub fn decode_with(&self, telegram: &ValidatedTelegram, config: &DecoderConfig) -> DecodeOutcome {
        let lines = obis_utils::split_reference_lines(telegram.body());
        self.decode_lines(&telegram.header, &lines, config)
    }

    fn decode_lines(&self, header: &str, lines: &[ObisLine], config: &DecoderConfig) -> DecodeOutcome {
        let mut fields = FlatFieldMap::new();
        let mut warnings = Vec::new();

        fields.insert("type", FieldValue::Text(header.to_string()));

        for line in lines {
            let Some(rules) = self.table.get(&line.code) else {
                let message = format!("ignoring unknown reference code {}: {}", line.code, line.raw);
                warn!("{}", message);
                warnings.push(message);
                continue;
            };

            for (position, rule) in rules.iter().enumerate() {
                let Some(field) = &rule.field else { continue };

                let result = match rule.conversion {
                    Conversion::AllTokens(f) => f(&line.tokens, config)
                        .map_err(|e| (line.tokens.join(")("), e)),
                    Conversion::Token(f) => match line.tokens.get(position) {
                        Some(token) => f(token, config).map_err(|e| (token.clone(), e)),
                        None => Err((String::new(), FieldError::MissingToken(position))),
                    },
                };

                match result {
                    Ok(value) => {
                        debug!("{} ({}) -> {}: {:?}", line.code,
                            obis_utils::get_obis_description(&line.code).unwrap_or("channel data"), field, value);
                        fields.insert(field, value);
                    }
                    Err((token, e)) => {
                        let message = format!("{}: ({}): {}", line.code, token, e);
                        warn!("{}", message);
                        warnings.push(message);
                    }
                }
            }
        }

        DecodeOutcome { fields, warnings }
    }
}
