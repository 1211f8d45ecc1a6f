use crc16::{State, ARC};
use lazy_static::lazy_static;
use log::debug;
use regex::bytes::Regex;

use super::utils::latin1;
use super::TelegramError;

/// Every telegram starts with this byte
pub const TELEGRAM_START: u8 = b'/';

lazy_static! {
    static ref HEADER: Regex = Regex::new(r"(?-u)^([^\r\n]+)\r?\n\r?\n").unwrap();
    static ref FOOTER: Regex = Regex::new(r"(?m-u)^!([0-9A-Fa-f]{4})?\r?$").unwrap();
}

/// A telegram with a well formed header and footer whose checksum, if any, matched
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTelegram {
    /// Wire content including the leading `/`, one character per byte
    pub raw: String,
    /// Identification text of the header line
    pub header: String,
    pub checksum: Option<u16>,
}

impl ValidatedTelegram {
    /// Telegram text after the leading `/`
    pub fn body(&self) -> &str {
        &self.raw[1..]
    }
}

/// CRC16/ARC (reflected polynomial 0xA001, initial value 0)
pub fn calculate_crc(data: &[u8]) -> u16 {
    State::<ARC>::calculate(data)
}

/// Checks header, footer and the optional checksum of a framed telegram.
/// The frame may or may not still carry its leading `/`. The checksum covers
/// the received bytes; text conversion happens only after it matched.
pub fn validate(frame: impl AsRef<[u8]>) -> Result<ValidatedTelegram, TelegramError> {
    let frame = frame.as_ref();
    let body = frame.strip_prefix(&[TELEGRAM_START]).unwrap_or(frame);

    let header = HEADER.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| latin1(m.as_bytes()))
        .ok_or(TelegramError::Malformed("missing header"))?;

    let footer = FOOTER.captures(body)
        .ok_or(TelegramError::Malformed("missing footer"))?;

    // The footer line starts with '!', which is the last byte covered by the CRC
    let bang = footer.get(0).map(|m| m.start()).unwrap_or(0);

    let checksum = match footer.get(1) {
        Some(digits) => {
            let expected = std::str::from_utf8(digits.as_bytes())
                .ok()
                .and_then(|d| u16::from_str_radix(d, 16).ok())
                .ok_or(TelegramError::Malformed("invalid checksum"))?;

            let mut state = State::<ARC>::new();
            state.update(&[TELEGRAM_START]);
            state.update(&body[..=bang]);
            let computed = state.get();

            if computed != expected {
                return Err(TelegramError::ChecksumMismatch { expected, computed });
            }
            Some(expected)
        }
        None => {
            debug!("Telegram without checksum, skipping CRC verification");
            None
        }
    };

    Ok(ValidatedTelegram {
        raw: format!("/{}", latin1(body)),
        header,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metering_p1::telegrams;

    #[test]
    fn test_crc_of_reference_telegram() {
        let end = telegrams::V50.find('!').unwrap();
        assert_eq!(calculate_crc(&telegrams::V50.as_bytes()[..=end]), 0x22EE);
    }

    #[test]
    fn test_crc_matches_hand_rolled_algorithm() {
        let data = b"/ISK5\\2M550T-1011\r\n\r\n!";
        let mut crc: u16 = 0;
        for byte in data {
            crc ^= *byte as u16;
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            }
        }
        assert_eq!(calculate_crc(data), crc);
    }

    #[test]
    fn test_validate_known_samples() {
        for (name, telegram) in telegrams::all() {
            let validated = validate(telegram);
            assert!(validated.is_ok(), "{} rejected: {:?}", name, validated);
        }
    }

    #[test]
    fn test_validate_without_leading_delimiter() {
        let validated = validate(&telegrams::V50[1..]).unwrap();
        assert_eq!(validated.header, "XMX5LGBBLA4415290514");
        assert_eq!(validated.checksum, Some(0x22EE));
        assert_eq!(validated.raw, telegrams::V50);
        assert!(validated.body().starts_with("XMX5"));
    }

    #[test]
    fn test_validate_legacy_without_checksum() {
        let validated = validate(telegrams::V22).unwrap();
        assert_eq!(validated.checksum, None);
        assert_eq!(validated.header, "XMX5XMXABCE000063181");
    }

    #[test]
    fn test_corrupted_checksum_is_rejected() {
        let corrupted = telegrams::V50.replace("!22EE", "!22EF");
        match validate(&corrupted) {
            Err(TelegramError::ChecksumMismatch { expected, computed }) => {
                assert_eq!(expected, 0x22EF);
                assert_eq!(computed, 0x22EE);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_corrupted_content_is_rejected() {
        let corrupted = telegrams::V50.replace("001362.372", "001362.373");
        assert!(matches!(validate(&corrupted), Err(TelegramError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_checksum_covers_received_bytes() {
        let mut frame = b"/AB\xB0C\r\n\r\n1-0:1.8.1(000001.000*kWh)\r\n!".to_vec();
        let crc = calculate_crc(&frame);
        frame.extend_from_slice(format!("{:04X}\r\n", crc).as_bytes());

        let validated = validate(&frame).unwrap();
        assert_eq!(validated.checksum, Some(crc));
        assert_eq!(validated.header, "AB\u{b0}C");
        assert!(validated.raw.starts_with("/AB\u{b0}C\r\n"));
    }

    #[test]
    fn test_missing_header_or_footer() {
        assert!(matches!(validate("/XMX5\r\n1-0:1.8.1(000001.000*kWh)\r\n!\r\n"), Err(TelegramError::Malformed(_))));
        assert!(matches!(validate("/XMX5\r\n\r\n1-0:1.8.1(000001.000*kWh)\r\n"), Err(TelegramError::Malformed(_))));
        assert!(matches!(validate(""), Err(TelegramError::Malformed(_))));
    }
}
