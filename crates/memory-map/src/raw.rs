//! Catalog records as they appear on disk.
//!
//! Everything here is optional and loosely typed; `map.rs` turns a record
//! into a validated `MemoryMap`.

use serde::Deserialize;

/// Integer written either as a JSON number or as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawInt {
    Num(i64),
    Text(String),
}

impl RawInt {
    /// Numeric value; `0x`-prefixed strings are hex. `None` if unparsable.
    pub(crate) fn value(&self) -> Option<i64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Text(text) => {
                let text = text.trim();
                if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    i64::from_str_radix(hex, 16).ok()
                } else {
                    text.parse().ok()
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawTitle {
    pub game_info: RawGameInfo,
    pub memory: Option<RawMemory>,
    pub ball_in_play: Option<RawBallInPlay>,
    pub in_play: Option<RawInPlay>,
    pub display_message: Option<RawDisplayMessage>,
    pub adjustments: Option<RawChecksummed>,
    pub high_scores: Option<RawHighScores>,
    pub switches: Option<RawBlock>,
    pub coin_drop: Option<RawBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawGameInfo {
    pub game_name: String,
    pub system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawMemory {
    pub start: Option<RawInt>,
    pub length: Option<RawInt>,
    pub nv_start: Option<RawInt>,
    pub nv_length: Option<RawInt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawBallInPlay {
    #[serde(rename = "Type")]
    pub kind: Option<RawInt>,
    pub address: Option<RawInt>,
    pub ball1: Option<RawInt>,
    pub ball2: Option<RawInt>,
    pub ball3: Option<RawInt>,
    pub ball4: Option<RawInt>,
    pub ball5: Option<RawInt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawInPlay {
    pub score_adr: Option<RawInt>,
    pub score_spacing: Option<RawInt>,
    pub score_bytes: Option<RawInt>,
    pub game_active_adr: Option<RawInt>,
    pub game_active_value: Option<RawInt>,
    pub player_up: Option<RawInt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawDisplayMessage {
    #[serde(rename = "Type")]
    pub kind: Option<RawInt>,
    pub address: Option<RawInt>,
    pub address_s1: Option<RawInt>,
    pub address_s2: Option<RawInt>,
    pub address_s3: Option<RawInt>,
    pub length: Option<RawInt>,
    #[serde(flatten)]
    pub checksum: RawChecksummed,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawChecksummed {
    pub checksum_start_adr: Option<RawInt>,
    pub checksum_end_adr: Option<RawInt>,
    pub checksum_result_adr: Option<RawInt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawHighScores {
    pub score_adr: Option<RawInt>,
    pub score_spacing: Option<RawInt>,
    pub score_bytes: Option<RawInt>,
    pub count: Option<RawInt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawBlock {
    pub address: Option<RawInt>,
    pub length: Option<RawInt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_accept_numbers_and_hex_strings() {
        let parsed: Vec<RawInt> = serde_json::from_str(r#"[56, "0x38", "56", " 0X1f ", "x"]"#).unwrap();
        let values: Vec<Option<i64>> = parsed.iter().map(RawInt::value).collect();
        assert_eq!(values, vec![Some(56), Some(56), Some(56), Some(31), None]);
    }

    #[test]
    fn pascal_case_keys() {
        let raw: RawTitle = serde_json::from_str(
            r#"{"GameInfo":{"GameName":"Pinbot","System":"11"},
                "BallInPlay":{"Type":1,"Address":"0x38","Ball1":"0xF1"},
                "DisplayMessage":{"Type":2,"AddressS1":"0x100","Length":16,"ChecksumResultAdr":"0x7FE"}}"#,
        )
        .unwrap();
        assert_eq!(raw.game_info.game_name, "Pinbot");
        let bip = raw.ball_in_play.unwrap();
        assert_eq!(bip.address.and_then(|a| a.value()), Some(0x38));
        assert_eq!(bip.ball1.and_then(|a| a.value()), Some(0xF1));
        let msg = raw.display_message.unwrap();
        assert_eq!(msg.address_s1.and_then(|a| a.value()), Some(0x100));
        assert_eq!(
            msg.checksum.checksum_result_adr.and_then(|a| a.value()),
            Some(0x7FE)
        );
    }
}
