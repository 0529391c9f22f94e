//! Title catalog loading.
//!
//! The catalog is a JSON Lines file: one title record per line, keyed by
//! `GameInfo.GameName`. Blank lines and `#` comments are skipped. A broken
//! line only matters if it is the title being asked for.
//!
//! Loading never fails outright. When the title can't be produced the
//! caller gets the built-in safe default together with the reason, and
//! keeps running in a degraded mode.

use std::path::{Path, PathBuf};

use pinball_core::{Family, UnknownFamily};

use crate::map::MemoryMap;
use crate::raw::RawTitle;

/// Why a title fell back to the safe default.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFault {
    #[error("catalog {path} unreadable")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("title {0:?} not in catalog")]
    TitleMissing(String),
    #[error("title {title:?} on line {line} is malformed: {source}")]
    Malformed {
        title: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("title {title:?}: {source}")]
    UnknownFamily {
        title: String,
        #[source]
        source: UnknownFamily,
    },
    #[error("title {title:?} is for {configured} hardware, board is {board}")]
    FamilyMismatch {
        title: String,
        configured: Family,
        board: Family,
    },
}

/// Result of loading a title.
#[derive(Debug)]
pub enum ConfigOutcome {
    /// The title loaded (possibly with some sections dropped).
    Loaded(MemoryMap),
    /// Safe default in use; the fault says why.
    Degraded(MemoryMap, ConfigFault),
}

impl ConfigOutcome {
    #[must_use]
    pub fn map(&self) -> &MemoryMap {
        match self {
            Self::Loaded(map) | Self::Degraded(map, _) => map,
        }
    }

    #[must_use]
    pub fn fault(&self) -> Option<&ConfigFault> {
        match self {
            Self::Loaded(_) => None,
            Self::Degraded(_, fault) => Some(fault),
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(..))
    }

    /// Split into the map and the fault, if any.
    #[must_use]
    pub fn into_parts(self) -> (MemoryMap, Option<ConfigFault>) {
        match self {
            Self::Loaded(map) => (map, None),
            Self::Degraded(map, fault) => (map, Some(fault)),
        }
    }
}

/// One catalog line, parsed only as far as its title.
struct Entry {
    title: String,
    line: usize,
    record: serde_json::Value,
}

/// Parsed catalog.
pub struct Catalog {
    entries: Vec<Entry>,
    /// Lines that weren't JSON objects with a `GameInfo.GameName`.
    skipped: usize,
}

impl Catalog {
    /// Parse catalog text. Lines that can't be keyed are counted and skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut skipped = 0;
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record: serde_json::Value = match serde_json::from_str(trimmed) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("catalog line {line_no}: not JSON ({e}), skipped");
                    skipped += 1;
                    continue;
                }
            };
            let Some(title) = record["GameInfo"]["GameName"].as_str() else {
                log::warn!("catalog line {line_no}: no GameInfo.GameName, skipped");
                skipped += 1;
                continue;
            };
            entries.push(Entry {
                title: title.trim().to_string(),
                line: line_no,
                record,
            });
        }
        Self { entries, skipped }
    }

    /// Titles in catalog order.
    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.title.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lines skipped while parsing.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Build the memory map for `title` on a `board` family with
    /// `shadow_len` bytes of shadow memory.
    ///
    /// If the title appears more than once the last record wins.
    #[must_use]
    pub fn resolve(&self, title: &str, board: Family, shadow_len: usize) -> ConfigOutcome {
        let degraded = |fault: ConfigFault| {
            log::warn!("using safe default memory map: {fault}");
            ConfigOutcome::Degraded(MemoryMap::safe_default(board, shadow_len), fault)
        };

        let title = title.trim();
        let Some(entry) = self.entries.iter().rev().find(|entry| entry.title == title) else {
            return degraded(ConfigFault::TitleMissing(title.to_string()));
        };

        let raw: RawTitle = match serde_json::from_value(entry.record.clone()) {
            Ok(raw) => raw,
            Err(source) => {
                return degraded(ConfigFault::Malformed {
                    title: title.to_string(),
                    line: entry.line,
                    source,
                });
            }
        };

        let configured = match raw.game_info.system.as_deref().map(str::parse::<Family>) {
            None => board,
            Some(Ok(family)) => family,
            Some(Err(source)) => {
                return degraded(ConfigFault::UnknownFamily {
                    title: title.to_string(),
                    source,
                });
            }
        };
        if configured != board {
            return degraded(ConfigFault::FamilyMismatch {
                title: title.to_string(),
                configured,
                board,
            });
        }

        let map = MemoryMap::from_raw(raw, board, shadow_len);
        log::info!("loaded memory map for {} ({board})", map.game_name);
        ConfigOutcome::Loaded(map)
    }
}

/// Read the catalog at `path` and resolve `title`.
///
/// An unreadable file degrades to the safe default like any other
/// configuration fault.
#[must_use]
pub fn load_title(path: &Path, title: &str, board: Family, shadow_len: usize) -> ConfigOutcome {
    match std::fs::read_to_string(path) {
        Ok(text) => Catalog::parse(&text).resolve(title, board, shadow_len),
        Err(source) => {
            let fault = ConfigFault::Unreadable {
                path: path.to_path_buf(),
                source,
            };
            log::warn!("using safe default memory map: {fault}");
            ConfigOutcome::Degraded(MemoryMap::safe_default(board, shadow_len), fault)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CATALOG: &str = r#"
# Williams System 11
{"GameInfo":{"GameName":"Pinbot","System":"11"},"BallInPlay":{"Type":1,"Address":56,"Ball1":"0xF1","Ball2":"0xF2","Ball3":"0xF3","Ball4":"0xF4","Ball5":"0xF5"},"InPlay":{"ScoreAdr":"0x200","ScoreBytes":4}}
this line is not json
{"GameInfo":{"GameName":"Broken","System":"11"},"InPlay":{"ScoreAdr":[1,2]}}
{"GameInfo":{"GameName":"Twilight Zone","System":"WPC"},"BallInPlay":{"Type":2,"Address":"0x1A00"}}
{"GameInfo":{"GameName":"Mystery","System":"Zaccaria"}}
"#;

    #[test]
    fn lists_titles_and_skips_noise() {
        let catalog = Catalog::parse(CATALOG);
        let titles: Vec<&str> = catalog.titles().collect();
        assert_eq!(titles, vec!["Pinbot", "Broken", "Twilight Zone", "Mystery"]);
        assert_eq!(catalog.skipped(), 1);
    }

    #[test]
    fn loads_named_title() {
        let outcome = Catalog::parse(CATALOG).resolve("Pinbot", Family::Sys11, 0x800);
        assert!(!outcome.is_degraded());
        let map = outcome.map();
        assert_eq!(map.game_name, "Pinbot");
        assert!(map.ball_in_play.is_some());
        assert!(map.in_play.is_some());
    }

    #[test]
    fn missing_title_degrades() {
        let outcome = Catalog::parse(CATALOG).resolve("Black Knight", Family::Sys11, 0x800);
        assert!(outcome.map().is_default());
        assert!(matches!(outcome.fault(), Some(ConfigFault::TitleMissing(_))));
    }

    #[test]
    fn malformed_title_degrades() {
        let outcome = Catalog::parse(CATALOG).resolve("Broken", Family::Sys11, 0x800);
        assert!(matches!(
            outcome.fault(),
            Some(ConfigFault::Malformed { line: 5, .. })
        ));
    }

    #[test]
    fn family_checks() {
        let catalog = Catalog::parse(CATALOG);
        let outcome = catalog.resolve("Twilight Zone", Family::Sys11, 0x800);
        assert!(matches!(
            outcome.fault(),
            Some(ConfigFault::FamilyMismatch { .. })
        ));
        assert_eq!(outcome.map().family, Family::Sys11);

        let outcome = catalog.resolve("Mystery", Family::Sys11, 0x800);
        assert!(matches!(outcome.fault(), Some(ConfigFault::UnknownFamily { .. })));

        let outcome = catalog.resolve("Twilight Zone", Family::Wpc, 0x2000);
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let outcome = load_title(file.path(), "Pinbot", Family::Sys11, 0x800);
        assert!(!outcome.is_degraded());
    }

    #[test]
    fn unreadable_catalog_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = load_title(&dir.path().join("missing.jsonl"), "Pinbot", Family::Sys11, 0x800);
        let (map, fault) = outcome.into_parts();
        assert!(map.is_default());
        assert!(matches!(fault, Some(ConfigFault::Unreadable { .. })));
    }
}
