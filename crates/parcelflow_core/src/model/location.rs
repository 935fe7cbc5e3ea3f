//! Storage location parsing and formatting.
//!
//! # Invariants
//! - Location parts are positional: zone, isle, shelf, bin.
//! - Blank parts are stored as `None`, never as empty strings.
//! - A location with no parts displays as `Unassigned`.
//! - The display form parses back to the same location: unset parts before
//!   the last set one keep an empty slot (`A--2`).

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Display value for a package without any location part.
pub const UNASSIGNED_LOCATION: &str = "Unassigned";

static LOCATION_DELIMITER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[-/,>]\s*").expect("valid location delimiter regex"));

/// Physical slot inside a warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub zone: Option<String>,
    pub isle: Option<String>,
    pub shelf: Option<String>,
    pub bin: Option<String>,
}

/// Location string could not be split into at most four parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationParseError {
    pub input: String,
    pub parts: usize,
}

impl Display for LocationParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "location `{}` has {} parts; expected at most zone-isle-shelf-bin",
            self.input, self.parts
        )
    }
}

impl Error for LocationParseError {}

impl Location {
    /// Parses a delimited location string (`A-01-3-B`, `A/01/3`, `A, 01`).
    ///
    /// Missing trailing parts stay unset. A blank input yields an empty
    /// location.
    pub fn parse(input: &str) -> Result<Self, LocationParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }

        let parts: Vec<Option<String>> = LOCATION_DELIMITER_RE
            .split(trimmed)
            .map(|part| {
                let part = part.trim();
                (!part.is_empty()).then(|| part.to_string())
            })
            .collect();

        if parts.len() > 4 {
            return Err(LocationParseError {
                input: trimmed.to_string(),
                parts: parts.len(),
            });
        }

        let mut parts = parts.into_iter();
        Ok(Self {
            zone: parts.next().flatten(),
            isle: parts.next().flatten(),
            shelf: parts.next().flatten(),
            bin: parts.next().flatten(),
        })
    }

    /// Returns whether every part is unset.
    pub fn is_empty(&self) -> bool {
        self.parts().all(|part| part.is_none())
    }

    fn parts(&self) -> impl Iterator<Item = Option<&str>> {
        [
            self.zone.as_deref(),
            self.isle.as_deref(),
            self.shelf.as_deref(),
            self.bin.as_deref(),
        ]
        .into_iter()
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self
            .parts()
            .map(|part| part.map(str::trim).unwrap_or(""))
            .collect();
        match parts.iter().rposition(|part| !part.is_empty()) {
            Some(last) => f.write_str(&parts[..=last].join("-")),
            None => f.write_str(UNASSIGNED_LOCATION),
        }
    }
}
