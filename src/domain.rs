use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

pub const ZINC_PREFIX: &str = "ZINC";
pub const ZINC_DIGITS: usize = 12;

static ZINC_CANDIDATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ZINC([0-9]{1,12})$").expect("static ZINC pattern"));

const LOGP_LETTERS: &[(&str, char)] = &[
    ("-1", 'A'),
    ("0", 'B'),
    ("1", 'C'),
    ("2", 'D'),
    ("2.5", 'E'),
    ("3", 'F'),
    ("3.5", 'G'),
    ("4", 'H'),
    ("4.5", 'I'),
    ("5", 'J'),
    (">5", 'K'),
];

const MW_LETTERS: &[(&str, char)] = &[
    ("200", 'A'),
    ("250", 'B'),
    ("300", 'C'),
    ("325", 'D'),
    ("350", 'E'),
    ("375", 'F'),
    ("400", 'G'),
    ("425", 'H'),
    ("450", 'I'),
    ("500", 'J'),
    (">500", 'K'),
];

/// Canonical ZINC substance identifier: `ZINC` followed by exactly 12 digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ZincId(String);

impl ZincId {
    /// Canonicalizes scraped text such as `ZINC1234 some-name` into
    /// `ZINC000000001234`. Returns `None` for anything that is not a ZINC id.
    pub fn normalize(raw: &str) -> Option<Self> {
        let candidate = raw.split_whitespace().next()?;
        if !candidate.starts_with(ZINC_PREFIX) {
            return None;
        }
        let digits = ZINC_CANDIDATE.captures(candidate)?.get(1)?.as_str();
        Some(Self(format!("{ZINC_PREFIX}{digits:0>width$}", width = ZINC_DIGITS)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the digit suffix, leading zeros ignored.
    pub fn number(&self) -> u64 {
        self.0[ZINC_PREFIX.len()..].parse().unwrap_or(0)
    }
}

impl fmt::Display for ZincId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ZincId {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::normalize(value).ok_or_else(|| HarvestError::InvalidZincId(value.to_string()))
    }
}

/// Sorts ascending by numeric suffix. Stable, so equal ids keep scrape order.
pub fn sort_numeric(ids: &mut [ZincId]) {
    ids.sort_by_key(ZincId::number);
}

/// Catalog partition requested by the operator, as raw class codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterBucket {
    pub mw: String,
    pub logp: String,
}

impl FilterBucket {
    pub fn new(mw: impl Into<String>, logp: impl Into<String>) -> Self {
        let mw: String = mw.into();
        let logp: String = logp.into();
        Self {
            mw: mw.trim().to_string(),
            logp: logp.trim().to_string(),
        }
    }

    /// Maps both codes through the lookup tables. `None` means at least one
    /// code is unknown and the bucket cannot be scraped.
    pub fn resolve(&self) -> Option<SubsetCode> {
        let mw = lookup(MW_LETTERS, &self.mw)?;
        let logp = lookup(LOGP_LETTERS, &self.logp)?;
        Some(SubsetCode { mw, logp })
    }
}

impl fmt::Display for FilterBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mw={} logp={}", self.mw, self.logp)
    }
}

impl FromStr for FilterBucket {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (mw, logp) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| HarvestError::InvalidBucket(value.to_string()))?;
        if mw.trim().is_empty() || logp.trim().is_empty() {
            return Err(HarvestError::InvalidBucket(value.to_string()));
        }
        Ok(Self::new(mw, logp))
    }
}

fn lookup(table: &[(&str, char)], code: &str) -> Option<char> {
    table
        .iter()
        .find(|(key, _)| *key == code)
        .map(|(_, letter)| *letter)
}

/// Two-letter catalog subset name, molecular-weight letter first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsetCode {
    mw: char,
    logp: char,
}

impl fmt::Display for SubsetCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.mw, self.logp)
    }
}

impl Serialize for SubsetCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ZincVersion {
    #[serde(rename = "15")]
    #[value(name = "15")]
    Zinc15,
    #[serde(rename = "20")]
    #[value(name = "20")]
    Zinc20,
}

impl fmt::Display for ZincVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZincVersion::Zinc15 => write!(f, "15"),
            ZincVersion::Zinc20 => write!(f, "20"),
        }
    }
}

impl FromStr for ZincVersion {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "15" => Ok(ZincVersion::Zinc15),
            "20" => Ok(ZincVersion::Zinc20),
            _ => Err(HarvestError::InvalidZincVersion(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LigandFormat {
    Sdf,
    Smi,
}

impl LigandFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            LigandFormat::Sdf => "sdf",
            LigandFormat::Smi => "smi",
        }
    }
}

impl fmt::Display for LigandFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn normalize_pads_short_suffix() {
        let id = ZincId::normalize("  ZINC1234567 aspirin-like ").unwrap();
        assert_eq!(id.as_str(), "ZINC000001234567");
        assert_eq!(id.number(), 1_234_567);
    }

    #[test]
    fn normalize_keeps_full_width() {
        let id = ZincId::normalize("ZINC000000000042").unwrap();
        assert_eq!(id.as_str(), "ZINC000000000042");
    }

    #[test]
    fn normalize_rejects_foreign_tokens() {
        assert!(ZincId::normalize("CHEMBL25").is_none());
        assert!(ZincId::normalize("zinc123").is_none());
        assert!(ZincId::normalize("ZINC").is_none());
        assert!(ZincId::normalize("ZINC12ab").is_none());
        assert!(ZincId::normalize("ZINC1234567890123").is_none());
        assert!(ZincId::normalize("").is_none());
    }

    #[test]
    fn parse_invalid_id_is_typed_error() {
        let err = "PUBCHEM1".parse::<ZincId>().unwrap_err();
        assert_matches!(err, HarvestError::InvalidZincId(_));
    }

    #[test]
    fn sort_is_numeric() {
        let mut ids = vec![
            ZincId::normalize("ZINC900").unwrap(),
            ZincId::normalize("ZINC1000").unwrap(),
            ZincId::normalize("ZINC85").unwrap(),
        ];
        sort_numeric(&mut ids);
        let numbers = ids.iter().map(ZincId::number).collect::<Vec<_>>();
        assert_eq!(numbers, vec![85, 900, 1000]);
    }

    #[test]
    fn bucket_resolves_through_tables() {
        let bucket = FilterBucket::new("350", "3");
        let subset = bucket.resolve().unwrap();
        assert_eq!(subset.to_string(), "EF");

        let edge = FilterBucket::new(">500", ">5").resolve().unwrap();
        assert_eq!(edge.to_string(), "KK");
    }

    #[test]
    fn bucket_with_unknown_code_is_unresolved() {
        assert!(FilterBucket::new("360", "3").resolve().is_none());
        assert!(FilterBucket::new("350", "9").resolve().is_none());
    }

    #[test]
    fn parse_bucket_specifier() {
        let bucket: FilterBucket = "250:-1".parse().unwrap();
        assert_eq!(bucket, FilterBucket::new("250", "-1"));
        assert_matches!(
            "250".parse::<FilterBucket>(),
            Err(HarvestError::InvalidBucket(_))
        );
    }

    #[test]
    fn parse_zinc_version() {
        assert_eq!("20".parse::<ZincVersion>().unwrap(), ZincVersion::Zinc20);
        assert_matches!(
            "12".parse::<ZincVersion>(),
            Err(HarvestError::InvalidZincVersion(_))
        );
    }
}
