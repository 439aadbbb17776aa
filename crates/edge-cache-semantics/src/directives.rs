//! `Cache-Control` directive parsing.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Value of a single `Cache-Control` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDirective", into = "RawDirective")]
pub enum Directive {
    /// Directive given without an argument, e.g. `no-store`.
    Flag,
    /// Directive given with an argument, e.g. `max-age=60`.
    Value(String),
}

/// Persisted shape: `true` for flags, the argument string otherwise.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawDirective {
    Flag(bool),
    Value(String),
}

impl From<RawDirective> for Directive {
    fn from(raw: RawDirective) -> Self {
        match raw {
            RawDirective::Flag(_) => Self::Flag,
            RawDirective::Value(value) => Self::Value(value),
        }
    }
}

impl From<Directive> for RawDirective {
    fn from(directive: Directive) -> Self {
        match directive {
            Directive::Flag => Self::Flag(true),
            Directive::Value(value) => Self::Value(value),
        }
    }
}

impl Directive {
    /// The argument, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Flag => None,
            Self::Value(value) => Some(value),
        }
    }

    /// Check if the directive was given without an argument.
    pub fn is_flag(&self) -> bool {
        matches!(self, Self::Flag)
    }

    /// Numeric reading of the argument in seconds.
    ///
    /// Takes the leading integer of the argument; anything without one,
    /// including a bare flag, reads as zero.
    pub fn seconds(&self) -> f64 {
        self.as_str().map(parse_leading_int).unwrap_or(0.0)
    }
}

/// Parse the leading decimal integer of `s`, or zero if there is none.
pub(crate) fn parse_leading_int(s: &str) -> f64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut value = 0.0_f64;
    let mut seen = false;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10.0 + f64::from(b - b'0');
        seen = true;
    }

    match (seen, negative) {
        (false, _) => 0.0,
        (true, true) => -value,
        (true, false) => value,
    }
}

/// Parsed `Cache-Control` header.
///
/// Directive names are lower-cased. A repeated directive keeps its last
/// occurrence. Unknown directives are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheControl {
    directives: IndexMap<String, Directive>,
}

impl CacheControl {
    /// Parse an optional header value.
    pub fn parse(header: Option<&str>) -> Self {
        let mut cc = Self::default();
        let Some(header) = header else {
            return cc;
        };

        for part in header.trim().split(',') {
            let (name, value) = match part.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (part, None),
            };
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }

            let directive = match value {
                Some(value) => {
                    let value = value.trim();
                    let value = value.strip_prefix('"').unwrap_or(value);
                    let value = value.strip_suffix('"').unwrap_or(value);
                    Directive::Value(value.to_string())
                }
                None => Directive::Flag,
            };
            cc.directives.insert(name, directive);
        }

        cc
    }

    /// Look up a directive.
    pub fn get(&self, name: &str) -> Option<&Directive> {
        self.directives.get(name)
    }

    /// Check if a directive is present.
    pub fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    /// Numeric value of a directive in seconds, if present.
    pub fn seconds(&self, name: &str) -> Option<f64> {
        self.get(name).map(Directive::seconds)
    }

    /// Numeric value of a directive in seconds, zero if absent.
    pub fn seconds_or_zero(&self, name: &str) -> f64 {
        self.seconds(name).unwrap_or(0.0)
    }

    /// Set a directive.
    pub fn insert(&mut self, name: impl Into<String>, directive: Directive) {
        self.directives.insert(name.into(), directive);
    }

    /// Remove a directive.
    pub fn remove(&mut self, name: &str) -> Option<Directive> {
        self.directives.shift_remove(name)
    }

    /// Iterate over directives in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Directive)> {
        self.directives.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of directives.
    pub fn len(&self) -> usize {
        self.directives.len()
    }

    /// Check if no directives were parsed.
    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, directive)) in self.directives.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match directive {
                Directive::Flag => f.write_str(name)?,
                Directive::Value(value) if value.contains(&[',', ' '][..]) => {
                    write!(f, "{name}=\"{value}\"")?
                }
                Directive::Value(value) => write!(f, "{name}={value}")?,
            }
        }
        Ok(())
    }
}
