//! Small helpers shared across the crate.

use std::fmt::Debug;

/// Debug wrapper that hides credential material.
///
/// Values shorter than 12 characters are masked entirely; longer ones keep
/// the first and last three characters, enough to tell two access keys
/// apart in a log line without disclosing either.
///
/// [`Config`](crate::Config) routes its credential fields through this in
/// its `Debug` impl.
pub struct Redact<'a>(&'a str);

impl<'a> From<&'a String> for Redact<'a> {
    fn from(value: &'a String) -> Self {
        Redact(value.as_str())
    }
}

impl<'a> From<&'a Option<String>> for Redact<'a> {
    fn from(value: &'a Option<String>) -> Self {
        match value {
            None => Redact(""),
            Some(v) => Redact(v),
        }
    }
}

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.len() {
            0 => f.write_str("EMPTY"),
            n if n < 12 => f.write_str("***"),
            n => write!(f, "{}***{}", &self.0[..3], &self.0[n - 3..]),
        }
    }
}
