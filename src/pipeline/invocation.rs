//! Trigger payload: `begin-end[-local]`.

use std::str::FromStr;
use thiserror::Error;

const LOCAL_FLAG: &str = "local";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Empty payload")]
    Empty,

    #[error("Invalid begin index {0:?}")]
    BadBegin(String),

    #[error("Invalid end index {0:?}")]
    BadEnd(String),

    #[error("Unknown flag {0:?} (expected \"local\")")]
    BadFlag(String),

    #[error("Too many fields in payload {0:?}")]
    TooManyFields(String),
}

/// Which slice of the channel list to sync, and where credentials come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub begin: usize,
    /// `None` runs through the end of the list.
    pub end: Option<usize>,
    pub local: bool,
}

impl FromStr for Invocation {
    type Err = PayloadError;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(PayloadError::Empty);
        }

        let parts: Vec<&str> = payload.split('-').collect();
        if parts.len() > 3 {
            return Err(PayloadError::TooManyFields(payload.to_string()));
        }

        let begin = parts[0]
            .trim()
            .parse()
            .map_err(|_| PayloadError::BadBegin(parts[0].to_string()))?;

        let end = match parts.get(1).map(|s| s.trim()) {
            None | Some("") => None,
            Some(s) => Some(s.parse().map_err(|_| PayloadError::BadEnd(s.to_string()))?),
        };

        let local = match parts.get(2).map(|s| s.trim()) {
            None | Some("") => false,
            Some(LOCAL_FLAG) => true,
            Some(other) => return Err(PayloadError::BadFlag(other.to_string())),
        };

        Ok(Self { begin, end, local })
    }
}

impl Invocation {
    /// `items[begin..end]`, clamped to the list like a Python slice.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let end = self.end.unwrap_or(items.len()).min(items.len());
        let begin = self.begin.min(end);
        &items[begin..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn full_payload() {
        let inv: Invocation = assert_ok!("0-10-local".parse());
        assert_eq!(inv, Invocation { begin: 0, end: Some(10), local: true });
    }

    #[test]
    fn open_ended_payloads() {
        assert_eq!(
            "5-".parse::<Invocation>().unwrap(),
            Invocation { begin: 5, end: None, local: false }
        );
        assert_eq!(
            "5".parse::<Invocation>().unwrap(),
            Invocation { begin: 5, end: None, local: false }
        );
        assert_eq!(
            "3--local".parse::<Invocation>().unwrap(),
            Invocation { begin: 3, end: None, local: true }
        );
    }

    #[test]
    fn malformed_payloads() {
        assert_eq!("".parse::<Invocation>(), Err(PayloadError::Empty));
        assert_eq!("x-3".parse::<Invocation>(), Err(PayloadError::BadBegin("x".into())));
        assert_eq!("1-y".parse::<Invocation>(), Err(PayloadError::BadEnd("y".into())));
        assert_eq!("1-2-cloud".parse::<Invocation>(), Err(PayloadError::BadFlag("cloud".into())));
        assert_err!("1-2-local-x".parse::<Invocation>());
    }

    #[test]
    fn slicing_clamps() {
        let items = ["a", "b", "c", "d"];
        let inv = |begin, end| Invocation { begin, end, local: false };
        assert_eq!(inv(1, Some(3)).slice(&items), &["b", "c"]);
        assert_eq!(inv(2, None).slice(&items), &["c", "d"]);
        assert_eq!(inv(0, Some(99)).slice(&items), &items[..]);
        assert!(inv(9, None).slice(&items).is_empty());
        assert!(inv(3, Some(1)).slice(&items).is_empty());
    }
}
