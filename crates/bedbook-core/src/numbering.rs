//! # Document Numbering
//!
//! Human-readable, day-scoped numbers for bookings and invoices.
//!
//! ## Format
//! ```text
//! BK-20260302-0007
//! │  │        │
//! │  │        └── Sequence within the day (1-based, zero-padded to 4)
//! │  └─────────── Business-local date
//! └────────────── Prefix: BK (booking) or INV (invoice)
//! ```
//!
//! The sequence itself comes from an atomic per-day counter in the database
//! (`bedbook-db`'s `SequenceRepository`). This module only formats and parses.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreResult, ValidationError};

/// Which document family a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Booking,
    Invoice,
}

impl DocumentKind {
    /// Prefix printed at the start of the number.
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Booking => "BK",
            DocumentKind::Invoice => "INV",
        }
    }

    /// Counter scope key used by the sequence table.
    pub fn scope(&self) -> &'static str {
        match self {
            DocumentKind::Booking => "booking",
            DocumentKind::Invoice => "invoice",
        }
    }
}

/// Formats a document number.
///
/// ## Example
/// ```rust
/// use bedbook_core::numbering::{format_number, DocumentKind};
/// use chrono::NaiveDate;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
/// assert_eq!(format_number(DocumentKind::Booking, day, 7), "BK-20260302-0007");
/// ```
pub fn format_number(kind: DocumentKind, day: NaiveDate, seq: i64) -> String {
    format!("{}-{}-{:04}", kind.prefix(), day.format("%Y%m%d"), seq)
}

/// Parses a document number back into its parts.
pub fn parse_number(number: &str) -> CoreResult<(DocumentKind, NaiveDate, i64)> {
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "document number".to_string(),
        reason: reason.to_string(),
    };

    let mut parts = number.trim().splitn(3, '-');
    let kind = match parts.next() {
        Some("BK") => DocumentKind::Booking,
        Some("INV") => DocumentKind::Invoice,
        _ => return Err(invalid("unknown prefix").into()),
    };
    let day = parts
        .next()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        .ok_or_else(|| invalid("bad date"))?;
    let seq = parts
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|s| *s > 0)
        .ok_or_else(|| invalid("bad sequence"))?;

    Ok((kind, day, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let day = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        let number = format_number(DocumentKind::Invoice, day, 42);
        assert_eq!(number, "INV-20261231-0042");

        let (kind, parsed_day, seq) = parse_number(&number).unwrap();
        assert_eq!(kind, DocumentKind::Invoice);
        assert_eq!(parsed_day, day);
        assert_eq!(seq, 42);
    }

    #[test]
    fn test_sequence_beyond_padding_still_formats() {
        let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(
            format_number(DocumentKind::Booking, day, 12345),
            "BK-20260105-12345"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_number("XX-20260101-0001").is_err());
        assert!(parse_number("BK-2026-0001").is_err());
        assert!(parse_number("BK-20260101-0000").is_err());
        assert!(parse_number("BK-20260101").is_err());
    }
}
