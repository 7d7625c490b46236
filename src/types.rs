//! Shared types, error enum, and the `Record` payload for the `imb` crate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors produced by this crate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImbError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Decoding(DecodingReason),
}

pub type Result<T> = std::result::Result<T, ImbError>;

/// Sub-reasons for a [`ImbError::Decoding`] failure (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingReason {
    WrongLength { actual: usize },
    InvalidSymbol { position: usize, symbol: char },
    UpsideDown,
    InvalidBarcode,
    Ambiguous,
}

impl std::fmt::Display for DecodingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodingReason::WrongLength { actual } => {
                write!(f, "length \u{2260} 65 (got {actual})")
            }
            DecodingReason::InvalidSymbol { position, symbol } => {
                write!(f, "invalid symbol '{symbol}' at position {position}")
            }
            DecodingReason::UpsideDown => write!(f, "upside down"),
            DecodingReason::InvalidBarcode => write!(f, "invalid barcode"),
            DecodingReason::Ambiguous => write!(f, "invalid barcode (ambiguous repair)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// One of the four IMB bar types (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Track,
    Ascender,
    Descender,
    Full,
}

impl Symbol {
    pub fn from_halves(descender: bool, ascender: bool) -> Symbol {
        match (descender, ascender) {
            (false, false) => Symbol::Track,
            (false, true) => Symbol::Ascender,
            (true, false) => Symbol::Descender,
            (true, true) => Symbol::Full,
        }
    }

    pub fn has_descender(self) -> bool {
        matches!(self, Symbol::Descender | Symbol::Full)
    }

    pub fn has_ascender(self) -> bool {
        matches!(self, Symbol::Ascender | Symbol::Full)
    }
}

impl TryFrom<char> for Symbol {
    type Error = ();

    fn try_from(c: char) -> std::result::Result<Symbol, ()> {
        match c {
            'T' => Ok(Symbol::Track),
            'A' => Ok(Symbol::Ascender),
            'D' => Ok(Symbol::Descender),
            'F' => Ok(Symbol::Full),
            _ => Err(()),
        }
    }
}

impl From<Symbol> for char {
    fn from(s: Symbol) -> char {
        match s {
            Symbol::Track => 'T',
            Symbol::Ascender => 'A',
            Symbol::Descender => 'D',
            Symbol::Full => 'F',
        }
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The decoded/encodable postal payload (§3.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub barcode_id: String,
    pub service_type: String,
    pub mailer_id: String,
    pub serial_num: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plus4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_pt: Option<String>,
}

impl Record {
    /// Strip ASCII whitespace and upcase every field, per §6's normalization
    /// contract. A null/absent optional field is left absent (never turned
    /// into `Some(String::new())`), and an optional field that normalizes to
    /// the empty string is treated as absent.
    pub fn normalized(&self) -> Record {
        let norm = |s: &str| -> String { s.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_uppercase() };
        let norm_opt = |o: &Option<String>| -> Option<String> {
            o.as_deref().map(norm).filter(|s| !s.is_empty())
        };

        Record {
            barcode_id: norm(&self.barcode_id),
            service_type: norm(&self.service_type),
            mailer_id: norm(&self.mailer_id),
            serial_num: norm(&self.serial_num),
            zip: norm_opt(&self.zip),
            plus4: norm_opt(&self.plus4),
            delivery_pt: norm_opt(&self.delivery_pt),
        }
    }
}

// ---------------------------------------------------------------------------
// DecodeResult
// ---------------------------------------------------------------------------

/// Whether a decoded barcode matched its input symbol-for-symbol, or needed
/// single-codeword repair (§3.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RepairStatus {
    Clean,
    Damaged {
        message: String,
        suggested: String,
        positions: Vec<usize>,
    },
}

impl RepairStatus {
    pub fn damaged(suggested: String, positions: Vec<usize>) -> RepairStatus {
        RepairStatus::Damaged {
            message: "Damaged barcode".to_string(),
            suggested,
            positions,
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, RepairStatus::Clean)
    }
}

/// Result of a successful decode: the recovered record plus whether repair
/// was needed to recover it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeResult {
    pub data: Record,
    pub repair_status: RepairStatus,
}

// ---------------------------------------------------------------------------
// Decimal-digit helpers
// ---------------------------------------------------------------------------

/// Parse a string of exactly `len` ASCII decimal digits into its value.
pub(crate) fn digits_to_u64(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_whitespace_and_upcases() {
        let r = Record {
            barcode_id: " 0 0".into(),
            service_type: "270".into(),
            mailer_id: "103502".into(),
            serial_num: "017955971".into(),
            zip: Some(" 50310 ".into()),
            plus4: None,
            delivery_pt: Some("".into()),
        };
        let n = r.normalized();
        assert_eq!(n.barcode_id, "00");
        assert_eq!(n.zip, Some("50310".into()));
        assert_eq!(n.delivery_pt, None);
    }

    #[test]
    fn symbol_char_roundtrip() {
        for c in ['T', 'A', 'D', 'F'] {
            let s = Symbol::try_from(c).unwrap();
            let back: char = s.into();
            assert_eq!(back, c);
        }
        assert!(Symbol::try_from('X').is_err());
    }

    #[test]
    fn symbol_halves() {
        assert_eq!(Symbol::from_halves(false, false), Symbol::Track);
        assert_eq!(Symbol::from_halves(true, false), Symbol::Descender);
        assert_eq!(Symbol::from_halves(false, true), Symbol::Ascender);
        assert_eq!(Symbol::from_halves(true, true), Symbol::Full);
    }

    #[test]
    fn digits_to_u64_rejects_non_digits() {
        assert_eq!(digits_to_u64("12a"), None);
        assert_eq!(digits_to_u64(""), None);
        assert_eq!(digits_to_u64("007"), Some(7));
    }

}
