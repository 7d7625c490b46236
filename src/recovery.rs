//! Repair phase for inputs that fail the strict decode (§4.7): length
//! repair for off-by-one inputs, bit-flip repair for a single corrupted
//! symbol, and orientation detection for an upside-down scan.

use crate::bitlayout::{ASC_BIT, ASC_CHAR, DESC_BIT, DESC_CHAR, POSITIONS};
use crate::decode::{decode_words, parse_words};
use crate::tables::tables;
use crate::types::{DecodeResult, DecodingReason, ImbError, RepairStatus, Result, Symbol};

const MAX_INVALID_CODEWORDS: usize = 5;
const MAX_CARTESIAN_COMBINATIONS: u64 = 1000;

fn chars_to_symbols(chars: &[char]) -> Option<Vec<Symbol>> {
    chars.iter().map(|&c| Symbol::try_from(c).ok()).collect()
}

fn count_invalid_codewords(symbols: &[Symbol; POSITIONS]) -> usize {
    let t = tables();
    parse_words(symbols)
        .iter()
        .filter(|&&w| t.decode_table[w as usize].is_none())
        .count()
}

fn symbols_from_words(word: &[u16; 10]) -> [Symbol; POSITIONS] {
    let mut symbols = [Symbol::Track; POSITIONS];
    for p in 0..POSITIONS {
        let desc = (word[DESC_CHAR[p] as usize] >> DESC_BIT[p]) & 1 == 1;
        let asc = (word[ASC_CHAR[p] as usize] >> ASC_BIT[p]) & 1 == 1;
        symbols[p] = Symbol::from_halves(desc, asc);
    }
    symbols
}

/// Try every single-symbol insertion (length 64) or deletion (length 66),
/// keeping the candidate with fewest invalid codewords.
fn length_repair(chars: &[char]) -> Option<[Symbol; POSITIONS]> {
    let len = chars.len();
    if len != 64 && len != 66 {
        return None;
    }
    let syms = chars_to_symbols(chars)?;

    let mut best: Option<([Symbol; POSITIONS], usize)> = None;
    let mut consider = |candidate: Vec<Symbol>| {
        let arr: [Symbol; POSITIONS] = candidate.try_into().unwrap();
        let invalid = count_invalid_codewords(&arr);
        let better = match &best {
            Some((_, b)) => invalid < *b,
            None => true,
        };
        if better {
            best = Some((arr, invalid));
        }
    };

    if len == 64 {
        for ins in 0..=64 {
            let mut candidate = Vec::with_capacity(65);
            candidate.extend_from_slice(&syms[..ins]);
            candidate.push(Symbol::Track);
            candidate.extend_from_slice(&syms[ins..]);
            consider(candidate);
        }
    } else {
        for del in 0..66 {
            let mut candidate = Vec::with_capacity(65);
            candidate.extend_from_slice(&syms[..del]);
            candidate.extend_from_slice(&syms[del + 1..]);
            consider(candidate);
        }
    }

    best.filter(|(_, invalid)| *invalid < MAX_INVALID_CODEWORDS).map(|(arr, _)| arr)
}

/// The plausible 13-bit words for one codeword position: itself if already
/// valid, otherwise every single-bit-flip neighbor that decodes.
fn plausible_words(word: u16) -> Vec<u16> {
    let t = tables();
    if t.decode_table[word as usize].is_some() {
        return vec![word];
    }
    (0..13)
        .map(|bit| word ^ (1 << bit))
        .filter(|&w| t.decode_table[w as usize].is_some())
        .collect()
}

/// Search the bounded Cartesian product of plausible per-codeword words for
/// decodable combinations (§4.7). `Ok(None)` means the search was aborted or
/// found no match; `Err` means it found two or more (ambiguous).
fn bit_flip_repair(symbols: &[Symbol; POSITIONS]) -> Result<Option<DecodeResult>> {
    let word = parse_words(symbols);

    let mut options: Vec<Vec<u16>> = Vec::with_capacity(10);
    let mut total: u64 = 1;
    for &w in &word {
        let plausible = plausible_words(w);
        if plausible.is_empty() {
            return Ok(None);
        }
        total = total.saturating_mul(plausible.len() as u64);
        if total > MAX_CARTESIAN_COMBINATIONS {
            return Ok(None);
        }
        options.push(plausible);
    }

    let mut successes: Vec<[u16; 10]> = Vec::new();
    for combo in 0..total as usize {
        let mut rem = combo;
        let mut candidate_word = [0u16; 10];
        for i in (0..10).rev() {
            let base = options[i].len();
            candidate_word[i] = options[i][rem % base];
            rem /= base;
        }
        if decode_words(candidate_word).is_ok() {
            successes.push(candidate_word);
            if successes.len() > 1 {
                return Err(ImbError::Decoding(DecodingReason::Ambiguous));
            }
        }
    }

    match successes.into_iter().next() {
        None => Ok(None),
        Some(word) => {
            let data = decode_words(word).expect("already confirmed decodable above");
            let suggested_symbols = symbols_from_words(&word);
            let suggested: String = suggested_symbols.iter().map(|&s| char::from(s)).collect();
            let positions: Vec<usize> = symbols
                .iter()
                .zip(suggested_symbols.iter())
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(|(i, _)| i)
                .collect();
            Ok(Some(DecodeResult {
                data,
                repair_status: RepairStatus::damaged(suggested, positions),
            }))
        }
    }
}

fn swap_ascender_descender(symbols: &[Symbol; POSITIONS]) -> [Symbol; POSITIONS] {
    let mut out = *symbols;
    for s in out.iter_mut() {
        *s = match *s {
            Symbol::Ascender => Symbol::Descender,
            Symbol::Descender => Symbol::Ascender,
            other => other,
        };
    }
    out
}

fn orientation_flip_decodes(symbols: &[Symbol; POSITIONS]) -> bool {
    let swapped = swap_ascender_descender(symbols);
    decode_words(parse_words(&swapped)).is_ok()
}

/// Attempt length repair, then bit-flip repair, then orientation detection,
/// in that order (§4.7).
pub(crate) fn recover(normalized: &str, symbols: Option<[Symbol; POSITIONS]>) -> Result<DecodeResult> {
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();

    let candidate = match symbols {
        Some(s) => Some(s),
        None => length_repair(&chars),
    };

    if let Some(syms) = candidate {
        if let Some(result) = bit_flip_repair(&syms)? {
            return Ok(result);
        }
        if orientation_flip_decodes(&syms) {
            return Err(ImbError::Decoding(DecodingReason::UpsideDown));
        }
    }

    let reason = if len == POSITIONS {
        DecodingReason::InvalidBarcode
    } else {
        DecodingReason::WrongLength { actual: len }
    };
    Err(ImbError::Decoding(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::types::Record;

    fn sample() -> Record {
        Record {
            barcode_id: "00".into(),
            service_type: "270".into(),
            mailer_id: "103502".into(),
            serial_num: "017955971".into(),
            zip: Some("50310".into()),
            plus4: Some("1605".into()),
            delivery_pt: Some("15".into()),
        }
    }

    fn flip_symbol(barcode: &str, position: usize) -> String {
        let mut chars: Vec<char> = barcode.chars().collect();
        chars[position] = match chars[position] {
            'T' => 'A',
            'A' => 'T',
            'D' => 'F',
            'F' => 'D',
            _ => unreachable!(),
        };
        chars.into_iter().collect()
    }

    #[test]
    fn repairs_single_flipped_symbol() {
        let barcode = encode(&sample()).unwrap();
        let damaged = flip_symbol(&barcode, 30);
        let result = crate::decode::decode(&damaged).unwrap();
        match result.repair_status {
            RepairStatus::Damaged { positions, .. } => assert!(positions.contains(&30)),
            RepairStatus::Clean => panic!("expected a repaired decode"),
        }
        assert_eq!(result.data, sample());
    }

    #[test]
    fn detects_upside_down_barcode() {
        let barcode = encode(&sample()).unwrap();
        let flipped: String = barcode
            .chars()
            .map(|c| match c {
                'A' => 'D',
                'D' => 'A',
                other => other,
            })
            .collect();
        let err = crate::decode::decode(&flipped).unwrap_err();
        assert!(matches!(
            err,
            ImbError::Decoding(DecodingReason::UpsideDown)
        ));
    }

    #[test]
    fn repairs_a_single_deleted_symbol() {
        let barcode = encode(&sample()).unwrap();
        let mut shortened = barcode.clone();
        shortened.remove(10);
        let result = crate::decode::decode(&shortened).unwrap();
        assert_eq!(result.data, sample());
    }

    #[test]
    fn repairs_a_single_inserted_symbol() {
        let barcode = encode(&sample()).unwrap();
        let mut lengthened = barcode.clone();
        lengthened.insert(10, 'T');
        let result = crate::decode::decode(&lengthened).unwrap();
        assert_eq!(result.data, sample());
    }
}
