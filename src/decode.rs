//! Parse a 65-symbol string into a [`Record`] (§4.6), and the shared
//! parse/reconstruct primitives [`recovery`](crate::recovery) builds its
//! repair passes on top of.

use crate::bignum::BigNum;
use crate::bitlayout::{ASC_BIT, ASC_CHAR, DESC_BIT, DESC_CHAR, POSITIONS};
use crate::fcs::calculate_fcs;
use crate::recovery;
use crate::tables::tables;
use crate::types::{DecodeResult, DecodingReason, ImbError, Record, RepairStatus, Result, Symbol};

/// Pack 65 symbols into the ten 13-bit codeword words they contribute bits to.
pub(crate) fn parse_words(symbols: &[Symbol; POSITIONS]) -> [u16; 10] {
    let mut word = [0u16; 10];
    for (p, &s) in symbols.iter().enumerate() {
        if s.has_descender() {
            word[DESC_CHAR[p] as usize] |= 1 << DESC_BIT[p];
        }
        if s.has_ascender() {
            word[ASC_CHAR[p] as usize] |= 1 << ASC_BIT[p];
        }
    }
    word
}

/// Write `count` decimal digits of `value` (least-significant first) into
/// `route[pos - count .. pos]`, most-significant digit at the lowest index.
/// Returns `pos - count`.
fn peel_decimal(route: &mut [u32; 11], mut pos: usize, mut value: u64, count: usize) -> usize {
    for _ in 0..count {
        pos -= 1;
        route[pos] = (value % 10) as u32;
        value /= 10;
    }
    pos
}

/// Reconstruct a [`Record`] from the ten 13-bit codeword words (§4.6 steps 2-12).
pub(crate) fn decode_words(word: [u16; 10]) -> std::result::Result<Record, DecodingReason> {
    let t = tables();

    let mut cw = [0u32; 10];
    for (i, &w) in word.iter().enumerate() {
        match t.decode_table[w as usize] {
            Some(idx) => cw[i] = idx as u32,
            None => return Err(DecodingReason::InvalidBarcode),
        }
    }

    let mut fcs: u16 = 0;
    for (i, &w) in word.iter().enumerate() {
        fcs |= (t.fcs_table[w as usize] as u16) << i;
    }

    if cw[0] > 1317 || cw[9] > 1270 {
        return Err(DecodingReason::InvalidBarcode);
    }
    if cw[9] & 1 != 0 {
        return Err(DecodingReason::UpsideDown);
    }
    cw[9] >>= 1;
    if cw[0] >= 659 {
        cw[0] -= 659;
        fcs |= 1 << 10;
    }

    let mut n = BigNum::zero();
    n.set_limb(8, (cw[0] >> 11) as u16);
    n.set_limb(9, (cw[0] & 0x7FF) as u16);
    for i in 1..=8 {
        n.muladd(1365, cw[i]);
    }
    n.muladd(636, cw[9]);

    if calculate_fcs(&n) != fcs {
        return Err(DecodingReason::InvalidBarcode);
    }

    let mut track = [0u32; 20];
    for slot in track.iter_mut().skip(2).rev() {
        *slot = n.divmod(10);
    }
    track[1] = n.divmod(5);
    track[0] = n.divmod(10);

    // Everything left in `n` is the routing portion (§4.5 steps 1-3): at most
    // zip*1e6 + plus4*100 + delivery_pt + the full shape marker, which never
    // exceeds ~1.01e11 and so always fits in a u64 once the track digits are
    // gone. Reject anything too large to be any valid shape up front, before
    // the lossy limb-packing below.
    for i in 0..6 {
        if n.limb(i) != 0 {
            return Err(DecodingReason::InvalidBarcode);
        }
    }
    let mut routing: u64 = 0;
    for i in 6..10 {
        routing = (routing << 11) | n.limb(i) as u64;
    }

    const MARKER_ZIP: u64 = 1;
    const MARKER_ZIP_PLUS4: u64 = 100_001;
    const MARKER_FULL: u64 = 1_000_100_001;
    const ZIP_MAX: u64 = 99_999 + MARKER_ZIP;
    const PLUS4_MAX: u64 = 99_999 * 10_000 + 9_999 + MARKER_ZIP_PLUS4;
    const FULL_MAX: u64 = 99_999 * 1_000_000 + 9_999 * 100 + 99 + MARKER_FULL;

    let mut route = [0u32; 11];
    let mut pos = 11usize;

    if routing != 0 {
        if routing <= ZIP_MAX {
            routing -= MARKER_ZIP;
            pos = peel_decimal(&mut route, pos, routing, 5);
        } else if routing <= PLUS4_MAX {
            routing -= MARKER_ZIP_PLUS4;
            let plus4 = routing % 10_000;
            routing /= 10_000;
            pos = peel_decimal(&mut route, pos, plus4, 4);
            pos = peel_decimal(&mut route, pos, routing, 5);
        } else if routing <= FULL_MAX {
            routing -= MARKER_FULL;
            let dp = routing % 100;
            routing /= 100;
            let plus4 = routing % 10_000;
            routing /= 10_000;
            pos = peel_decimal(&mut route, pos, dp, 2);
            pos = peel_decimal(&mut route, pos, plus4, 4);
            pos = peel_decimal(&mut route, pos, routing, 5);
        } else {
            return Err(DecodingReason::InvalidBarcode);
        }
    }

    let decimal = |digits: &[u32]| -> String {
        digits.iter().map(|d| char::from_digit(*d, 10).unwrap()).collect()
    };

    let barcode_id = decimal(&track[0..2]);
    let service_type = decimal(&track[2..5]);
    let (mailer_id, serial_num) = if track[5] == 9 {
        (decimal(&track[5..14]), decimal(&track[14..20]))
    } else {
        (decimal(&track[5..11]), decimal(&track[11..20]))
    };

    let zip = if pos <= 6 { Some(decimal(&route[pos..pos + 5])) } else { None };
    let plus4 = if pos <= 2 { Some(decimal(&route[pos + 5..pos + 9])) } else { None };
    let delivery_pt = if pos == 0 { Some(decimal(&route[9..11])) } else { None };

    Ok(Record {
        barcode_id,
        service_type,
        mailer_id,
        serial_num,
        zip,
        plus4,
        delivery_pt,
    })
}

fn parse_symbols(input: &str) -> std::result::Result<[Symbol; POSITIONS], DecodingReason> {
    if input.chars().count() != POSITIONS {
        return Err(DecodingReason::WrongLength { actual: input.chars().count() });
    }
    let mut symbols = [Symbol::Track; POSITIONS];
    for (i, c) in input.chars().enumerate() {
        symbols[i] = Symbol::try_from(c)
            .map_err(|_| DecodingReason::InvalidSymbol { position: i, symbol: c })?;
    }
    Ok(symbols)
}

/// Decode a 65-symbol IMB string into a [`DecodeResult`], attempting
/// repair (§4.7) if the strict parse fails.
pub fn decode(input: &str) -> Result<DecodeResult> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    match parse_symbols(&normalized) {
        Ok(symbols) => {
            if let Ok(data) = decode_words(parse_words(&symbols)) {
                return Ok(DecodeResult {
                    data,
                    repair_status: RepairStatus::Clean,
                });
            }
            recovery::recover(&normalized, Some(symbols))
        }
        Err(reason @ DecodingReason::InvalidSymbol { .. }) => Err(ImbError::Decoding(reason)),
        Err(_) => recovery::recover(&normalized, None),
    }
}
