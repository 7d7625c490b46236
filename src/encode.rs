//! Validate a [`Record`] and run the encode pipeline (§4.5): compose the
//! BigNum, compute the FCS, split into codewords, fold the FCS in, and emit
//! 65 symbols via the bar-to-codeword tables.

use crate::bignum::BigNum;
use crate::bitlayout::{ASC_BIT, ASC_CHAR, DESC_BIT, DESC_CHAR, POSITIONS};
use crate::fcs::calculate_fcs;
use crate::tables::tables;
use crate::types::{digits_to_u64, ImbError, Record, Result, Symbol};

fn validation(reason: &str) -> ImbError {
    ImbError::Validation(reason.to_string())
}

/// Validate a normalized record against §3.1's digit/length/shape rules.
fn validate(r: &Record) -> Result<()> {
    if r.barcode_id.len() != 2 || digits_to_u64(&r.barcode_id).is_none() {
        return Err(validation("barcode_id must be 2 digits"));
    }
    let second_digit = r.barcode_id.as_bytes()[1] - b'0';
    if second_digit > 4 {
        return Err(validation("second digit of barcode_id must be 0-4"));
    }

    if r.service_type.len() != 3 || digits_to_u64(&r.service_type).is_none() {
        return Err(validation("service_type must be 3 digits"));
    }

    if !matches!(r.mailer_id.len(), 6 | 9) || digits_to_u64(&r.mailer_id).is_none() {
        return Err(validation("mailer_id must be 6 or 9 digits"));
    }
    if digits_to_u64(&r.serial_num).is_none() {
        return Err(validation("mailer_id + serial_num must total 15 digits"));
    }
    if r.mailer_id.len() + r.serial_num.len() != 15 {
        return Err(validation("mailer_id + serial_num must total 15 digits"));
    }

    if let Some(plus4) = &r.plus4 {
        if r.zip.is_none() {
            return Err(validation("zip required when plus4 present"));
        }
        if plus4.len() != 4 || digits_to_u64(plus4).is_none() {
            return Err(validation("plus4 must be 4 digits"));
        }
    }
    if let Some(zip) = &r.zip {
        if zip.len() != 5 || digits_to_u64(zip).is_none() {
            return Err(validation("zip must be 5 digits"));
        }
    }
    if let Some(dp) = &r.delivery_pt {
        if dp.len() != 2 || digits_to_u64(dp).is_none() {
            return Err(validation("delivery_pt must be 2 digits"));
        }
        if r.plus4.is_none() {
            return Err(validation("delivery_pt requires plus4"));
        }
    }

    Ok(())
}

/// Encode a [`Record`] into its 65-symbol IMB string.
pub fn encode(record: &Record) -> Result<String> {
    let r = record.normalized();
    validate(&r)?;

    let mut n = BigNum::zero();
    let mut marker: i64 = 0;

    if let Some(zip) = &r.zip {
        n.muladd(1, digits_to_u64(zip).unwrap() as u32);
        marker += 1;
    }
    if let Some(plus4) = &r.plus4 {
        n.muladd(10_000, digits_to_u64(plus4).unwrap() as u32);
        marker += 100_000;
    }
    if let Some(dp) = &r.delivery_pt {
        n.muladd(100, digits_to_u64(dp).unwrap() as u32);
        marker += 1_000_000_000;
    }
    n.add(marker);

    let barcode_bytes = r.barcode_id.as_bytes();
    let digit0 = (barcode_bytes[0] - b'0') as u32;
    let digit1 = (barcode_bytes[1] - b'0') as u32;
    n.muladd(10, digit0);
    n.muladd(5, digit1);
    n.muladd(1000, digits_to_u64(&r.service_type).unwrap() as u32);

    if r.mailer_id.len() == 6 {
        n.muladd(1_000_000, digits_to_u64(&r.mailer_id).unwrap() as u32);
        n.muladd(100_000, 0);
        n.muladd(10_000, digits_to_u64(&r.serial_num).unwrap() as u32);
    } else {
        n.muladd(10_000, 0);
        n.muladd(100_000, digits_to_u64(&r.mailer_id).unwrap() as u32);
        n.muladd(1_000_000, digits_to_u64(&r.serial_num).unwrap() as u32);
    }

    let fcs = calculate_fcs(&n);

    let mut cw = [0u32; 10];
    cw[9] = n.divmod(636) << 1;
    for i in (1..=8).rev() {
        cw[i] = n.divmod(1365);
    }
    cw[0] = ((n.limb(8) as u32) << 11) | n.limb(9) as u32;
    if fcs & (1 << 10) != 0 {
        cw[0] += 659;
    }

    let t = tables();
    let mut word = [0u16; 10];
    for i in 0..10 {
        let mut w = t.encode_table[cw[i] as usize];
        if fcs & (1 << i) != 0 {
            w ^= 0x1FFF;
        }
        word[i] = w;
    }

    let mut out = String::with_capacity(POSITIONS);
    for p in 0..POSITIONS {
        let desc = (word[DESC_CHAR[p] as usize] >> DESC_BIT[p]) & 1 == 1;
        let asc = (word[ASC_CHAR[p] as usize] >> ASC_BIT[p]) & 1 == 1;
        out.push(Symbol::from_halves(desc, asc).into());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn encode_produces_65_symbols_from_the_alphabet() {
        let out = encode(&sample()).unwrap();
        assert_eq!(out.len(), 65);
        assert!(out.chars().all(|c| matches!(c, 'A' | 'D' | 'F' | 'T')));
    }

    #[test]
    fn encode_is_deterministic() {
        let a = encode(&sample()).unwrap();
        let b = encode(&sample()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nine_digit_mailer_encodes() {
        let r = Record {
            barcode_id: "01".into(),
            service_type: "234".into(),
            mailer_id: "901234567".into(),
            serial_num: "012345".into(),
            zip: None,
            plus4: None,
            delivery_pt: None,
        };
        let out = encode(&r).unwrap();
        assert_eq!(out.len(), 65);
    }

    #[test]
    fn distinct_records_encode_distinctly() {
        let a = sample();
        let mut b = sample();
        b.serial_num = "017955972".into();
        assert_ne!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn rejects_bad_second_digit() {
        let mut r = sample();
        r.barcode_id = "05".into();
        let err = encode(&r).unwrap_err();
        match err {
            ImbError::Validation(msg) => assert!(msg.contains("0-4")),
            _ => panic!("expected Validation error"),
        }
    }

    #[test]
    fn rejects_plus4_without_zip() {
        let mut r = sample();
        r.zip = None;
        let err = encode(&r).unwrap_err();
        assert!(matches!(err, ImbError::Validation(_)));
    }

    #[test]
    fn rejects_mismatched_mailer_serial_length() {
        let mut r = sample();
        r.serial_num = "1".into();
        assert!(encode(&r).is_err());
    }

    #[test]
    fn whitespace_and_case_are_normalized_before_validation() {
        let mut r = sample();
        r.barcode_id = " 0 0 ".into();
        assert!(encode(&r).is_ok());
    }
}
