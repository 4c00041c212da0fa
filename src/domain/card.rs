//! Offline card-number sanity checks.
//!
//! Everything here is a pure function of its input: the same payload always
//! produces the same outcome, which keeps the deduct-then-check flow of the
//! router unambiguous.

use std::fmt;

const NUMBER_LENGTHS: [usize; 3] = [13, 15, 16];
const CVV_LENGTHS: [usize; 2] = [3, 4];
const YEAR_LENGTHS: [usize; 2] = [2, 4];

/// Luhn checksum over a string of decimal digits.
///
/// Returns `false` for empty input or any non-digit character.
pub fn luhn_valid(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(index, byte)| {
            let digit = u32::from(byte - b'0');
            if index % 2 == 1 {
                let doubled = digit * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                digit
            }
        })
        .sum();

    sum % 10 == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brand {
    Visa,
    Mastercard,
    Amex,
    Unknown,
}

impl Brand {
    pub fn of(number: &str) -> Self {
        match number.as_bytes().first() {
            Some(b'4') => Brand::Visa,
            Some(b'5') => Brand::Mastercard,
            Some(b'3') => Brand::Amex,
            _ => Brand::Unknown,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Brand::Visa => "VISA",
            Brand::Mastercard => "MASTERCARD",
            Brand::Amex => "AMEX",
            Brand::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Why a payload was rejected before the checksum ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    FieldCount,
    NumberNotDigits,
    NumberLength,
    Month,
    Year,
    Cvv,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::FieldCount => "expected number|month|year|cvv",
            InvalidReason::NumberNotDigits => "card number must contain only digits",
            InvalidReason::NumberLength => "card number must be 13, 15 or 16 digits",
            InvalidReason::Month => "month must be between 1 and 12",
            InvalidReason::Year => "year must be 2 or 4 digits",
            InvalidReason::Cvv => "cvv must be 3 or 4 digits",
        };
        f.write_str(text)
    }
}

/// A parsed `number|month|year|cvv` payload. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardToken {
    pub number: String,
    pub month: String,
    pub year: String,
    pub cvv: String,
}

impl CardToken {
    /// Splits and structurally validates a pipe-delimited payload.
    pub fn parse(payload: &str) -> Result<Self, InvalidReason> {
        let fields: Vec<&str> = payload.trim().split('|').map(str::trim).collect();
        let [number, month, year, cvv] = fields.as_slice() else {
            return Err(InvalidReason::FieldCount);
        };

        if number.is_empty() || !is_digits(number) {
            return Err(InvalidReason::NumberNotDigits);
        }
        if !NUMBER_LENGTHS.contains(&number.len()) {
            return Err(InvalidReason::NumberLength);
        }
        match month.parse::<u8>() {
            Ok(m) if (1..=12).contains(&m) => {}
            _ => return Err(InvalidReason::Month),
        }
        if !is_digits(year) || !YEAR_LENGTHS.contains(&year.len()) {
            return Err(InvalidReason::Year);
        }
        if !is_digits(cvv) || !CVV_LENGTHS.contains(&cvv.len()) {
            return Err(InvalidReason::Cvv);
        }

        Ok(Self {
            number: number.to_string(),
            month: month.to_string(),
            year: year.to_string(),
            cvv: cvv.to_string(),
        })
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Declined,
    Invalid(InvalidReason),
}

impl Verdict {
    pub fn status(&self) -> &'static str {
        match self {
            Verdict::Approved => "APPROVED",
            Verdict::Declined => "DECLINED",
            Verdict::Invalid(_) => "INVALID",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Approved => "00",
            Verdict::Declined => "01",
            Verdict::Invalid(_) => "99",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub verdict: Verdict,
    pub brand: Brand,
}

/// Format rules first, then the Luhn checksum.
pub fn check(payload: &str) -> CheckOutcome {
    match CardToken::parse(payload) {
        Ok(token) => CheckOutcome {
            verdict: if luhn_valid(&token.number) {
                Verdict::Approved
            } else {
                Verdict::Declined
            },
            brand: Brand::of(&token.number),
        },
        Err(reason) => CheckOutcome {
            verdict: Verdict::Invalid(reason),
            brand: Brand::Unknown,
        },
    }
}
