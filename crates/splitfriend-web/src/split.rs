//! Expense split form: which inputs show, and whether they add up.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed distance between the entered sum and the target.
pub const SPLIT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SplitType {
    #[default]
    Equal,
    Exact,
    Percentage,
    Shares,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Equal => "EQUAL",
            SplitType::Exact => "EXACT",
            SplitType::Percentage => "PERCENTAGE",
            SplitType::Shares => "SHARES",
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQUAL" => Ok(SplitType::Equal),
            "EXACT" => Ok(SplitType::Exact),
            "PERCENTAGE" => Ok(SplitType::Percentage),
            "SHARES" => Ok(SplitType::Shares),
            _ => Err(format!("Unknown split type: {}", s)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SplitValidationError {
    #[error("Exact amounts must sum to {target:.2}. Current total: {sum:.2}")]
    ExactMismatch { target: f64, sum: f64 },

    #[error("Percentages must sum to 100%. Current total: {sum:.2}%")]
    PercentageMismatch { sum: f64 },
}

/// Which per-participant inputs are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputVisibility {
    pub container: bool,
    pub exact: bool,
    pub percentage: bool,
    pub shares: bool,
}

/// One participant row. Input values are kept as typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub id: u64,
    pub included: bool,
    pub exact: String,
    pub percentage: String,
    pub shares: String,
}

impl ParticipantRow {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            included: true,
            exact: String::new(),
            percentage: String::new(),
            shares: String::new(),
        }
    }

    /// Inputs are disabled while the participant is excluded.
    pub fn inputs_enabled(&self) -> bool {
        self.included
    }
}

#[derive(Debug, Clone, Default)]
pub struct SplitForm {
    pub split_type: SplitType,
    pub amount: String,
    pub rows: Vec<ParticipantRow>,
}

impl SplitForm {
    pub fn new(participants: impl IntoIterator<Item = u64>) -> Self {
        Self {
            rows: participants.into_iter().map(ParticipantRow::new).collect(),
            ..Default::default()
        }
    }

    pub fn set_split_type(&mut self, split_type: SplitType) {
        self.split_type = split_type;
    }

    pub fn visibility(&self) -> InputVisibility {
        match self.split_type {
            SplitType::Equal => InputVisibility::default(),
            SplitType::Exact => InputVisibility {
                container: true,
                exact: true,
                ..Default::default()
            },
            SplitType::Percentage => InputVisibility {
                container: true,
                percentage: true,
                ..Default::default()
            },
            SplitType::Shares => InputVisibility {
                container: true,
                shares: true,
                ..Default::default()
            },
        }
    }

    pub fn row_mut(&mut self, id: u64) -> Option<&mut ParticipantRow> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    /// Check or uncheck a participant. Unchecking clears the row's inputs.
    /// Returns false if there is no such participant.
    pub fn set_included(&mut self, id: u64, included: bool) -> bool {
        let Some(row) = self.row_mut(id) else {
            return false;
        };
        row.included = included;
        if !included {
            row.exact.clear();
            row.percentage.clear();
            row.shares.clear();
        }
        true
    }

    /// Check that the enabled inputs add up to the target.
    pub fn validate(&self) -> Result<(), SplitValidationError> {
        match self.split_type {
            SplitType::Exact => {
                let target = parse_float(&self.amount);
                let sum = self.sum(|r| &r.exact);
                if (sum - target).abs() > SPLIT_TOLERANCE {
                    return Err(SplitValidationError::ExactMismatch { target, sum });
                }
            }
            SplitType::Percentage => {
                let sum = self.sum(|r| &r.percentage);
                if (sum - 100.0).abs() > SPLIT_TOLERANCE {
                    return Err(SplitValidationError::PercentageMismatch { sum });
                }
            }
            SplitType::Equal | SplitType::Shares => {}
        }
        Ok(())
    }

    fn sum(&self, field: impl Fn(&ParticipantRow) -> &String) -> f64 {
        self.rows
            .iter()
            .filter(|r| r.inputs_enabled())
            .map(|r| parse_float(field(r)))
            .sum()
    }
}

/// Lenient number parse: leading numeric prefix, anything else is 0.
fn parse_float(input: &str) -> f64 {
    parse_prefix(input).unwrap_or(0.0)
}

fn parse_prefix(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while let Some(&b) = bytes.get(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    // Exponent only counts with at least one digit after it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits = bytes[exp_end..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits > 0 {
            end = exp_end + digits;
        }
    }
    s[..end].parse().ok()
}

/// Normalise an amount input to two decimals, as on blur. Empty and
/// unparsable input is left alone.
pub fn format_amount(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    match parse_prefix(input) {
        Some(value) => format!("{:.2}", value),
        None => input.to_string(),
    }
}

/// Render an amount as en-US currency text.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let code = currency.to_ascii_uppercase();
    let (symbol, decimals) = match code.as_str() {
        "USD" => (Some("$"), 2),
        "EUR" => (Some("€"), 2),
        "GBP" => (Some("£"), 2),
        "JPY" => (Some("¥"), 0),
        _ => (None, 2),
    };
    let digits = group_thousands(&format!("{:.*}", decimals, amount.abs()));
    let sign = if amount < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match symbol {
        Some(symbol) => format!("{}{}{}", sign, symbol, digits),
        None => format!("{}{} {}", sign, code, digits),
    }
}

fn group_thousands(number: &str) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (number, None),
    };
    let mut grouped = String::with_capacity(number.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}
