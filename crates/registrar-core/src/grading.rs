//! # Grading
//!
//! Fixed-point grade arithmetic for the Registrar CORE.
//!
//! Numeric grades and GPAs are stored as integer hundredths so that every
//! computation is exact and reproducible:
//! - `Score(8550)` is a numeric grade of 85.50
//! - `Gpa(367)` is a GPA of 3.67
//!
//! ## Letter-Grade Table
//!
//! | Score range    | Letter | Grade points |
//! |----------------|--------|--------------|
//! | 90.00 – 100.00 | A      | 4.00         |
//! | 80.00 – 89.99  | B      | 3.00         |
//! | 70.00 – 79.99  | C      | 2.00         |
//! | 60.00 – 69.99  | D      | 1.00         |
//! | 0.00 – 59.99   | F      | 0.00         |

use crate::RegistrarError;
use crate::primitives::{MAX_SCORE_HUNDREDTHS, MIN_SCORE_HUNDREDTHS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// FIXED-POINT HELPERS
// =============================================================================

/// Parse a decimal string with at most two fractional digits into hundredths.
///
/// Returns `None` for anything that is not a plain decimal number
/// (`"85"`, `"85.5"`, `"-3.25"` are accepted; `"8e1"`, `"85.125"`, `""` are not).
pub fn parse_hundredths(raw: &str) -> Option<i64> {
    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 2
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole_value: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_value: i64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    if frac.len() == 1 {
        frac_value *= 10;
    }

    let value = whole_value.checked_mul(100)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}

/// Render hundredths as the shortest exact decimal (`8500` → `"85"`, `8550` → `"85.5"`).
pub fn format_hundredths(value: i64) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let whole = magnitude / 100;
    let frac = magnitude % 100;

    if frac == 0 {
        format!("{}{}", sign, whole)
    } else if frac % 10 == 0 {
        format!("{}{}.{}", sign, whole, frac / 10)
    } else {
        format!("{}{}.{:02}", sign, whole, frac)
    }
}

// =============================================================================
// SCORE
// =============================================================================

/// A numeric grade in hundredths of a point.
///
/// A `Score` can hold any value; range checking happens where grades are
/// recorded so that the rejected value can be reported back verbatim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Score(pub i64);

impl Score {
    /// Create a score from hundredths (`8550` = 85.50).
    #[must_use]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Create a score from a whole number of points.
    #[must_use]
    pub const fn whole(points: i64) -> Self {
        Self(points.saturating_mul(100))
    }

    /// Get the raw value in hundredths.
    #[must_use]
    pub const fn hundredths(self) -> i64 {
        self.0
    }

    /// Check whether the score lies within 0..=100.
    #[must_use]
    pub const fn is_in_range(self) -> bool {
        self.0 >= MIN_SCORE_HUNDREDTHS && self.0 <= MAX_SCORE_HUNDREDTHS
    }

    /// Validate the score, returning `InvalidGrade` when out of range.
    pub fn validate(self) -> Result<Self, RegistrarError> {
        if self.is_in_range() {
            Ok(self)
        } else {
            Err(RegistrarError::InvalidGrade(self.to_string()))
        }
    }

    /// Derive the letter grade for this score.
    #[must_use]
    pub fn letter(self) -> LetterGrade {
        LetterGrade::from_score(self)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_hundredths(self.0))
    }
}

impl FromStr for Score {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hundredths(s)
            .map(Self)
            .ok_or_else(|| RegistrarError::InvalidGrade(s.trim().to_string()))
    }
}

// =============================================================================
// LETTER GRADES
// =============================================================================

/// Discrete grade symbol derived from a numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

/// One row of the cutoff table.
#[derive(Debug, Clone, Copy)]
pub struct GradeBand {
    /// Lowest score (hundredths) that earns this letter.
    pub min_score: i64,
    pub letter: LetterGrade,
    /// Grade points in hundredths (`400` = 4.00).
    pub points: u32,
}

/// The fixed cutoff table, highest band first.
pub const GRADE_TABLE: [GradeBand; 5] = [
    GradeBand {
        min_score: 9_000,
        letter: LetterGrade::A,
        points: 400,
    },
    GradeBand {
        min_score: 8_000,
        letter: LetterGrade::B,
        points: 300,
    },
    GradeBand {
        min_score: 7_000,
        letter: LetterGrade::C,
        points: 200,
    },
    GradeBand {
        min_score: 6_000,
        letter: LetterGrade::D,
        points: 100,
    },
    GradeBand {
        min_score: MIN_SCORE_HUNDREDTHS,
        letter: LetterGrade::F,
        points: 0,
    },
];

impl LetterGrade {
    /// Look up the letter for a score in [`GRADE_TABLE`].
    ///
    /// Scores below every band (negative) map to `F`.
    #[must_use]
    pub fn from_score(score: Score) -> Self {
        GRADE_TABLE
            .iter()
            .find(|band| score.hundredths() >= band.min_score)
            .map(|band| band.letter)
            .unwrap_or(LetterGrade::F)
    }

    /// Grade points in hundredths.
    #[must_use]
    pub fn points_hundredths(self) -> u32 {
        GRADE_TABLE
            .iter()
            .find(|band| band.letter == self)
            .map(|band| band.points)
            .unwrap_or(0)
    }

    /// Grade points as a `Gpa` value.
    #[must_use]
    pub fn points(self) -> Gpa {
        Gpa(self.points_hundredths())
    }

    /// The single-character symbol.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for LetterGrade {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(LetterGrade::A),
            "B" => Ok(LetterGrade::B),
            "C" => Ok(LetterGrade::C),
            "D" => Ok(LetterGrade::D),
            "F" => Ok(LetterGrade::F),
            other => Err(RegistrarError::InvalidInput(format!(
                "Unknown letter grade: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// GPA
// =============================================================================

/// Grade point average in hundredths (`350` = 3.50).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Gpa(pub u32);

impl Gpa {
    /// GPA of a student with no completed enrollments.
    pub const ZERO: Gpa = Gpa(0);

    /// Create a GPA from hundredths.
    #[must_use]
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    /// Get the raw value in hundredths.
    #[must_use]
    pub const fn hundredths(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Gpa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Integer division rounding half up. `denominator` must be non-zero.
fn div_round(numerator: u64, denominator: u64) -> u64 {
    numerator.saturating_add(denominator / 2) / denominator
}

/// Credit-weighted mean of grade points.
///
/// Each item is `(credit_hours, letter)`. Returns [`Gpa::ZERO`] when the
/// total credit weight is zero.
pub fn weighted_gpa<I>(items: I) -> Gpa
where
    I: IntoIterator<Item = (u32, LetterGrade)>,
{
    let (weighted, credits) = items
        .into_iter()
        .fold((0u64, 0u64), |(weighted, credits), (hours, letter)| {
            let points = u64::from(letter.points_hundredths()).saturating_mul(u64::from(hours));
            (
                weighted.saturating_add(points),
                credits.saturating_add(u64::from(hours)),
            )
        });

    if credits == 0 {
        return Gpa::ZERO;
    }
    Gpa(div_round(weighted, credits) as u32)
}

/// Credit-weighted mean of numeric scores.
///
/// Each item is `(credit_hours, score)`; negative scores count as zero.
/// Returns `None` when the total credit weight is zero.
pub fn weighted_average_score<I>(items: I) -> Option<Score>
where
    I: IntoIterator<Item = (u32, Score)>,
{
    let (weighted, credits) = items
        .into_iter()
        .fold((0u64, 0u64), |(weighted, credits), (hours, score)| {
            let value = score.hundredths().max(0) as u64;
            (
                weighted.saturating_add(value.saturating_mul(u64::from(hours))),
                credits.saturating_add(u64::from(hours)),
            )
        });

    if credits == 0 {
        return None;
    }
    Some(Score(div_round(weighted, credits) as i64))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_plain_decimals() {
        assert_eq!(parse_hundredths("85"), Some(8500));
        assert_eq!(parse_hundredths("85.5"), Some(8550));
        assert_eq!(parse_hundredths(" 85.25 "), Some(8525));
        assert_eq!(parse_hundredths("-3"), Some(-300));
        assert_eq!(parse_hundredths(".5"), Some(50));
        assert_eq!(parse_hundredths("100."), Some(10_000));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_hundredths(""), None);
        assert_eq!(parse_hundredths("."), None);
        assert_eq!(parse_hundredths("abc"), None);
        assert_eq!(parse_hundredths("8e1"), None);
        assert_eq!(parse_hundredths("85.125"), None);
        assert_eq!(parse_hundredths("1.2.3"), None);
    }

    #[test]
    fn format_is_shortest_exact() {
        assert_eq!(format_hundredths(8500), "85");
        assert_eq!(format_hundredths(8550), "85.5");
        assert_eq!(format_hundredths(8525), "85.25");
        assert_eq!(format_hundredths(-250), "-2.5");
        assert_eq!(format_hundredths(5), "0.05");
    }

    #[test]
    fn cutoffs_match_table() {
        assert_eq!(Score::whole(100).letter(), LetterGrade::A);
        assert_eq!(Score::whole(90).letter(), LetterGrade::A);
        assert_eq!(Score::from_hundredths(8999).letter(), LetterGrade::B);
        assert_eq!(Score::whole(85).letter(), LetterGrade::B);
        assert_eq!(Score::whole(70).letter(), LetterGrade::C);
        assert_eq!(Score::whole(60).letter(), LetterGrade::D);
        assert_eq!(Score::from_hundredths(5999).letter(), LetterGrade::F);
        assert_eq!(Score::whole(0).letter(), LetterGrade::F);
    }

    #[test]
    fn out_of_range_score_reports_value() {
        let err = Score::whole(150).validate().expect_err("150 is out of range");
        assert!(matches!(err, RegistrarError::InvalidGrade(ref v) if v == "150"));

        let err = Score::from_hundredths(-1).validate().expect_err("negative");
        assert!(matches!(err, RegistrarError::InvalidGrade(ref v) if v == "-0.01"));
    }

    #[test]
    fn score_from_str_rejects_non_numeric() {
        let err = "ninety".parse::<Score>().expect_err("not a number");
        assert!(matches!(err, RegistrarError::InvalidGrade(ref v) if v == "ninety"));
    }

    #[test]
    fn gpa_display_has_two_decimals() {
        assert_eq!(Gpa(300).to_string(), "3.00");
        assert_eq!(Gpa(367).to_string(), "3.67");
        assert_eq!(Gpa::ZERO.to_string(), "0.00");
    }

    #[test]
    fn weighted_gpa_uses_credit_weights() {
        // 3 credits of A (4.00) and 1 credit of C (2.00) -> 14 / 4 = 3.50
        let gpa = weighted_gpa([(3, LetterGrade::A), (1, LetterGrade::C)]);
        assert_eq!(gpa, Gpa(350));
    }

    #[test]
    fn weighted_gpa_rounds_half_up() {
        // (4.00 + 3.00 + 3.00) / 3 = 3.333... -> 3.33
        let gpa = weighted_gpa([
            (1, LetterGrade::A),
            (1, LetterGrade::B),
            (1, LetterGrade::B),
        ]);
        assert_eq!(gpa, Gpa(333));
        // (4.00 + 4.00 + 3.00) / 3 = 3.666... -> 3.67
        let gpa = weighted_gpa([
            (1, LetterGrade::A),
            (1, LetterGrade::A),
            (1, LetterGrade::B),
        ]);
        assert_eq!(gpa, Gpa(367));
    }

    #[test]
    fn weighted_gpa_empty_is_zero() {
        assert_eq!(weighted_gpa(std::iter::empty()), Gpa::ZERO);
        assert_eq!(weighted_gpa([(0, LetterGrade::A)]), Gpa::ZERO);
    }

    #[test]
    fn weighted_average_score_uses_credit_weights() {
        let avg = weighted_average_score([(3, Score::whole(90)), (1, Score::whole(70))]);
        assert_eq!(avg, Some(Score::whole(85)));
        assert_eq!(weighted_average_score(std::iter::empty()), None);
    }

    #[test]
    fn letter_round_trips_through_str() {
        for band in GRADE_TABLE {
            let parsed: LetterGrade = band.letter.symbol().parse().expect("parse");
            assert_eq!(parsed, band.letter);
            assert_eq!(parsed.points_hundredths(), band.points);
        }
        assert!("E".parse::<LetterGrade>().is_err());
    }
}
