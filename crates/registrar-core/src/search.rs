//! # Search Module
//!
//! Field-name based filtering over students, courses and enrollments.
//!
//! Each record type publishes a table of [`Field`] accessors through the
//! [`Searchable`] trait. Lookup is by case-insensitive field name or alias;
//! an unknown field matches nothing. Searching never mutates.

use crate::{Course, Enrollment, RegistrarError, Student};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// OPERATORS AND CRITERIA
// =============================================================================

/// Comparison applied between a field value and the search value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
}

impl SearchOperator {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SearchOperator::Equals => "equals",
            SearchOperator::Contains => "contains",
            SearchOperator::StartsWith => "starts_with",
            SearchOperator::EndsWith => "ends_with",
            SearchOperator::GreaterThan => "greater_than",
            SearchOperator::LessThan => "less_than",
        }
    }

    /// Apply the operator. Text comparisons ignore case. Numeric ones are
    /// exact at any number of decimals (up to 18) and report no match
    /// unless both sides parse.
    #[must_use]
    pub fn matches(&self, field_value: &str, search_value: &str) -> bool {
        let field_lower = field_value.to_lowercase();
        let search_lower = search_value.to_lowercase();
        match self {
            SearchOperator::Equals => field_lower == search_lower,
            SearchOperator::Contains => field_lower.contains(&search_lower),
            SearchOperator::StartsWith => field_lower.starts_with(&search_lower),
            SearchOperator::EndsWith => field_lower.ends_with(&search_lower),
            SearchOperator::GreaterThan => {
                compare_numeric(field_value, search_value, |a, b| a > b)
            }
            SearchOperator::LessThan => compare_numeric(field_value, search_value, |a, b| a < b),
        }
    }
}

const MAX_DECIMALS: usize = 18;

/// Parse a plain decimal into `(mantissa, scale)`, the value being
/// `mantissa / 10^scale`.
fn parse_decimal(raw: &str) -> Option<(i128, u32)> {
    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if (whole.is_empty() && frac.is_empty())
        || frac.len() > MAX_DECIMALS
        || !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let mantissa: i128 = format!("{}{}", whole, frac).parse().ok()?;
    let scale = u32::try_from(frac.len()).ok()?;
    Some((if negative { -mantissa } else { mantissa }, scale))
}

fn compare_numeric(field_value: &str, search_value: &str, cmp: fn(i128, i128) -> bool) -> bool {
    let (Some((a, a_scale)), Some((b, b_scale))) =
        (parse_decimal(field_value), parse_decimal(search_value))
    else {
        return false;
    };
    let scale = a_scale.max(b_scale);
    let align = |m: i128, s: u32| m.checked_mul(10i128.checked_pow(scale - s)?);
    match (align(a, a_scale), align(b, b_scale)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SearchOperator {
    type Err = RegistrarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "equals" | "eq" | "=" => Ok(SearchOperator::Equals),
            "contains" => Ok(SearchOperator::Contains),
            "startswith" => Ok(SearchOperator::StartsWith),
            "endswith" => Ok(SearchOperator::EndsWith),
            "greaterthan" | "gt" | ">" => Ok(SearchOperator::GreaterThan),
            "lessthan" | "lt" | "<" => Ok(SearchOperator::LessThan),
            _ => Err(RegistrarError::InvalidInput(format!(
                "Unknown search operator: {}. Use: equals, contains, starts_with, ends_with, greater_than, less_than",
                s
            ))),
        }
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    pub field: String,
    pub value: String,
    pub operator: SearchOperator,
}

impl Criteria {
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        operator: SearchOperator,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
        }
    }
}

// =============================================================================
// FIELD ACCESSOR TABLES
// =============================================================================

/// How a field is matched by [`search_by_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Substring match.
    Text,
    /// Substring match on the decimal rendering.
    Number,
    /// Exact `true`/`false` match.
    Flag,
}

/// One searchable field of a record type.
pub struct Field<T> {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub get: fn(&T) -> String,
}

impl<T> Field<T> {
    fn answers_to(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// A record type with a field accessor table.
pub trait Searchable: Sized + 'static {
    const FIELDS: &'static [Field<Self>];

    /// Resolve a field by name or alias.
    fn field(name: &str) -> Option<&'static Field<Self>> {
        let name = name.trim();
        Self::FIELDS.iter().find(|f| f.answers_to(name))
    }

    /// Canonical names of all fields.
    fn field_names() -> Vec<&'static str> {
        Self::FIELDS.iter().map(|f| f.name).collect()
    }
}

fn student_id(s: &Student) -> String {
    s.id.to_string()
}
fn student_name(s: &Student) -> String {
    s.full_name.clone()
}
fn student_email(s: &Student) -> String {
    s.email.clone()
}
fn student_active(s: &Student) -> String {
    s.active.to_string()
}
fn student_gpa(s: &Student) -> String {
    s.current_gpa.to_string()
}
fn student_enrolled_on(s: &Student) -> String {
    s.enrolled_on.format("%Y-%m-%d").to_string()
}

impl Searchable for Student {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "id",
            aliases: &["studentid", "registrationnumber", "regno"],
            kind: FieldKind::Text,
            get: student_id,
        },
        Field {
            name: "name",
            aliases: &["fullname", "full_name"],
            kind: FieldKind::Text,
            get: student_name,
        },
        Field {
            name: "email",
            aliases: &[],
            kind: FieldKind::Text,
            get: student_email,
        },
        Field {
            name: "active",
            aliases: &[],
            kind: FieldKind::Flag,
            get: student_active,
        },
        Field {
            name: "gpa",
            aliases: &["currentgpa"],
            kind: FieldKind::Number,
            get: student_gpa,
        },
        Field {
            name: "enrolled_on",
            aliases: &["enrollmentdate", "enrolled"],
            kind: FieldKind::Text,
            get: student_enrolled_on,
        },
    ];
}

fn course_id(c: &Course) -> String {
    c.id.to_string()
}
fn course_title(c: &Course) -> String {
    c.title.clone()
}
fn course_credits(c: &Course) -> String {
    c.credits.to_string()
}
fn course_department(c: &Course) -> String {
    c.department.clone()
}
fn course_semester(c: &Course) -> String {
    c.semester.clone()
}
fn course_instructor(c: &Course) -> String {
    c.instructor_id.clone()
}
fn course_active(c: &Course) -> String {
    c.active.to_string()
}

impl Searchable for Course {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "id",
            aliases: &["courseid", "code"],
            kind: FieldKind::Text,
            get: course_id,
        },
        Field {
            name: "title",
            aliases: &["name"],
            kind: FieldKind::Text,
            get: course_title,
        },
        Field {
            name: "credits",
            aliases: &["credit"],
            kind: FieldKind::Number,
            get: course_credits,
        },
        Field {
            name: "department",
            aliases: &["dept"],
            kind: FieldKind::Text,
            get: course_department,
        },
        Field {
            name: "semester",
            aliases: &["term"],
            kind: FieldKind::Text,
            get: course_semester,
        },
        Field {
            name: "instructor",
            aliases: &["instructorid", "instructor_id"],
            kind: FieldKind::Text,
            get: course_instructor,
        },
        Field {
            name: "active",
            aliases: &[],
            kind: FieldKind::Flag,
            get: course_active,
        },
    ];
}

fn enrollment_id(e: &Enrollment) -> String {
    e.id.to_string()
}
fn enrollment_student(e: &Enrollment) -> String {
    e.student.to_string()
}
fn enrollment_course(e: &Enrollment) -> String {
    e.course.to_string()
}
fn enrollment_status(e: &Enrollment) -> String {
    e.status.to_string()
}
fn enrollment_active(e: &Enrollment) -> String {
    e.is_active().to_string()
}
fn enrollment_completed(e: &Enrollment) -> String {
    e.is_completed().to_string()
}
fn enrollment_grade(e: &Enrollment) -> String {
    e.letter.map(|l| l.to_string()).unwrap_or_default()
}
fn enrollment_score(e: &Enrollment) -> String {
    e.score.map(|s| s.to_string()).unwrap_or_default()
}

impl Searchable for Enrollment {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "id",
            aliases: &["enrollmentid"],
            kind: FieldKind::Number,
            get: enrollment_id,
        },
        Field {
            name: "student",
            aliases: &["studentid"],
            kind: FieldKind::Text,
            get: enrollment_student,
        },
        Field {
            name: "course",
            aliases: &["courseid"],
            kind: FieldKind::Text,
            get: enrollment_course,
        },
        Field {
            name: "status",
            aliases: &[],
            kind: FieldKind::Text,
            get: enrollment_status,
        },
        Field {
            name: "active",
            aliases: &[],
            kind: FieldKind::Flag,
            get: enrollment_active,
        },
        Field {
            name: "completed",
            aliases: &[],
            kind: FieldKind::Flag,
            get: enrollment_completed,
        },
        Field {
            name: "grade",
            aliases: &["letter"],
            kind: FieldKind::Text,
            get: enrollment_grade,
        },
        Field {
            name: "score",
            aliases: &["numericgrade"],
            kind: FieldKind::Number,
            get: enrollment_score,
        },
    ];
}

// =============================================================================
// SEARCH FUNCTIONS
// =============================================================================

/// Loose lookup: substring match on text and number fields, exact match
/// on flags.
pub fn search_by_field<T: Searchable + Clone>(items: &[T], field: &str, value: &str) -> Vec<T> {
    let Some(field) = T::field(field) else {
        return Vec::new();
    };
    let operator = match field.kind {
        FieldKind::Text | FieldKind::Number => SearchOperator::Contains,
        FieldKind::Flag => SearchOperator::Equals,
    };
    items
        .iter()
        .filter(|item| operator.matches(&(field.get)(item), value))
        .cloned()
        .collect()
}

/// Match every item against one criteria.
pub fn search_by_criteria<T: Searchable + Clone>(items: &[T], criteria: &Criteria) -> Vec<T> {
    let Some(field) = T::field(&criteria.field) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| criteria.operator.matches(&(field.get)(item), &criteria.value))
        .cloned()
        .collect()
}

/// Items matching an arbitrary predicate.
pub fn filter<T: Clone>(items: &[T], predicate: impl Fn(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| predicate(item)).cloned().collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::{Gpa, Score};
    use crate::{CourseId, EnrollmentId, StudentId};
    use chrono::{DateTime, Utc};

    fn students() -> Vec<Student> {
        let mut a = Student::new(
            StudentId::new("2024CS001"),
            "Ada Lovelace",
            "ada@uni.edu",
            DateTime::<Utc>::UNIX_EPOCH,
        );
        a.current_gpa = Gpa::from_hundredths(375);
        let mut b = Student::new(
            StudentId::new("2024EE002"),
            "Charles Babbage",
            "charles@uni.edu",
            DateTime::<Utc>::UNIX_EPOCH,
        );
        b.current_gpa = Gpa::from_hundredths(250);
        b.active = false;
        vec![a, b]
    }

    #[test]
    fn operator_parsing() {
        assert_eq!("starts_with".parse::<SearchOperator>().expect("op"), SearchOperator::StartsWith);
        assert_eq!("GREATER_THAN".parse::<SearchOperator>().expect("op"), SearchOperator::GreaterThan);
        assert_eq!("ends-with".parse::<SearchOperator>().expect("op"), SearchOperator::EndsWith);
        assert!("between".parse::<SearchOperator>().is_err());
    }

    #[test]
    fn text_operators_ignore_case() {
        assert!(SearchOperator::Equals.matches("ADA", "ada"));
        assert!(SearchOperator::Contains.matches("Ada Lovelace", "LOVE"));
        assert!(SearchOperator::StartsWith.matches("Ada Lovelace", "ada"));
        assert!(SearchOperator::EndsWith.matches("Ada Lovelace", "LACE"));
        assert!(!SearchOperator::EndsWith.matches("Ada Lovelace", "ada"));
    }

    #[test]
    fn numeric_operators_reject_non_numbers() {
        assert!(SearchOperator::GreaterThan.matches("3.75", "3.5"));
        assert!(SearchOperator::LessThan.matches("2.50", "3"));
        assert!(!SearchOperator::GreaterThan.matches("abc", "1"));
        assert!(!SearchOperator::LessThan.matches("1", "abc"));
    }

    #[test]
    fn numeric_operators_compare_extra_decimals_exactly() {
        assert!(SearchOperator::GreaterThan.matches("3.25", "3.125"));
        assert!(!SearchOperator::GreaterThan.matches("3.00", "3.125"));
        assert!(SearchOperator::GreaterThan.matches("3.13", "3.125"));
        assert!(!SearchOperator::LessThan.matches("3.13", "3.125"));
        assert!(SearchOperator::LessThan.matches("-0.5", "-0.499"));
        assert!(!SearchOperator::GreaterThan.matches("3", "3.000"));
        assert!(!SearchOperator::GreaterThan.matches("3", "1.0000000000000000001"));

        let all = students();
        let found = search_by_criteria(&all, &Criteria::new("gpa", "3.745", SearchOperator::GreaterThan));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "Ada Lovelace");
    }

    #[test]
    fn search_by_field_uses_aliases() {
        let all = students();
        let found = search_by_field(&all, "FullName", "babb");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, StudentId::new("2024EE002"));

        assert_eq!(search_by_field(&all, "regno", "2024").len(), 2);
        assert_eq!(search_by_field(&all, "active", "TRUE").len(), 1);
        assert!(search_by_field(&all, "shoe_size", "9").is_empty());
    }

    #[test]
    fn search_by_criteria_numeric() {
        let all = students();
        let honours = search_by_criteria(&all, &Criteria::new("gpa", "3.00", SearchOperator::GreaterThan));
        assert_eq!(honours.len(), 1);
        assert_eq!(honours[0].full_name, "Ada Lovelace");
        assert!(search_by_criteria(&all, &Criteria::new("nope", "x", SearchOperator::Equals)).is_empty());
    }

    #[test]
    fn enrollment_fields() {
        let mut done = Enrollment::new(
            EnrollmentId(1),
            StudentId::new("S1"),
            CourseId::new("CS101"),
            DateTime::<Utc>::UNIX_EPOCH,
        );
        done.complete(Score::whole(88)).expect("complete");
        let open = Enrollment::new(
            EnrollmentId(2),
            StudentId::new("S1"),
            CourseId::new("MA101"),
            DateTime::<Utc>::UNIX_EPOCH,
        );
        let all = vec![done, open];

        assert_eq!(search_by_field(&all, "grade", "b").len(), 1);
        assert_eq!(search_by_field(&all, "completed", "false").len(), 1);
        assert_eq!(
            search_by_criteria(&all, &Criteria::new("numericgrade", "80", SearchOperator::GreaterThan)).len(),
            1
        );
        assert_eq!(search_by_criteria(&all, &Criteria::new("status", "active", SearchOperator::Equals)).len(), 1);
    }

    #[test]
    fn predicate_filter() {
        let all = students();
        let inactive = filter(&all, |s| !s.active);
        assert_eq!(inactive.len(), 1);
        assert!(Student::field_names().contains(&"gpa"));
        assert!(Course::field("DEPT").is_some());
    }
}
