//! # CSV Transforms
//!
//! Text <-> record conversion for bulk student and course files.
//!
//! - Students: `id,name,email`
//! - Courses: `id,title,credits,department,semester,instructor`
//!
//! A header line is written on export and skipped on import when present.
//! Fields containing commas or quotes are double-quoted. Malformed rows are
//! skipped and reported with their line number; they never abort a parse.
//! File I/O is left to the caller.

use crate::admin::{NewCourse, NewStudent};
use crate::primitives::MAX_CSV_ROWS;
use crate::{Course, RegistrarError, Student};

pub const STUDENT_HEADER: &str = "id,name,email";
pub const COURSE_HEADER: &str = "id,title,credits,department,semester,instructor";

/// A parsed CSV document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvImport<T> {
    pub rows: Vec<T>,
    /// `(line number, reason)` for every skipped row.
    pub malformed: Vec<(usize, String)>,
}

impl<T> Default for CsvImport<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            malformed: Vec::new(),
        }
    }
}

// =============================================================================
// FIELD HANDLING
// =============================================================================

/// Split one line into fields, honouring double quotes.
fn split_row(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if current.is_empty() => in_quotes = true,
            (',', false) => fields.push(std::mem::take(&mut current)),
            (other, _) => current.push(other),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn is_header(fields: &[String]) -> bool {
    fields
        .first()
        .is_some_and(|f| f.eq_ignore_ascii_case("id"))
}

fn parse_rows<T>(
    text: &str,
    expected: usize,
    build: impl Fn(Vec<String>) -> Result<T, String>,
) -> Result<CsvImport<T>, RegistrarError> {
    let mut result = CsvImport::default();
    let mut seen = 0usize;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        seen += 1;
        if seen > MAX_CSV_ROWS {
            return Err(RegistrarError::InvalidInput(format!(
                "CSV exceeds {} rows",
                MAX_CSV_ROWS
            )));
        }

        let fields = match split_row(line) {
            Ok(fields) => fields,
            Err(reason) => {
                result.malformed.push((line_no, reason));
                continue;
            }
        };
        if seen == 1 && is_header(&fields) {
            continue;
        }
        if fields.len() != expected {
            result.malformed.push((
                line_no,
                format!("expected {} fields, found {}", expected, fields.len()),
            ));
            continue;
        }
        match build(fields) {
            Ok(row) => result.rows.push(row),
            Err(reason) => result.malformed.push((line_no, reason)),
        }
    }
    Ok(result)
}

// =============================================================================
// STUDENTS
// =============================================================================

/// Parse `id,name,email` rows.
pub fn parse_students(text: &str) -> Result<CsvImport<NewStudent>, RegistrarError> {
    parse_rows(text, 3, |fields| {
        let mut it = fields.into_iter();
        let (Some(id), Some(full_name), Some(email)) = (it.next(), it.next(), it.next()) else {
            return Err("missing field".to_string());
        };
        if id.is_empty() {
            return Err("empty id".to_string());
        }
        Ok(NewStudent {
            id,
            full_name,
            email,
        })
    })
}

/// Render students with a header line.
#[must_use]
pub fn students_to_csv(students: &[Student]) -> String {
    let mut out = String::from(STUDENT_HEADER);
    out.push('\n');
    for s in students {
        out.push_str(&format!(
            "{},{},{}\n",
            escape_field(s.id.as_str()),
            escape_field(&s.full_name),
            escape_field(&s.email)
        ));
    }
    out
}

// =============================================================================
// COURSES
// =============================================================================

/// Parse `id,title,credits,department,semester,instructor` rows.
pub fn parse_courses(text: &str) -> Result<CsvImport<NewCourse>, RegistrarError> {
    parse_rows(text, 6, |fields| {
        let mut it = fields.into_iter();
        let (Some(id), Some(title), Some(credits), Some(department), Some(semester), Some(instructor)) =
            (it.next(), it.next(), it.next(), it.next(), it.next(), it.next())
        else {
            return Err("missing field".to_string());
        };
        if id.is_empty() {
            return Err("empty id".to_string());
        }
        let credits = credits
            .parse::<u32>()
            .map_err(|_| format!("credits is not a whole number: {}", credits))?;
        Ok(NewCourse {
            id,
            title,
            credits,
            department,
            semester,
            instructor_id: instructor,
        })
    })
}

/// Render courses with a header line.
#[must_use]
pub fn courses_to_csv(courses: &[Course]) -> String {
    let mut out = String::from(COURSE_HEADER);
    out.push('\n');
    for c in courses {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            escape_field(c.id.as_str()),
            escape_field(&c.title),
            c.credits,
            escape_field(&c.department),
            escape_field(&c.semester),
            escape_field(&c.instructor_id)
        ));
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CourseId, StudentId};
    use chrono::{DateTime, Utc};

    #[test]
    fn parse_students_skips_header_and_bad_rows() {
        let text = "id,name,email\nS1,Ada Lovelace,ada@uni.edu\nS2,missing email\n\nS3,\"Hopper, Grace\",grace@uni.edu\n";
        let parsed = parse_students(text).expect("parse");

        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1].full_name, "Hopper, Grace");
        assert_eq!(parsed.malformed.len(), 1);
        assert_eq!(parsed.malformed[0].0, 3);
    }

    #[test]
    fn headerless_input_is_accepted() {
        let parsed = parse_students("S1,Ada,ada@uni.edu").expect("parse");
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.malformed.is_empty());
    }

    #[test]
    fn parse_courses_checks_credits() {
        let text = "CS101,Intro,3,CS,FALL,I1\nCS102,Broken,three,CS,FALL,I1\n";
        let parsed = parse_courses(text).expect("parse");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].credits, 3);
        assert_eq!(parsed.malformed.len(), 1);
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let parsed = parse_students("S1,\"Ada,ada@uni.edu").expect("parse");
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.malformed.len(), 1);
    }

    #[test]
    fn export_quotes_commas() {
        let mut student = Student::new(
            StudentId::new("S1"),
            "Hopper, \"Amazing\" Grace",
            "grace@uni.edu",
            DateTime::<Utc>::UNIX_EPOCH,
        );
        student.active = false;
        let text = students_to_csv(&[student]);
        assert_eq!(
            text,
            "id,name,email\nS1,\"Hopper, \"\"Amazing\"\" Grace\",grace@uni.edu\n"
        );

        let parsed = parse_students(&text).expect("parse");
        assert_eq!(parsed.rows[0].full_name, "Hopper, \"Amazing\" Grace");
    }

    #[test]
    fn course_export_has_header() {
        let course = Course {
            id: CourseId::new("MA201"),
            title: "Linear Algebra".to_string(),
            credits: 4,
            department: "MATH".to_string(),
            semester: "SPRING".to_string(),
            instructor_id: "I9".to_string(),
            active: true,
        };
        let text = courses_to_csv(&[course]);
        assert!(text.starts_with(COURSE_HEADER));
        assert!(text.contains("MA201,Linear Algebra,4,MATH,SPRING,I9"));
    }
}
