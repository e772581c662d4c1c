//! # Administration
//!
//! Create, update, activate and deactivate students and courses.
//!
//! Input is validated before anything is written. Validation failures are
//! `InvalidInput`; conflicts with existing records are `InvalidState`.
//! Records are never deleted, only deactivated.

use crate::engine::EnrollmentEngine;
use crate::primitives::{
    MAX_COURSE_CREDITS, MAX_EMAIL_LENGTH, MAX_ID_LENGTH, MAX_LABEL_LENGTH, MAX_NAME_LENGTH,
};
use crate::store::RecordStore;
use crate::{Course, CourseId, RegistrarError, Student, StudentId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Fields required to register a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    pub id: String,
    pub full_name: String,
    pub email: String,
}

/// Editable student fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentUpdate {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Fields required to create a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCourse {
    pub id: String,
    pub title: String,
    pub credits: u32,
    pub department: String,
    pub semester: String,
    pub instructor_id: String,
}

/// Editable course fields; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub credits: Option<u32>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub instructor_id: Option<String>,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn invalid(msg: String) -> RegistrarError {
    RegistrarError::InvalidInput(msg)
}

/// Validate a record identifier: non-empty, bounded, no whitespace or commas.
pub fn validate_id(kind: &str, id: &str) -> Result<(), RegistrarError> {
    if id.is_empty() {
        return Err(invalid(format!("{} id must not be empty", kind)));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(invalid(format!(
            "{} id exceeds {} bytes",
            kind, MAX_ID_LENGTH
        )));
    }
    if id.chars().any(|c| c.is_whitespace() || c.is_control() || c == ',') {
        return Err(invalid(format!(
            "{} id must not contain whitespace or commas: {:?}",
            kind, id
        )));
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max: usize) -> Result<(), RegistrarError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} must not be empty", field)));
    }
    if value.len() > max {
        return Err(invalid(format!("{} exceeds {} bytes", field, max)));
    }
    if value.chars().any(char::is_control) {
        return Err(invalid(format!("{} must not contain control characters", field)));
    }
    Ok(())
}

/// Validate an email address: one `@`, a non-empty local part and a dotted
/// domain.
pub fn validate_email(email: &str) -> Result<(), RegistrarError> {
    validate_text("email", email, MAX_EMAIL_LENGTH)?;
    let shape_ok = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !shape_ok {
        return Err(invalid(format!("Malformed email address: {}", email)));
    }
    Ok(())
}

fn validate_credits(credits: u32) -> Result<(), RegistrarError> {
    if credits == 0 || credits > MAX_COURSE_CREDITS {
        return Err(invalid(format!(
            "credits must be between 1 and {}, got {}",
            MAX_COURSE_CREDITS, credits
        )));
    }
    Ok(())
}

// =============================================================================
// STUDENT ADMINISTRATION
// =============================================================================

/// Student record administration.
pub struct StudentAdmin;

impl StudentAdmin {
    pub fn validate(input: &NewStudent) -> Result<(), RegistrarError> {
        validate_id("student", &input.id)?;
        validate_text("full name", &input.full_name, MAX_NAME_LENGTH)?;
        validate_email(&input.email)
    }

    /// Register a new student, enrolled as of now.
    pub fn create<S: RecordStore + ?Sized>(
        store: &mut S,
        input: NewStudent,
    ) -> Result<Student, RegistrarError> {
        Self::create_at(store, input, Utc::now())
    }

    /// Register a new student with an explicit enrollment date.
    pub fn create_at<S: RecordStore + ?Sized>(
        store: &mut S,
        input: NewStudent,
        at: DateTime<Utc>,
    ) -> Result<Student, RegistrarError> {
        Self::validate(&input)?;
        let id = StudentId::new(input.id);
        if store.student(&id)?.is_some() {
            return Err(RegistrarError::InvalidState(format!(
                "Student {} already exists",
                id
            )));
        }
        let student = Student::new(id, input.full_name.trim(), input.email.trim(), at);
        store.insert_student(student.clone())?;
        Ok(student)
    }

    /// Change a student's name and/or email.
    pub fn update<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &StudentId,
        update: StudentUpdate,
    ) -> Result<Student, RegistrarError> {
        let mut student = Self::get(store, id)?;
        if let Some(name) = &update.full_name {
            validate_text("full name", name, MAX_NAME_LENGTH)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if let Some(name) = update.full_name {
            student.full_name = name.trim().to_string();
        }
        if let Some(email) = update.email {
            student.email = email.trim().to_string();
        }
        store.insert_student(student.clone())?;
        Ok(student)
    }

    /// Clear the active flag. Existing enrollments are left untouched.
    pub fn deactivate<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &StudentId,
    ) -> Result<Student, RegistrarError> {
        Self::set_active(store, id, false)
    }

    pub fn activate<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &StudentId,
    ) -> Result<Student, RegistrarError> {
        Self::set_active(store, id, true)
    }

    pub fn get<S: RecordStore + ?Sized>(
        store: &S,
        id: &StudentId,
    ) -> Result<Student, RegistrarError> {
        store
            .student(id)?
            .ok_or_else(|| RegistrarError::StudentNotFound(id.clone()))
    }

    pub fn list<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Student>, RegistrarError> {
        store.students()
    }

    pub fn list_active<S: RecordStore + ?Sized>(
        store: &S,
    ) -> Result<Vec<Student>, RegistrarError> {
        store.active_students()
    }

    fn set_active<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &StudentId,
        active: bool,
    ) -> Result<Student, RegistrarError> {
        let mut student = Self::get(store, id)?;
        if student.active != active {
            student.active = active;
            store.insert_student(student.clone())?;
        }
        Ok(student)
    }
}

// =============================================================================
// COURSE ADMINISTRATION
// =============================================================================

/// Course catalogue administration.
pub struct CourseAdmin;

impl CourseAdmin {
    pub fn validate(input: &NewCourse) -> Result<(), RegistrarError> {
        validate_id("course", &input.id)?;
        validate_text("title", &input.title, MAX_NAME_LENGTH)?;
        validate_credits(input.credits)?;
        validate_text("department", &input.department, MAX_LABEL_LENGTH)?;
        validate_text("semester", &input.semester, MAX_LABEL_LENGTH)?;
        validate_text("instructor id", &input.instructor_id, MAX_LABEL_LENGTH)
    }

    /// Create an active course.
    pub fn create<S: RecordStore + ?Sized>(
        store: &mut S,
        input: NewCourse,
    ) -> Result<Course, RegistrarError> {
        Self::validate(&input)?;
        let id = CourseId::new(input.id);
        if store.course(&id)?.is_some() {
            return Err(RegistrarError::InvalidState(format!(
                "Course {} already exists",
                id
            )));
        }
        let course = Course {
            id,
            title: input.title.trim().to_string(),
            credits: input.credits,
            department: input.department.trim().to_string(),
            semester: input.semester.trim().to_string(),
            instructor_id: input.instructor_id.trim().to_string(),
            active: true,
        };
        store.insert_course(course.clone())?;
        Ok(course)
    }

    /// Change course fields.
    ///
    /// Credit-hours cannot change while ACTIVE enrollments exist, since that
    /// would silently move enrolled students past the credit cap.
    pub fn update<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &CourseId,
        update: CourseUpdate,
    ) -> Result<Course, RegistrarError> {
        let mut course = Self::get(store, id)?;

        if let Some(title) = &update.title {
            validate_text("title", title, MAX_NAME_LENGTH)?;
        }
        if let Some(credits) = update.credits {
            validate_credits(credits)?;
            if credits != course.credits
                && EnrollmentEngine::active_enrollment_count(store, id)? > 0
            {
                return Err(RegistrarError::InvalidState(format!(
                    "Course {} has active enrollments; credits cannot change",
                    id
                )));
            }
        }
        if let Some(department) = &update.department {
            validate_text("department", department, MAX_LABEL_LENGTH)?;
        }
        if let Some(semester) = &update.semester {
            validate_text("semester", semester, MAX_LABEL_LENGTH)?;
        }
        if let Some(instructor) = &update.instructor_id {
            validate_text("instructor id", instructor, MAX_LABEL_LENGTH)?;
        }

        if let Some(title) = update.title {
            course.title = title.trim().to_string();
        }
        if let Some(credits) = update.credits {
            course.credits = credits;
        }
        if let Some(department) = update.department {
            course.department = department.trim().to_string();
        }
        if let Some(semester) = update.semester {
            course.semester = semester.trim().to_string();
        }
        if let Some(instructor) = update.instructor_id {
            course.instructor_id = instructor.trim().to_string();
        }

        store.insert_course(course.clone())?;
        Ok(course)
    }

    /// Clear the active flag. Existing enrollments are left untouched.
    pub fn deactivate<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &CourseId,
    ) -> Result<Course, RegistrarError> {
        Self::set_active(store, id, false)
    }

    pub fn activate<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &CourseId,
    ) -> Result<Course, RegistrarError> {
        Self::set_active(store, id, true)
    }

    pub fn get<S: RecordStore + ?Sized>(
        store: &S,
        id: &CourseId,
    ) -> Result<Course, RegistrarError> {
        store
            .course(id)?
            .ok_or_else(|| RegistrarError::CourseNotFound(id.clone()))
    }

    pub fn list<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Course>, RegistrarError> {
        store.courses()
    }

    pub fn list_active<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<Course>, RegistrarError> {
        store.active_courses()
    }

    /// Number of ACTIVE enrollments in an existing course.
    pub fn enrollment_count<S: RecordStore + ?Sized>(
        store: &S,
        id: &CourseId,
    ) -> Result<usize, RegistrarError> {
        Self::get(store, id)?;
        EnrollmentEngine::active_enrollment_count(store, id)
    }

    fn set_active<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &CourseId,
        active: bool,
    ) -> Result<Course, RegistrarError> {
        let mut course = Self::get(store, id)?;
        if course.active != active {
            course.active = active;
            store.insert_course(course.clone())?;
        }
        Ok(course)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_student(id: &str) -> NewStudent {
        NewStudent {
            id: id.to_string(),
            full_name: "Barbara Liskov".to_string(),
            email: "barbara@example.edu".to_string(),
        }
    }

    fn new_course(id: &str, credits: u32) -> NewCourse {
        NewCourse {
            id: id.to_string(),
            title: "Programming Languages".to_string(),
            credits,
            department: "CS".to_string(),
            semester: "FALL".to_string(),
            instructor_id: "I1".to_string(),
        }
    }

    #[test]
    fn create_rejects_duplicates() {
        let mut store = MemoryStore::new();
        StudentAdmin::create(&mut store, new_student("S1")).expect("create");
        assert!(matches!(
            StudentAdmin::create(&mut store, new_student("S1")),
            Err(RegistrarError::InvalidState(_))
        ));

        CourseAdmin::create(&mut store, new_course("CS1", 3)).expect("create");
        assert!(matches!(
            CourseAdmin::create(&mut store, new_course("CS1", 3)),
            Err(RegistrarError::InvalidState(_))
        ));
    }

    #[test]
    fn student_input_is_validated() {
        let mut store = MemoryStore::new();
        let mut bad = new_student("S 1");
        assert!(matches!(
            StudentAdmin::create(&mut store, bad.clone()),
            Err(RegistrarError::InvalidInput(_))
        ));
        bad.id = "S1".to_string();
        bad.email = "not-an-email".to_string();
        assert!(matches!(
            StudentAdmin::create(&mut store, bad.clone()),
            Err(RegistrarError::InvalidInput(_))
        ));
        bad.email = "x@example.edu".to_string();
        bad.full_name = "   ".to_string();
        assert!(matches!(
            StudentAdmin::create(&mut store, bad),
            Err(RegistrarError::InvalidInput(_))
        ));
        assert_eq!(store.student_count().expect("count"), 0);
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a@@b.co").is_err());
        assert!(validate_email("a b@c.co").is_err());
    }

    #[test]
    fn course_credits_bounded() {
        let mut store = MemoryStore::new();
        assert!(CourseAdmin::create(&mut store, new_course("C0", 0)).is_err());
        assert!(CourseAdmin::create(&mut store, new_course("C13", MAX_COURSE_CREDITS + 1)).is_err());
        assert!(CourseAdmin::create(&mut store, new_course("C12", MAX_COURSE_CREDITS)).is_ok());
    }

    #[test]
    fn update_student_changes_only_given_fields() {
        let mut store = MemoryStore::new();
        StudentAdmin::create(&mut store, new_student("S1")).expect("create");
        let updated = StudentAdmin::update(
            &mut store,
            &StudentId::new("S1"),
            StudentUpdate {
                email: Some("new@example.edu".to_string()),
                ..StudentUpdate::default()
            },
        )
        .expect("update");

        assert_eq!(updated.email, "new@example.edu");
        assert_eq!(updated.full_name, "Barbara Liskov");
        assert!(matches!(
            StudentAdmin::update(&mut store, &StudentId::new("S9"), StudentUpdate::default()),
            Err(RegistrarError::StudentNotFound(_))
        ));
    }

    #[test]
    fn credit_change_blocked_by_active_enrollment() {
        let mut store = MemoryStore::new();
        StudentAdmin::create(&mut store, new_student("S1")).expect("student");
        CourseAdmin::create(&mut store, new_course("CS1", 3)).expect("course");
        EnrollmentEngine::enroll_student(&mut store, &StudentId::new("S1"), &CourseId::new("CS1"))
            .expect("enroll");

        let change = CourseUpdate {
            credits: Some(4),
            ..CourseUpdate::default()
        };
        assert!(matches!(
            CourseAdmin::update(&mut store, &CourseId::new("CS1"), change),
            Err(RegistrarError::InvalidState(_))
        ));

        let rename = CourseUpdate {
            title: Some("Renamed".to_string()),
            credits: Some(3),
            ..CourseUpdate::default()
        };
        let course = CourseAdmin::update(&mut store, &CourseId::new("CS1"), rename).expect("ok");
        assert_eq!(course.title, "Renamed");
        assert_eq!(
            CourseAdmin::enrollment_count(&store, &CourseId::new("CS1")).expect("count"),
            1
        );
    }

    #[test]
    fn deactivate_and_activate() {
        let mut store = MemoryStore::new();
        StudentAdmin::create(&mut store, new_student("S1")).expect("create");
        StudentAdmin::create(&mut store, new_student("S2")).expect("create");
        StudentAdmin::deactivate(&mut store, &StudentId::new("S1")).expect("deactivate");

        assert_eq!(StudentAdmin::list(&store).expect("all").len(), 2);
        assert_eq!(StudentAdmin::list_active(&store).expect("active").len(), 1);

        let s = StudentAdmin::activate(&mut store, &StudentId::new("S1")).expect("activate");
        assert!(s.active);
    }
}
