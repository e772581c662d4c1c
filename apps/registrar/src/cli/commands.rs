//! # CLI Command Implementations
//!
//! Every command loads the registrar from the configured backend, runs one
//! operation and, for the file backend, writes the snapshot back when the
//! operation mutated anything. redb commits inside the operation itself.

use super::{CourseCommand, ExportFormat, RecordKind, StudentCommand};
use crate::api;
use crate::config::{Backend, RegistrarConfig};
use registrar_core::{
    CanonicalRecords, CourseId, CourseUpdate, Criteria, MemoryStore, NewCourse, NewStudent,
    Registrar, RegistrarError, Score, SearchOperator, StoreSnapshot, StudentId, StudentUpdate,
    csv,
    export::{
        canonical_checksum, canonical_crypto_hash, export_records, import_canonical,
        verify_canonical, verify_crypto_hash,
    },
    formats::{MAX_SNAPSHOT_SIZE, snapshot_from_bytes, snapshot_to_bytes},
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a CSV file accepted by `import-csv` (50 MB).
const MAX_CSV_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum size of an export accepted by `import` (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RegistrarError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RegistrarError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RegistrarError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
///
/// Canonicalizing resolves `..` and symlinks before anything is read.
fn validate_file_path(path: &Path) -> Result<PathBuf, RegistrarError> {
    let canonical = path.canonicalize().map_err(|e| {
        RegistrarError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RegistrarError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path: the parent directory must already exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, RegistrarError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RegistrarError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RegistrarError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RegistrarError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, RegistrarError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| RegistrarError::IoError(format!("Read file: {}", e)))
}

fn write_output(path: &Path, data: &[u8]) -> Result<PathBuf, RegistrarError> {
    let validated = validate_output_path(path)?;
    std::fs::write(&validated, data)
        .map_err(|e| RegistrarError::IoError(format!("Write file: {}", e)))?;
    Ok(validated)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), RegistrarError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RegistrarError::SerializationError(format!("JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

/// Open the registrar described by `config`.
///
/// A missing file database yields an empty registrar; it is created on the
/// first save. The configured credit cap always wins over the cap stored in
/// a snapshot.
pub fn load_registrar(config: &RegistrarConfig) -> Result<Registrar, RegistrarError> {
    let max_credits = config.max_credits_per_semester;
    match config.backend {
        Backend::Redb => Registrar::with_redb(&config.database, max_credits),
        Backend::File => {
            if !config.database.exists() {
                return Ok(Registrar::with_max_credits(max_credits));
            }
            validate_file_size(&config.database, MAX_SNAPSHOT_SIZE as u64)?;
            let data = std::fs::read(&config.database)
                .map_err(|e| RegistrarError::IoError(format!("Read db: {}", e)))?;
            let mut store = MemoryStore::from(snapshot_from_bytes(&data)?);
            store.set_max_credits(max_credits);
            Ok(Registrar::with_store(store))
        }
    }
}

/// Persist the registrar. redb writes are already durable.
pub fn save_registrar(
    registrar: &Registrar,
    config: &RegistrarConfig,
) -> Result<(), RegistrarError> {
    if registrar.is_persistent() {
        return Ok(());
    }
    let data = snapshot_to_bytes(&registrar.snapshot()?)?;
    std::fs::write(&config.database, &data)
        .map_err(|e| RegistrarError::IoError(format!("Write db: {}", e)))?;
    tracing::debug!(bytes = data.len(), "Snapshot written");
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server. With the file backend the snapshot is written
/// once the server shuts down.
pub async fn cmd_server(
    config: &RegistrarConfig,
    host: &str,
    port: u16,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;

    println!("Registrar Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:        {}", host);
    println!("  Port:        {}", port);
    println!("  Backend:     {}", config.backend);
    println!("  Database:    {:?}", config.database);
    println!("  Credit cap:  {}", config.max_credits_per_semester);
    println!();
    println!("Endpoints:");
    println!("  GET  /health                     - Health check");
    println!("  GET  /status                     - Record counts");
    println!("  GET  /students, POST /students   - List / create students");
    println!("  GET  /courses,  POST /courses    - List / create courses");
    println!("  POST /enrollments                - Enroll");
    println!("  POST /enrollments/withdraw       - Withdraw");
    println!("  POST /grades                     - Record a grade");
    println!("  POST /search                     - Field search");
    println!("  POST /export                     - Canonical export");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = api::AppState::new(registrar);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state.clone()).await?;

    let registrar = state.registrar.read().await;
    save_registrar(&registrar, config)
}

// =============================================================================
// STATUS / INIT
// =============================================================================

pub fn cmd_status(config: &RegistrarConfig, json_mode: bool) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let status = registrar.status()?;

    if json_mode {
        let output = serde_json::json!({
            "database": config.database.to_string_lossy(),
            "backend": config.backend.name(),
            "students": status.students,
            "active_students": status.active_students,
            "courses": status.courses,
            "active_courses": status.active_courses,
            "enrollments": status.enrollments,
            "active_enrollments": status.active_enrollments,
            "max_credits_per_semester": status.max_credits_per_semester,
        });
        return print_json(&output);
    }

    println!("Registrar Status");
    println!("================");
    println!("Database: {:?}", config.database);
    println!("Backend:  {}", config.backend);
    println!();
    println!(
        "Students:     {} ({} active)",
        status.students, status.active_students
    );
    println!(
        "Courses:      {} ({} active)",
        status.courses, status.active_courses
    );
    println!(
        "Enrollments:  {} ({} active)",
        status.enrollments, status.active_enrollments
    );
    println!("Credit cap:   {}", status.max_credits_per_semester);

    Ok(())
}

/// Initialize a new database.
pub fn cmd_init(config: &RegistrarConfig, force: bool) -> Result<(), RegistrarError> {
    if config.database.exists() {
        if !force {
            return Err(RegistrarError::InvalidState(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&config.database)
            .map_err(|e| RegistrarError::IoError(format!("Remove db: {}", e)))?;
    }

    match config.backend {
        Backend::Redb => {
            let _registrar = Registrar::with_redb(&config.database, config.max_credits_per_semester)?;
        }
        Backend::File => {
            let registrar = Registrar::with_max_credits(config.max_credits_per_semester);
            save_registrar(&registrar, config)?;
        }
    }
    println!(
        "Initialized new {} database at {:?}",
        config.backend, config.database
    );
    Ok(())
}

// =============================================================================
// STUDENT / COURSE ADMINISTRATION
// =============================================================================

pub fn cmd_student(
    config: &RegistrarConfig,
    json_mode: bool,
    action: StudentCommand,
) -> Result<(), RegistrarError> {
    let mut registrar = load_registrar(config)?;

    let (student, mutated) = match action {
        StudentCommand::Add { id, name, email } => {
            let student = registrar.create_student(NewStudent {
                id,
                full_name: name,
                email,
            })?;
            tracing::info!(student = %student.id, "Student created");
            (student, true)
        }
        StudentCommand::Update { id, name, email } => {
            let update = StudentUpdate {
                full_name: name,
                email,
            };
            (registrar.update_student(&StudentId::new(id), update)?, true)
        }
        StudentCommand::Deactivate { id } => {
            (registrar.deactivate_student(&StudentId::new(id))?, true)
        }
        StudentCommand::Activate { id } => (registrar.activate_student(&StudentId::new(id))?, true),
        StudentCommand::Show { id } => (registrar.get_student(&StudentId::new(id))?, false),
        StudentCommand::List { active } => {
            let students = if active {
                registrar.list_active_students()?
            } else {
                registrar.list_students()?
            };
            if json_mode {
                return print_json(&students);
            }
            println!("{} student(s)", students.len());
            for s in &students {
                println!(
                    "  {:<12} {:<30} {:<30} GPA {}{}",
                    s.id,
                    s.full_name,
                    s.email,
                    s.current_gpa,
                    if s.active { "" } else { "  [inactive]" }
                );
            }
            return Ok(());
        }
    };

    if mutated {
        save_registrar(&registrar, config)?;
    }

    if json_mode {
        return print_json(&student);
    }
    println!("Student {}", student.id);
    println!("  Name:      {}", student.full_name);
    println!("  Email:     {}", student.email);
    println!("  Active:    {}", student.active);
    println!("  GPA:       {}", student.current_gpa);
    println!("  Enrolled:  {}", student.enrolled_on.format("%Y-%m-%d"));
    if !student.enrolled_courses.is_empty() {
        let courses: Vec<&str> = student.enrolled_courses.iter().map(|c| c.as_str()).collect();
        println!("  Courses:   {}", courses.join(", "));
    }
    Ok(())
}

pub fn cmd_course(
    config: &RegistrarConfig,
    json_mode: bool,
    action: CourseCommand,
) -> Result<(), RegistrarError> {
    let mut registrar = load_registrar(config)?;

    let (course, mutated) = match action {
        CourseCommand::Add {
            id,
            title,
            credits,
            department,
            semester,
            instructor,
        } => {
            let course = registrar.create_course(NewCourse {
                id,
                title,
                credits,
                department,
                semester,
                instructor_id: instructor,
            })?;
            tracing::info!(course = %course.id, credits = course.credits, "Course created");
            (course, true)
        }
        CourseCommand::Update {
            id,
            title,
            credits,
            department,
            semester,
            instructor,
        } => {
            let update = CourseUpdate {
                title,
                credits,
                department,
                semester,
                instructor_id: instructor,
            };
            (registrar.update_course(&CourseId::new(id), update)?, true)
        }
        CourseCommand::Deactivate { id } => (registrar.deactivate_course(&CourseId::new(id))?, true),
        CourseCommand::Activate { id } => (registrar.activate_course(&CourseId::new(id))?, true),
        CourseCommand::Show { id } => (registrar.get_course(&CourseId::new(id))?, false),
        CourseCommand::List {
            active,
            department,
            semester,
            instructor,
        } => {
            let courses = registrar.filter_courses(|c| {
                (!active || c.active)
                    && department
                        .as_deref()
                        .is_none_or(|d| c.department.eq_ignore_ascii_case(d))
                    && semester
                        .as_deref()
                        .is_none_or(|s| c.semester.eq_ignore_ascii_case(s))
                    && instructor.as_deref().is_none_or(|i| c.instructor_id == i)
            })?;
            if json_mode {
                return print_json(&courses);
            }
            println!("{} course(s)", courses.len());
            for c in &courses {
                println!(
                    "  {:<10} {:<32} {:>2} cr  {:<8} {:<10}{}",
                    c.id,
                    c.title,
                    c.credits,
                    c.department,
                    c.semester,
                    if c.active { "" } else { "  [inactive]" }
                );
            }
            return Ok(());
        }
    };

    if mutated {
        save_registrar(&registrar, config)?;
    }

    let enrolled = registrar.course_enrollment_count(&course.id)?;
    if json_mode {
        let output = serde_json::json!({
            "course": course,
            "active_enrollments": enrolled,
        });
        return print_json(&output);
    }
    println!("Course {}", course.id);
    println!("  Title:       {}", course.title);
    println!("  Credits:     {}", course.credits);
    println!("  Department:  {}", course.department);
    println!("  Semester:    {}", course.semester);
    println!("  Instructor:  {}", course.instructor_id);
    println!("  Active:      {}", course.active);
    println!("  Enrolled:    {}", enrolled);
    Ok(())
}

// =============================================================================
// ENROLLMENT LIFECYCLE
// =============================================================================

pub fn cmd_enroll(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
    course: &str,
) -> Result<(), RegistrarError> {
    let mut registrar = load_registrar(config)?;
    let student = StudentId::new(student);
    let enrollment = registrar.enroll_student(&student, &CourseId::new(course))?;
    save_registrar(&registrar, config)?;
    tracing::info!(enrollment = %enrollment.id, "Enrollment created");

    if json_mode {
        return print_json(&enrollment);
    }
    println!(
        "Enrolled {} in {} (enrollment #{}); credit load now {}/{}",
        enrollment.student,
        enrollment.course,
        enrollment.id,
        registrar.credit_load(&student)?,
        registrar.max_credits_per_semester()
    );
    Ok(())
}

pub fn cmd_unenroll(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
    course: &str,
) -> Result<(), RegistrarError> {
    let mut registrar = load_registrar(config)?;
    let enrollment = registrar.unenroll_student(&StudentId::new(student), &CourseId::new(course))?;
    save_registrar(&registrar, config)?;

    if json_mode {
        return print_json(&enrollment);
    }
    println!(
        "Withdrew {} from {} (enrollment #{})",
        enrollment.student, enrollment.course, enrollment.id
    );
    Ok(())
}

pub fn cmd_grade(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
    course: &str,
    score: &str,
) -> Result<(), RegistrarError> {
    let score: Score = score.parse()?;
    let mut registrar = load_registrar(config)?;
    let student = StudentId::new(student);
    let enrollment = registrar.record_grade(&student, &CourseId::new(course), score)?;
    save_registrar(&registrar, config)?;

    if json_mode {
        return print_json(&enrollment);
    }
    let letter = enrollment
        .letter
        .map(|l| l.to_string())
        .unwrap_or_default();
    println!(
        "Recorded {} ({}) for {} in {}; GPA now {}",
        score,
        letter,
        enrollment.student,
        enrollment.course,
        registrar.gpa(&student)?
    );
    Ok(())
}

// =============================================================================
// DERIVED METRICS
// =============================================================================

pub fn cmd_gpa(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let student = StudentId::new(student);
    let gpa = registrar.gpa(&student)?;
    let average = registrar.weighted_average_score(&student)?;
    let load = registrar.credit_load(&student)?;
    let max = registrar.max_credits_per_semester();

    if json_mode {
        let output = serde_json::json!({
            "student": student,
            "gpa": gpa.to_string(),
            "weighted_average_score": average.map(|s| s.to_string()),
            "credit_load": load,
            "max_credits_per_semester": max,
        });
        return print_json(&output);
    }
    println!("Student:        {}", student);
    println!("GPA:            {}", gpa);
    match average {
        Some(score) => println!("Average score:  {}", score),
        None => println!("Average score:  n/a"),
    }
    println!("Credit load:    {}/{}", load, max);
    Ok(())
}

pub fn cmd_transcript(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let transcript = registrar.transcript(&StudentId::new(student))?;

    if json_mode {
        return print_json(&transcript);
    }
    println!("Transcript: {} ({})", transcript.full_name, transcript.student);
    println!("{}", "-".repeat(64));
    for row in &transcript.rows {
        println!(
            "  {:<10} {:<28} {:>2} cr  {:<10} {:>6} {}",
            row.course,
            row.title,
            row.credits,
            row.status,
            row.score.map(|s| s.to_string()).unwrap_or_default(),
            row.letter.map(|l| l.to_string()).unwrap_or_default()
        );
    }
    println!("{}", "-".repeat(64));
    println!("GPA:                {}", transcript.gpa);
    println!("Completed credits:  {}", transcript.completed_credits);
    println!("Active credits:     {}", transcript.active_credits);
    Ok(())
}

pub fn cmd_standing(
    config: &RegistrarConfig,
    json_mode: bool,
    student: &str,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let report = registrar.standing(&StudentId::new(student))?;

    if json_mode {
        return print_json(&report);
    }
    println!("Student:            {}", report.student);
    println!("Standing:           {}", report.standing);
    println!("GPA:                {}", report.metrics.gpa);
    println!("Completed courses:  {}", report.metrics.completed_courses);
    println!("Completed credits:  {}", report.metrics.completed_credits);
    println!("Active credits:     {}", report.metrics.active_credits);
    Ok(())
}

// =============================================================================
// SEARCH
// =============================================================================

/// Search one record family. Without an operator the loose field lookup
/// is used (substring on text, exact on flags).
pub fn cmd_search(
    config: &RegistrarConfig,
    json_mode: bool,
    kind: RecordKind,
    field: &str,
    value: &str,
    operator: Option<&str>,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let criteria = match operator {
        Some(op) => Some(Criteria::new(field, value, op.parse::<SearchOperator>()?)),
        None => None,
    };

    match kind {
        RecordKind::Students => {
            let found = match &criteria {
                Some(c) => registrar.search_students(c)?,
                None => registrar.find_students(field, value)?,
            };
            if json_mode {
                return print_json(&found);
            }
            println!("{} student(s) match", found.len());
            for s in &found {
                println!("  {:<12} {:<30} {}", s.id, s.full_name, s.email);
            }
        }
        RecordKind::Courses => {
            let found = match &criteria {
                Some(c) => registrar.search_courses(c)?,
                None => registrar.find_courses(field, value)?,
            };
            if json_mode {
                return print_json(&found);
            }
            println!("{} course(s) match", found.len());
            for c in &found {
                println!("  {:<10} {:<32} {:>2} cr", c.id, c.title, c.credits);
            }
        }
        RecordKind::Enrollments => {
            let found = match &criteria {
                Some(c) => registrar.search_enrollments(c)?,
                None => registrar.find_enrollments(field, value)?,
            };
            if json_mode {
                return print_json(&found);
            }
            println!("{} enrollment(s) match", found.len());
            for e in &found {
                println!(
                    "  #{:<6} {:<12} {:<10} {}",
                    e.id, e.student, e.course, e.status
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

pub fn cmd_export(
    config: &RegistrarConfig,
    output: &Path,
    format: ExportFormat,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let records = CanonicalRecords::from_store(registrar.store())?;

    let data = match format {
        ExportFormat::Canonical => export_records(&records)?,
        ExportFormat::Json => serde_json::to_vec_pretty(&records)
            .map_err(|e| RegistrarError::SerializationError(format!("JSON: {}", e)))?,
    };
    let path = write_output(output, &data)?;

    println!(
        "Exported {} students, {} courses, {} enrollments to {:?} ({} bytes)",
        records.students.len(),
        records.courses.len(),
        records.enrollments.len(),
        path,
        data.len()
    );
    Ok(())
}

/// Decode an export: canonical binary first, then JSON.
fn decode_export(data: &[u8]) -> Result<StoreSnapshot, RegistrarError> {
    match import_canonical(data) {
        Ok(snapshot) => Ok(snapshot),
        Err(canonical_err) => match serde_json::from_slice::<CanonicalRecords>(data) {
            Ok(records) => Ok(records.into_snapshot()),
            Err(_) => Err(canonical_err),
        },
    }
}

/// Merge every record from an export file into the registrar.
pub fn cmd_import(
    config: &RegistrarConfig,
    json_mode: bool,
    input: &Path,
) -> Result<(), RegistrarError> {
    let data = read_input(input, MAX_IMPORT_FILE_SIZE)?;
    let snapshot = decode_export(&data)?;

    let mut registrar = load_registrar(config)?;
    let summary = registrar.restore(snapshot)?;
    save_registrar(&registrar, config)?;
    tracing::info!(?summary, "Import merged");

    if json_mode {
        return print_json(&summary);
    }
    println!(
        "Merged {} students, {} courses; enrollments: {} added, {} updated, {} renumbered, {} unchanged",
        summary.students,
        summary.courses,
        summary.enrollments_added,
        summary.enrollments_updated,
        summary.enrollments_renumbered,
        summary.enrollments_unchanged
    );
    Ok(())
}

pub fn cmd_export_csv(
    config: &RegistrarConfig,
    kind: RecordKind,
    output: &Path,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let (text, rows) = match kind {
        RecordKind::Students => {
            let students = registrar.list_students()?;
            (csv::students_to_csv(&students), students.len())
        }
        RecordKind::Courses => {
            let courses = registrar.list_courses()?;
            (csv::courses_to_csv(&courses), courses.len())
        }
        RecordKind::Enrollments => {
            return Err(RegistrarError::InvalidInput(
                "CSV export supports students and courses only".to_string(),
            ));
        }
    };
    let path = write_output(output, text.as_bytes())?;
    println!("Wrote {} row(s) to {:?}", rows, path);
    Ok(())
}

pub fn cmd_import_csv(
    config: &RegistrarConfig,
    json_mode: bool,
    kind: RecordKind,
    input: &Path,
) -> Result<(), RegistrarError> {
    let data = read_input(input, MAX_CSV_FILE_SIZE)?;
    let text = String::from_utf8(data)
        .map_err(|e| RegistrarError::InvalidInput(format!("CSV is not UTF-8: {}", e)))?;

    let mut registrar = load_registrar(config)?;
    let (mut summary, malformed) = match kind {
        RecordKind::Students => {
            let parsed = csv::parse_students(&text)?;
            (registrar.import_students(parsed.rows), parsed.malformed)
        }
        RecordKind::Courses => {
            let parsed = csv::parse_courses(&text)?;
            (registrar.import_courses(parsed.rows), parsed.malformed)
        }
        RecordKind::Enrollments => {
            return Err(RegistrarError::InvalidInput(
                "CSV import supports students and courses only".to_string(),
            ));
        }
    };
    summary.skipped += malformed.len();
    summary.errors.extend(
        malformed
            .into_iter()
            .map(|(line, reason)| format!("line {}: {}", line, reason)),
    );
    save_registrar(&registrar, config)?;

    for error in &summary.errors {
        tracing::warn!("Skipped: {}", error);
    }
    if json_mode {
        return print_json(&summary);
    }
    println!(
        "Imported {} row(s), skipped {}",
        summary.imported, summary.skipped
    );
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

pub fn cmd_verify(
    config: &RegistrarConfig,
    json_mode: bool,
    input: &Path,
) -> Result<(), RegistrarError> {
    let data = read_input(input, MAX_IMPORT_FILE_SIZE)?;
    let registrar = load_registrar(config)?;
    let matches = verify_canonical(registrar.store(), &data)?;

    if json_mode {
        print_json(&serde_json::json!({ "matches": matches }))?;
    } else if matches {
        println!("Export matches the current records");
    }
    if !matches {
        return Err(RegistrarError::InvalidState(format!(
            "Export '{}' does not match the current records",
            input.display()
        )));
    }
    Ok(())
}

pub fn cmd_hash(
    config: &RegistrarConfig,
    json_mode: bool,
    expect: Option<&str>,
) -> Result<(), RegistrarError> {
    let registrar = load_registrar(config)?;
    let hash = canonical_crypto_hash(registrar.store())?;
    let checksum = canonical_checksum(registrar.store())?;

    if json_mode {
        let output = serde_json::json!({
            "blake3": hash,
            "checksum": checksum,
        });
        print_json(&output)?;
    } else {
        println!("BLAKE3:   {}", hash);
        println!("Checksum: {:016x}", checksum);
    }

    if let Some(expected) = expect
        && !verify_crypto_hash(registrar.store(), expected)?
    {
        return Err(RegistrarError::InvalidState(format!(
            "Hash mismatch: expected {}",
            expected.trim()
        )));
    }
    Ok(())
}

// =============================================================================
// MAINTENANCE
// =============================================================================

/// Compact the redb database file. The file backend is rewritten whole on
/// every save and has nothing to reclaim.
pub fn cmd_compact(config: &RegistrarConfig, json_mode: bool) -> Result<(), RegistrarError> {
    if config.backend != Backend::Redb {
        return Err(RegistrarError::InvalidInput(format!(
            "compact needs the redb backend, not {}",
            config.backend
        )));
    }
    let before = file_len(&config.database);
    let mut registrar = load_registrar(config)?;
    let compacted = registrar.compact()?;
    drop(registrar);
    let after = file_len(&config.database);
    tracing::info!(compacted, before, after, "Database compacted");

    if json_mode {
        let output = serde_json::json!({
            "compacted": compacted,
            "bytes_before": before,
            "bytes_after": after,
        });
        return print_json(&output);
    }
    println!("Compacted {:?}: {} -> {} bytes", config.database, before, after);
    Ok(())
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map_or(0, |m| m.len())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_database_loads_empty() {
        let dir = tempdir().expect("temp dir");
        let config = RegistrarConfig {
            database: dir.path().join("none.db"),
            backend: Backend::File,
            ..RegistrarConfig::default()
        };
        let registrar = load_registrar(&config).expect("load");
        assert!(!registrar.is_persistent());
        assert_eq!(registrar.status().expect("status").students, 0);
    }

    #[test]
    fn output_path_requires_existing_parent() {
        let dir = tempdir().expect("temp dir");
        assert!(validate_output_path(&dir.path().join("out.bin")).is_ok());
        assert!(validate_output_path(&dir.path().join("missing/out.bin")).is_err());
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("big.csv");
        std::fs::write(&path, vec![b'x'; 64]).expect("write");
        assert!(matches!(
            validate_file_size(&path, 10),
            Err(RegistrarError::InvalidInput(_))
        ));
    }

    #[test]
    fn decode_export_accepts_json() {
        let records = CanonicalRecords::from_snapshot(StoreSnapshot::default());
        let json = serde_json::to_vec(&records).expect("json");
        assert!(decode_export(&json).is_ok());
        assert!(decode_export(b"garbage").is_err());
    }

    #[test]
    fn file_backend_export_verifies_and_hash_checks() {
        let dir = tempdir().expect("temp dir");
        let config = RegistrarConfig {
            database: dir.path().join("records.db"),
            backend: Backend::File,
            ..RegistrarConfig::default()
        };
        cmd_student(
            &config,
            true,
            StudentCommand::Add {
                id: "S1".to_string(),
                name: "Ada Lovelace".to_string(),
                email: "ada@uni.edu".to_string(),
            },
        )
        .expect("add student");

        let reloaded = load_registrar(&config).expect("reload");
        assert!(reloaded.get_student(&StudentId::new("S1")).is_ok());

        let export = dir.path().join("export.bin");
        cmd_export(&config, &export, ExportFormat::Canonical).expect("export");
        cmd_verify(&config, true, &export).expect("verify");

        let hash = canonical_crypto_hash(reloaded.store()).expect("hash");
        cmd_hash(&config, true, Some(&hash)).expect("hash matches");
        assert!(cmd_hash(&config, true, Some("00")).is_err());

        cmd_student(
            &config,
            true,
            StudentCommand::Deactivate {
                id: "S1".to_string(),
            },
        )
        .expect("deactivate");
        assert!(matches!(
            cmd_verify(&config, true, &export),
            Err(RegistrarError::InvalidState(_))
        ));
        assert!(matches!(
            cmd_compact(&config, true),
            Err(RegistrarError::InvalidInput(_))
        ));
    }

    #[test]
    fn redb_backend_compacts_and_keeps_records() {
        let dir = tempdir().expect("temp dir");
        let config = RegistrarConfig {
            database: dir.path().join("records.redb"),
            backend: Backend::Redb,
            ..RegistrarConfig::default()
        };
        cmd_student(
            &config,
            true,
            StudentCommand::Add {
                id: "S1".to_string(),
                name: "Ada Lovelace".to_string(),
                email: "ada@uni.edu".to_string(),
            },
        )
        .expect("add student");

        cmd_compact(&config, true).expect("compact");
        let reloaded = load_registrar(&config).expect("reload");
        assert!(reloaded.get_student(&StudentId::new("S1")).is_ok());
    }
}
