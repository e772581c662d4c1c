//! # Registrar CLI Module
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `status` - Show record counts
//! - `student` / `course` - Record administration
//! - `enroll`, `unenroll`, `grade` - Enrollment lifecycle
//! - `gpa`, `transcript`, `standing` - Derived academic metrics
//! - `search` - Field search over any record type
//! - `export`, `import` - Canonical snapshot transfer
//! - `export-csv`, `import-csv` - Bulk student/course files
//! - `hash` - BLAKE3 hash of the canonical export
//! - `server` - Start the HTTP server

mod commands;

use crate::config::{Backend, RegistrarConfig};
use clap::{Parser, Subcommand, ValueEnum};
use registrar_core::RegistrarError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Registrar - academic records
///
/// Students, courses, enrollments and grades with credit-cap and
/// duplicate-enrollment rules enforced on every write.
#[derive(Parser, Debug)]
#[command(name = "registrar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the records database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Path to a TOML config file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Credit cap per semester (overrides the config file)
    #[arg(long, global = true)]
    pub max_credits: Option<u32>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Record families that support CSV and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecordKind {
    Students,
    Courses,
    Enrollments,
}

/// Canonical export encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    #[default]
    Canonical,
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show record counts
    Status,

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Manage students
    Student {
        #[command(subcommand)]
        action: StudentCommand,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommand,
    },

    /// Enroll a student in a course
    Enroll {
        #[arg(short, long)]
        student: String,
        #[arg(short, long)]
        course: String,
    },

    /// Withdraw a student's active enrollment
    Unenroll {
        #[arg(short, long)]
        student: String,
        #[arg(short, long)]
        course: String,
    },

    /// Record a numeric grade (0-100, up to two decimals)
    Grade {
        #[arg(short, long)]
        student: String,
        #[arg(short, long)]
        course: String,
        #[arg(short = 'g', long)]
        score: String,
    },

    /// Show a student's GPA and credit load
    Gpa {
        #[arg(short, long)]
        student: String,
    },

    /// Show a student's full transcript
    Transcript {
        #[arg(short, long)]
        student: String,
    },

    /// Show a student's academic standing
    Standing {
        #[arg(short, long)]
        student: String,
    },

    /// Search records by field
    Search {
        /// Record type to search
        #[arg(short = 'k', long, value_enum, default_value = "students")]
        kind: RecordKind,

        /// Field name (e.g. name, email, credits, department, status)
        #[arg(short, long)]
        field: String,

        /// Value to compare against
        #[arg(short = 'V', long)]
        value: String,

        /// equals, contains, starts_with, ends_with, greater_than, less_than.
        /// Omitted: substring match on text, exact match on flags.
        #[arg(short, long)]
        operator: Option<String>,
    },

    /// Export all records
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[arg(short = 't', long, value_enum, default_value = "canonical")]
        format: ExportFormat,
    },

    /// Merge records from a canonical or JSON export, renumbering id clashes
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write students or courses to a CSV file
    ExportCsv {
        #[arg(short = 'k', long, value_enum)]
        kind: RecordKind,

        #[arg(short, long)]
        output: PathBuf,
    },

    /// Create students or courses from a CSV file
    ImportCsv {
        #[arg(short = 'k', long, value_enum)]
        kind: RecordKind,

        #[arg(short, long)]
        input: PathBuf,
    },

    /// Check a canonical export against the current records
    Verify {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute BLAKE3 cryptographic hash of the records
    Hash {
        /// Expected hash; exits with an error when it does not match
        #[arg(short, long)]
        expect: Option<String>,
    },

    /// Reclaim free space in a redb database file
    Compact,
}

#[derive(Subcommand, Debug)]
pub enum StudentCommand {
    /// Register a new student
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Change a student's name or email
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    Deactivate {
        id: String,
    },
    Activate {
        id: String,
    },
    Show {
        id: String,
    },
    List {
        /// Only active students
        #[arg(long)]
        active: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseCommand {
    /// Create a new course
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        credits: u32,
        #[arg(long)]
        department: String,
        #[arg(long, default_value = "")]
        semester: String,
        #[arg(long, default_value = "")]
        instructor: String,
    },
    /// Change course details
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        credits: Option<u32>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
    },
    Deactivate {
        id: String,
    },
    Activate {
        id: String,
    },
    /// Show a course with its active enrollment count
    Show {
        id: String,
    },
    List {
        /// Only active courses
        #[arg(long)]
        active: bool,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long)]
        instructor: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), RegistrarError> {
    let config = RegistrarConfig::load(cli.config.as_deref())?.with_overrides(
        cli.database,
        cli.backend,
        cli.max_credits,
    )?;
    tracing::debug!(
        database = %config.database.display(),
        backend = %config.backend,
        max_credits = config.max_credits_per_semester,
        "Resolved configuration"
    );
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&config, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Student { action }) => cmd_student(&config, json_mode, action),
        Some(Commands::Course { action }) => cmd_course(&config, json_mode, action),
        Some(Commands::Enroll { student, course }) => {
            cmd_enroll(&config, json_mode, &student, &course)
        }
        Some(Commands::Unenroll { student, course }) => {
            cmd_unenroll(&config, json_mode, &student, &course)
        }
        Some(Commands::Grade {
            student,
            course,
            score,
        }) => cmd_grade(&config, json_mode, &student, &course, &score),
        Some(Commands::Gpa { student }) => cmd_gpa(&config, json_mode, &student),
        Some(Commands::Transcript { student }) => cmd_transcript(&config, json_mode, &student),
        Some(Commands::Standing { student }) => cmd_standing(&config, json_mode, &student),
        Some(Commands::Search {
            kind,
            field,
            value,
            operator,
        }) => cmd_search(&config, json_mode, kind, &field, &value, operator.as_deref()),
        Some(Commands::Export { output, format }) => cmd_export(&config, &output, format),
        Some(Commands::Import { input }) => cmd_import(&config, json_mode, &input),
        Some(Commands::ExportCsv { kind, output }) => cmd_export_csv(&config, kind, &output),
        Some(Commands::ImportCsv { kind, input }) => {
            cmd_import_csv(&config, json_mode, kind, &input)
        }
        Some(Commands::Verify { input }) => cmd_verify(&config, json_mode, &input),
        Some(Commands::Hash { expect }) => cmd_hash(&config, json_mode, expect.as_deref()),
        Some(Commands::Compact) => cmd_compact(&config, json_mode),
    }
}
