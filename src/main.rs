//! Clinic Intake: operator command line.
//!
//! Records, edits, lists and searches appointments in the local database.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clinic_intake::adapters::sanitize::SanitizingMakeWriter;
use clinic_intake::adapters::secrets;
use clinic_intake::adapters::sqlite::SqliteStorage;
use clinic_intake::config::IntakeConfig;
use clinic_intake::domain::{format_timestamp, parse_timestamp};
use clinic_intake::{
    AppointmentDetails, AppointmentRecord, AppointmentStore, FieldCipher, Gender, ListedRow,
};

#[derive(Parser)]
#[command(name = "clinic-intake")]
#[command(about = "Appointment intake with encrypted ID and phone columns")]
#[command(version)]
struct Cli {
    /// Database file (overrides INTAKE_DB_PATH)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new appointment
    Add(AddArgs),

    /// Show one appointment
    Show { id: i64 },

    /// List all appointments by appointment time
    List,

    /// Find appointments by customer name or phone substring
    Search { keyword: String },

    /// Change fields of an existing appointment
    Edit {
        id: i64,

        #[command(flatten)]
        changes: EditArgs,
    },

    /// Delete an appointment
    Delete { id: i64 },

    /// Print the number of stored appointments
    Count,
}

#[derive(Args)]
struct AddArgs {
    /// Customer name
    #[arg(long)]
    name: String,

    /// 女/男/其他 (or female/male/other)
    #[arg(long, default_value = "女")]
    gender: Gender,

    #[arg(long, default_value_t = 25)]
    age: u32,

    /// 18-character national ID
    #[arg(long)]
    national_id: String,

    /// 11-digit mobile number
    #[arg(long)]
    phone: String,

    /// "YYYY-MM-DD HH:MM" (default: one hour from now)
    #[arg(long, value_parser = parse_time)]
    time: Option<NaiveDateTime>,

    /// Service details
    #[arg(long, default_value = "")]
    service: String,

    /// Assigned staff member (default: first on the roster)
    #[arg(long)]
    staff: Option<String>,

    /// Department (default: first configured)
    #[arg(long)]
    department: Option<String>,

    /// Client's first visit
    #[arg(long)]
    first_visit: bool,

    /// Whole amount, digits only
    #[arg(long)]
    amount: String,

    #[arg(long, default_value = "")]
    notes: String,
}

#[derive(Args)]
struct EditArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    gender: Option<Gender>,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    national_id: Option<String>,

    #[arg(long)]
    phone: Option<String>,

    #[arg(long, value_parser = parse_time)]
    time: Option<NaiveDateTime>,

    #[arg(long)]
    service: Option<String>,

    #[arg(long)]
    staff: Option<String>,

    #[arg(long)]
    department: Option<String>,

    #[arg(long)]
    first_visit: Option<bool>,

    #[arg(long)]
    amount: Option<String>,

    #[arg(long)]
    notes: Option<String>,
}

impl EditArgs {
    fn apply(self, details: &mut AppointmentDetails) {
        macro_rules! set {
            ($($field:ident => $target:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { details.$target = v; })*
            };
        }
        set!(
            name => customer_name,
            gender => gender,
            age => age,
            national_id => national_id,
            phone => phone,
            time => appointment_time,
            service => service_description,
            staff => staff_assignee,
            department => department,
            first_visit => is_first_visit,
            amount => amount,
            notes => notes,
        );
    }
}

fn parse_time(text: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(text).map_err(|e| format!("expected \"YYYY-MM-DD HH:MM\": {e}"))
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    File,
    Stdout,
    Stderr,
}

/// Resolve `INTAKE_LOG_MODE`.
///
/// `auto` (and anything unrecognised) logs to stderr on a terminal and to the
/// log file otherwise, so piped record output stays parseable.
fn log_target(mode: &str, interactive: bool) -> LogTarget {
    match mode {
        "file" => LogTarget::File,
        "stdout" => LogTarget::Stdout,
        "stderr" => LogTarget::Stderr,
        // auto
        _ if interactive => LogTarget::Stderr,
        _ => LogTarget::File,
    }
}

fn init_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("INTAKE_LOG_MODE").unwrap_or_else(|_| "auto".to_string());
    let interactive = std::io::stdout().is_terminal();

    let (writer, guard) = match log_target(&log_mode, interactive) {
        LogTarget::File => {
            let log_file = std::env::var("INTAKE_LOG_FILE")
                .unwrap_or_else(|_| "clinic-intake.log".to_string());

            if let Some(parent) = std::path::Path::new(&log_file).parent() {
                // Best-effort: don't fail startup just because the directory is missing.
                let _ = std::fs::create_dir_all(parent);
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .with_context(|| format!("Cannot open log file {log_file}"))?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging()?;

    let mut config = IntakeConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let key = secrets::load_field_key()?;
    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("Cannot open database {}", config.db_path.display()))?;
    let store = AppointmentStore::new(storage, FieldCipher::new(key), config.rosters);

    let result = run(&store, cli.command, cli.json);
    store.into_storage().close()?;
    result
}

fn run(store: &AppointmentStore<SqliteStorage>, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Add(args) => {
            let rosters = store.rosters();
            let now = chrono::Local::now().naive_local();
            let details = AppointmentDetails {
                customer_name: args.name,
                gender: args.gender,
                age: args.age,
                national_id: args.national_id,
                phone: args.phone,
                appointment_time: args
                    .time
                    .unwrap_or_else(|| AppointmentDetails::default_appointment_time(now)),
                service_description: args.service,
                staff_assignee: args
                    .staff
                    .or_else(|| rosters.staff.first().cloned())
                    .unwrap_or_default(),
                department: args
                    .department
                    .or_else(|| rosters.departments.first().cloned())
                    .unwrap_or_default(),
                is_first_visit: args.first_visit,
                amount: args.amount,
                notes: args.notes,
            };
            let id = store.create(details)?;
            println!("Registered appointment {id}");
        }
        Commands::Show { id } => {
            let record = store.get(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }
        }
        Commands::List => {
            let rows = store.list()?;
            print_rows(&rows, json)?;
            if !json {
                println!("Total appointments: {}", store.count()?);
            }
        }
        Commands::Search { keyword } => {
            let rows = store.search(&keyword)?;
            print_rows(&rows, json)?;
            if !json {
                println!("Found {} results", rows.len());
            }
        }
        Commands::Edit { id, changes } => {
            let mut details = store.get(id)?.details;
            changes.apply(&mut details);
            store.update(id, details)?;
            println!("Updated appointment {id}");
        }
        Commands::Delete { id } => {
            store.delete(id)?;
            println!("Deleted appointment {id}");
        }
        Commands::Count => println!("{}", store.count()?),
    }
    Ok(())
}

fn print_record(record: &AppointmentRecord) {
    let d = &record.details;
    let rows = [
        ("ID", record.id.to_string()),
        ("客户姓名", d.customer_name.clone()),
        ("性别", d.gender.to_string()),
        ("年龄", d.age.to_string()),
        ("身份证号", d.national_id.clone()),
        ("联系电话", d.phone.clone()),
        ("预约时间", format_timestamp(&d.appointment_time)),
        ("项目", d.service_description.clone()),
        ("设计总监", d.staff_assignee.clone()),
        ("所属部门", d.department.clone()),
        ("首次登记", record.first_visit_label().to_string()),
        ("金额", d.amount.clone()),
        ("备注", d.notes.clone()),
        ("登记时间", format_timestamp(&record.submit_time)),
    ];
    for (label, value) in rows {
        println!("{label}: {value}");
    }
}

fn print_rows(rows: &[ListedRow], json: bool) -> Result<()> {
    if json {
        let values: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| match row {
                Ok(listed) => serde_json::json!({
                    "record": listed.record,
                    "expired": listed.expired,
                }),
                Err(corrupt) => serde_json::json!({
                    "id": corrupt.id,
                    "error": corrupt.source.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    for row in rows {
        match row {
            Ok(listed) => {
                let r = &listed.record;
                let d = &r.details;
                println!(
                    "{:>5}  {}{}  {}  {}  {}  {}  {}  {}  {}  {}  {}  {}  {}",
                    r.id,
                    format_timestamp(&d.appointment_time),
                    if listed.expired { " (已过期)" } else { "" },
                    d.customer_name,
                    d.gender,
                    d.age,
                    d.national_id,
                    d.phone,
                    d.service_description,
                    d.staff_assignee,
                    d.department,
                    r.first_visit_label(),
                    d.amount,
                    d.notes,
                );
            }
            Err(corrupt) => println!("{:>5}  <unreadable: {}>", corrupt.id, corrupt.source),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_log_modes() {
        for interactive in [true, false] {
            assert_eq!(log_target("file", interactive), LogTarget::File);
            assert_eq!(log_target("stdout", interactive), LogTarget::Stdout);
            assert_eq!(log_target("stderr", interactive), LogTarget::Stderr);
        }
    }

    #[test]
    fn test_auto_log_mode_follows_terminal() {
        assert_eq!(log_target("auto", true), LogTarget::Stderr);
        assert_eq!(log_target("auto", false), LogTarget::File);
        assert_eq!(log_target("", false), LogTarget::File);
    }

    #[test]
    fn test_cli_parses_edit_with_partial_changes() {
        let cli = Cli::try_parse_from(["clinic-intake", "edit", "7", "--phone", "13912345678"])
            .expect("Should parse");
        match cli.command {
            Commands::Edit { id, changes } => {
                assert_eq!(id, 7);
                assert_eq!(changes.phone.as_deref(), Some("13912345678"));
                assert!(changes.name.is_none());
            }
            _ => panic!("Expected edit command"),
        }
    }
}
