//! Clinic roster command line.
//!
//! Drives the roster state machine against the configured sheet, or runs the
//! stub sheet server locally.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use clinic_roster::config::{BackendKind, Config};
use clinic_roster::models::{
    Department, EmployeeDraft, EmployeeId, EmployeeRecord, EmploymentStatus, EmploymentType,
};
use clinic_roster::roster::RosterState;
use clinic_roster::sheet;
use clinic_roster::sync::RemoteSyncClient;

#[derive(Parser)]
#[command(name = "clinic-roster")]
#[command(version)]
#[command(about = "Manage the clinic's employee roster sheet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Roster(RosterCommand),

    /// Run the local stub sheet server
    Serve {
        /// Leave ids out of webhook create responses
        #[arg(long)]
        no_echo_ids: bool,
    },
}

/// Commands that work on the remote roster.
#[derive(Subcommand)]
enum RosterCommand {
    /// List all employees
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one employee
    Show { id: i64 },

    /// Create an employee
    Add(FieldArgs),

    /// Edit an employee; only the given fields change
    Edit {
        id: i64,
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Delete an employee
    Remove { id: i64 },
}

/// Form fields. An empty string clears an optional field.
#[derive(Args, Debug, Default)]
struct FieldArgs {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    /// Full name, split into first and last
    #[arg(long, conflicts_with_all = ["first_name", "last_name"])]
    name: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    job_title: Option<String>,
    #[arg(long, value_parser = parse_department)]
    department: Option<Department>,
    #[arg(long, value_parser = parse_status)]
    status: Option<EmploymentStatus>,
    #[arg(long, value_parser = parse_employment_type)]
    employment_type: Option<EmploymentType>,
    #[arg(long)]
    phone: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    start_date: Option<NaiveDate>,
    #[arg(long)]
    salary: Option<String>,
    #[arg(long)]
    street: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip_code: Option<String>,
    #[arg(long)]
    emergency_contact: Option<String>,
    #[arg(long)]
    emergency_phone: Option<String>,
    #[arg(long)]
    qualifications: Option<String>,
    #[arg(long)]
    photo_url: Option<String>,
}

impl FieldArgs {
    fn apply(&self, draft: &mut EmployeeDraft) {
        if let Some(name) = &self.name {
            draft.set_full_name(name);
        }
        set(&mut draft.first_name, &self.first_name);
        set(&mut draft.last_name, &self.last_name);
        set(&mut draft.email, &self.email);
        set(&mut draft.job_title, &self.job_title);

        if let Some(department) = self.department {
            draft.department = Some(department);
        }
        if let Some(status) = self.status {
            draft.status = status;
        }
        if let Some(employment_type) = self.employment_type {
            draft.employment_type = employment_type;
        }
        if let Some(start_date) = self.start_date {
            draft.start_date = Some(start_date);
        }

        set_optional(&mut draft.phone, &self.phone);
        set_optional(&mut draft.salary, &self.salary);
        set_optional(&mut draft.address.street, &self.street);
        set_optional(&mut draft.address.city, &self.city);
        set_optional(&mut draft.address.state, &self.state);
        set_optional(&mut draft.address.zip_code, &self.zip_code);
        set_optional(&mut draft.emergency_contact.name, &self.emergency_contact);
        set_optional(&mut draft.emergency_contact.phone, &self.emergency_phone);
        set_optional(&mut draft.qualifications, &self.qualifications);
        set_optional(&mut draft.photo_url, &self.photo_url);
    }
}

fn set(field: &mut String, value: &Option<String>) {
    if let Some(value) = value {
        *field = value.trim().to_string();
    }
}

fn set_optional(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        *field = (!value.is_empty()).then(|| value.to_string());
    }
}

fn parse_department(s: &str) -> Result<Department, String> {
    Department::parse(s).ok_or_else(|| {
        let names: Vec<&str> = Department::ALL.iter().map(|d| d.as_str()).collect();
        format!("expected one of: {}", names.join(", "))
    })
}

fn parse_status(s: &str) -> Result<EmploymentStatus, String> {
    EmploymentStatus::parse(s).ok_or_else(|| "expected Active, On Leave or Inactive".to_string())
}

fn parse_employment_type(s: &str) -> Result<EmploymentType, String> {
    EmploymentType::parse(s)
        .ok_or_else(|| "expected Full-time, Part-time, Contract or Temporary".to_string())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    // Initialize logging; stdout is reserved for command output
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve { no_echo_ids } => {
            if no_echo_ids {
                config.echo_ids = false;
            }
            sheet::serve(config).await
        }
        Commands::Roster(command) => run_roster(command, &config).await,
    }
}

async fn run_roster(
    command: RosterCommand,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = RemoteSyncClient::from_config(config)?;
    let mut state = RosterState::new(client, config.id_policy);

    if !state.load().await {
        return Err(format!(
            "could not load employees from the {} sheet at {}",
            backend_label(config.backend),
            config.endpoint
        )
        .into());
    }

    match command {
        RosterCommand::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(state.roster())?);
            } else {
                print_table(state.roster());
            }
        }
        RosterCommand::Show { id } => {
            let record = state
                .get(EmployeeId(id))
                .ok_or_else(|| format!("employee {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(record)?);
        }
        RosterCommand::Add(fields) => {
            state.begin_create()?;
            fields.apply(state.draft_mut());
            let record = state.submit().await?;
            println!("Created employee {} ({})", record.id, record.full_name());
        }
        RosterCommand::Edit { id, fields } => {
            state.begin_edit(EmployeeId(id))?;
            fields.apply(state.draft_mut());
            let record = state.submit().await?;
            println!("Updated employee {} ({})", record.id, record.full_name());
        }
        RosterCommand::Remove { id } => {
            state.delete(EmployeeId(id)).await?;
            println!("Deleted employee {}", id);
        }
    }

    Ok(())
}

fn backend_label(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::AppsScript => "Apps Script",
        BackendKind::Sheety => "Sheety",
    }
}

fn print_table(records: &[EmployeeRecord]) {
    if records.is_empty() {
        println!("No employees.");
        return;
    }

    println!(
        "{:>4}  {:<24} {:<28} {:<24} {:<11} {}",
        "ID", "NAME", "EMAIL", "POSITION", "DEPARTMENT", "STATUS"
    );
    for record in records {
        let department = record
            .fields
            .department
            .map(|d| d.as_str())
            .unwrap_or("-");
        println!(
            "{:>4}  {:<24} {:<28} {:<24} {:<11} {}",
            record.id,
            record.full_name(),
            record.fields.email,
            record.fields.job_title,
            department,
            record.fields.status
        );
    }
    println!("\n{} employees", records.len());
}
