use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use medsched_core::*;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "medsched")]
#[command(about = "Medication intake scheduler and reminder tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print records as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List active medications, soonest intake first (default)
    List,

    /// Show one medication
    Show { id: MedicationId },

    /// Register a new medication
    Add(MedicationArgs),

    /// Replace a medication's details
    Update {
        id: MedicationId,

        #[command(flatten)]
        args: MedicationArgs,
    },

    /// Stop tracking a medication (kept for history)
    Delete { id: MedicationId },

    /// Record an intake and schedule the next one
    Taken { id: MedicationId },

    /// Find medications by name (case-insensitive)
    Search {
        #[arg(default_value = "")]
        fragment: String,
    },

    /// Show medications due for a reminder
    Remind {
        /// Time of day to check against (defaults to now)
        #[arg(long, value_name = "HH:MM[:SS]")]
        at: Option<IntakeTime>,
    },
}

#[derive(Args)]
struct MedicationArgs {
    #[arg(long)]
    name: String,

    #[arg(long)]
    dosage: String,

    /// Free text, up to 500 characters. Omitting it on update clears it.
    #[arg(long)]
    description: Option<String>,

    /// Hours between intakes (1-24)
    #[arg(long = "every", value_name = "HOURS")]
    frequency_hours: i64,

    /// Next intake time of day
    #[arg(long = "next", value_name = "HH:MM[:SS]")]
    next_intake_time: IntakeTime,

    /// Treatment start, e.g. 2025-01-01T08:00:00 (add: defaults to now; update: required)
    #[arg(long, value_name = "DATETIME")]
    start: Option<NaiveDateTime>,

    /// Treatment end
    #[arg(long, value_name = "DATETIME")]
    end: Option<NaiveDateTime>,

    /// Enable reminders (true/false). Omitted means true.
    #[arg(long, value_name = "BOOL")]
    reminder: Option<bool>,
}

impl MedicationArgs {
    /// `default_start` fills a missing `--start`; with `None` the
    /// request is passed on without a start date and fails validation.
    fn into_request(self, default_start: Option<NaiveDateTime>) -> MedicationRequest {
        MedicationRequest {
            name: Some(self.name),
            dosage: Some(self.dosage),
            description: self.description,
            frequency_hours: Some(self.frequency_hours),
            next_intake_time: Some(self.next_intake_time),
            start_date: self.start.or(default_start),
            end_date: self.end,
            reminder_active: self.reminder,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    medsched_core::logging::init_with_level(&config.logging.level);
    match cli.config {
        Some(ref path) => tracing::debug!("Loaded config from {:?}", path),
        None => tracing::debug!(
            "Using config at {:?} (defaults if absent)",
            Config::default_config_path()
        ),
    }

    // Determine data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let mut service = SchedulingService::new(JsonFileStore::in_dir(&data_dir));
    let json = cli.json;

    match cli.command.unwrap_or(Commands::List) {
        Commands::List => {
            let meds = service.list_all()?;
            print_medications(&meds, json, "No active medications.")
        }
        Commands::Show { id } => {
            let med = service.get_by_id(id)?;
            print_medication(&med, json)
        }
        Commands::Add(args) => {
            let request = args.into_request(Some(SystemClock.now()));
            let med = service.create(request)?;
            if !json {
                println!("✓ Added medication {}", med.id);
            }
            print_medication(&med, json)
        }
        Commands::Update { id, args } => {
            let request = args.into_request(None);
            let med = service.update(id, request)?;
            if !json {
                println!("✓ Updated medication {}", med.id);
            }
            print_medication(&med, json)
        }
        Commands::Delete { id } => {
            service.delete(id)?;
            if json {
                println!("{}", serde_json::json!({ "id": id, "deleted": true }));
            } else {
                println!("✓ Medication {} deleted", id);
            }
            Ok(())
        }
        Commands::Taken { id } => {
            let med = service.mark_taken(id)?;
            if json {
                print_medication(&med, json)
            } else {
                println!(
                    "✓ {} taken, next intake at {}",
                    med.name, med.next_intake_time
                );
                Ok(())
            }
        }
        Commands::Search { fragment } => {
            let meds = service.search_by_name(&fragment)?;
            print_medications(&meds, json, "No medications match.")
        }
        Commands::Remind { at } => {
            let due = service.process_reminders(at)?;
            print_medications(&due, json, "Nothing due.")
        }
    }
}

fn print_medications(meds: &[Medication], json: bool, empty_message: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(meds)?);
        return Ok(());
    }

    if meds.is_empty() {
        println!("{}", empty_message);
        return Ok(());
    }

    println!(
        "{:>4}  {:<8}  {:>5}  {:<8}  {:<20}  {}",
        "ID", "NEXT", "EVERY", "REMINDER", "NAME", "DOSAGE"
    );
    for med in meds {
        println!(
            "{:>4}  {:<8}  {:>5}  {:<8}  {:<20}  {}",
            med.id,
            med.next_intake_time.to_string(),
            med.frequency_hours.to_string(),
            if med.reminder_active { "on" } else { "off" },
            med.name,
            med.dosage
        );
    }
    Ok(())
}

fn print_medication(med: &Medication, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(med)?);
        return Ok(());
    }

    println!("  {} ({})", med.name, med.dosage);
    if let Some(ref description) = med.description {
        println!("  {}", description);
    }
    println!("  Every {}, next intake at {}", med.frequency_hours, med.next_intake_time);
    match med.end_date {
        Some(end) => println!("  Treatment: {} to {}", med.start_date, end),
        None => println!("  Treatment: from {}", med.start_date),
    }
    println!(
        "  Reminders: {}",
        if med.reminder_active { "on" } else { "off" }
    );
    Ok(())
}
