mod commands;
mod config;
mod remote;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::Client;
use crate::config::Config;
use crate::remote::HttpStore;
use stride_core::app::AppState;
use stride_core::auth::{AuthService, LocalIdentityProvider};
use stride_core::db::Database;
use stride_core::models::Measurements;
use stride_core::store::DocumentStore;

#[derive(Parser)]
#[command(
    name = "stride",
    version,
    about = "Track workouts, meals and body progress",
    long_about = "\n\n  ███████╗████████╗██████╗ ██╗██████╗ ███████╗
  ██╔════╝╚══██╔══╝██╔══██╗██║██╔══██╗██╔════╝
  ███████╗   ██║   ██████╔╝██║██║  ██║█████╗
  ╚════██║   ██║   ██╔══██╗██║██║  ██║██╔══╝
  ███████║   ██║   ██║  ██║██║██████╔╝███████╗
  ╚══════╝   ╚═╝   ╚═╝  ╚═╝╚═╝╚═════╝ ╚══════╝
          one step at a time.
"
)]
struct Cli {
    /// Document server URL (default: $STRIDE_REMOTE_URL, else the local database)
    #[arg(long, global = true, value_name = "URL")]
    remote: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        /// Display name
        name: String,
        /// Email address
        email: String,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign in with email and password
    Login {
        /// Email address
        email: String,
        /// Password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send a password reset for an account
    ResetPassword {
        /// Email address
        email: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show who is signed in
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Profile, workouts, today's nutrition and latest weight at a glance
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log and review workouts
    Workout {
        #[command(subcommand)]
        command: WorkoutCommands,
    },
    /// Log and review meals
    Meal {
        #[command(subcommand)]
        command: MealCommands,
    },
    /// Show the daily nutrition summary (defaults to today)
    Summary {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Track body weight, body fat and measurements
    Progress {
        #[command(subcommand)]
        command: ProgressCommands,
    },
    /// Manage weekly workout plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Show or edit your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Theme, units and notification settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },
    /// Start the REST API server over the local database
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(clap::Args)]
struct WorkoutFields {
    /// Exercise as NAME:SETS:REPS[:WEIGHT] (repeatable)
    #[arg(short, long = "exercise", value_name = "EXERCISE")]
    exercises: Vec<String>,
    /// Duration in minutes
    #[arg(long)]
    duration: Option<u32>,
    /// Calories burned
    #[arg(long)]
    calories: Option<f64>,
    /// Description
    #[arg(long)]
    description: Option<String>,
    /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
    #[arg(long)]
    date: Option<String>,
}

impl WorkoutFields {
    fn into_args(self, title: Option<String>) -> commands::WorkoutArgs {
        commands::WorkoutArgs {
            title,
            description: self.description,
            exercises: self.exercises,
            duration: self.duration,
            calories: self.calories,
            date: self.date,
        }
    }
}

#[derive(Subcommand)]
enum WorkoutCommands {
    /// Log a workout
    Add {
        /// Workout title
        title: String,
        #[command(flatten)]
        fields: WorkoutFields,
        /// Mark the workout as already completed
        #[arg(long)]
        completed: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List workouts, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a workout
    Show {
        /// Workout ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a workout (exercises given here replace the old list)
    Update {
        /// Workout ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: WorkoutFields,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a workout completed
    Complete {
        /// Workout ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a workout
    Delete {
        /// Workout ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MealCommands {
    /// Log a meal
    Log {
        /// Meal name
        name: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long = "type", default_value = "snack")]
        meal_type: String,
        /// Food as NAME:CALORIES:PROTEIN:CARBS:FAT[:QUANTITY[:SERVING]], per serving (repeatable)
        #[arg(short, long = "food", value_name = "FOOD")]
        foods: Vec<String>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the meals of a day
    List {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a meal
    Show {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a meal (foods given here replace the old list)
    Update {
        /// Meal ID
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New meal type: breakfast, lunch, dinner, snack
        #[arg(long = "type")]
        meal_type: Option<String>,
        /// Food as NAME:CALORIES:PROTEIN:CARBS:FAT[:QUANTITY[:SERVING]] (repeatable)
        #[arg(short, long = "food", value_name = "FOOD")]
        foods: Vec<String>,
        /// New date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a meal
    Delete {
        /// Meal ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProgressCommands {
    /// Record a progress entry
    Add {
        /// Body weight
        #[arg(short, long)]
        weight: Option<f64>,
        /// Body fat percentage
        #[arg(long)]
        body_fat: Option<f64>,
        #[arg(long)]
        chest: Option<f64>,
        #[arg(long)]
        waist: Option<f64>,
        #[arg(long)]
        hips: Option<f64>,
        #[arg(long)]
        arms: Option<f64>,
        #[arg(long)]
        thighs: Option<f64>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List progress entries, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// Create a weekly plan
    Create {
        /// Plan title
        title: String,
        /// Day title as DAY=TITLE, e.g. "mon=Push" (repeatable)
        #[arg(long = "day", value_name = "DAY=TITLE")]
        days: Vec<String>,
        /// Exercise as DAY=NAME:SETS:REPS (repeatable)
        #[arg(short, long = "exercise", value_name = "DAY=EXERCISE")]
        exercises: Vec<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// First day the plan applies (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Last day the plan applies (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Make this the active plan
        #[arg(long)]
        activate: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List plans
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a plan's week
    Show {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a plan the active one
    Activate {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a plan
    Delete {
        /// Plan ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update your profile
    Update {
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// Photo URL
        #[arg(long, conflicts_with = "clear_photo")]
        photo: Option<String>,
        /// Remove the photo URL
        #[arg(long)]
        clear_photo: bool,
        /// Height
        #[arg(long)]
        height: Option<f64>,
        /// Weight
        #[arg(long)]
        weight: Option<f64>,
        /// Goal (repeatable, replaces the old goals)
        #[arg(long = "goal", value_name = "GOAL", conflicts_with = "clear_goals")]
        goals: Vec<String>,
        /// Remove all goals
        #[arg(long)]
        clear_goals: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings
    Show {
        /// Also print the color palette in use
        #[arg(long)]
        palette: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the theme: light, dark, system, or toggle
    Theme {
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set units: metric or imperial
    Units {
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn notifications on or off (toggles when no value is given)
    Notifications {
        value: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore default settings
    Reset {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Logs go to stderr so `--json` output stays clean. `RUST_LOG` sets the
/// filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        let not_found = e
            .downcast_ref::<stride_core::Error>()
            .is_some_and(stride_core::Error::is_not_found);
        process::exit(if not_found { 2 } else { 1 });
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.remote)?;
    let db = Arc::new(Database::open(&config.db_path)?);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                Some(config.load_or_create_api_key()?)
            };
            server::start_server(db, port, &bind, api_key).await
        }
        command => {
            let client = connect(&config, db)?;
            dispatch(&client, command).await
        }
    }
}

/// Documents go to the remote server when one is configured; accounts and
/// settings always stay in the local database.
fn connect(config: &Config, db: Arc<Database>) -> Result<Client> {
    let store: Arc<dyn DocumentStore> = match &config.remote_url {
        Some(url) => {
            tracing::debug!(%url, "Using remote document store");
            Arc::new(HttpStore::new(url, config.remote_api_key.clone())?)
        }
        None => Arc::clone(&db) as Arc<dyn DocumentStore>,
    };
    let provider = Arc::new(LocalIdentityProvider::new(Arc::clone(&db))?);
    Ok(Client {
        app: AppState::with_settings(Arc::clone(&store), db.load_settings()?, config.system_scheme),
        auth: AuthService::new(provider, store),
        db,
    })
}

#[allow(clippy::too_many_lines)]
async fn dispatch(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Signup {
            name,
            email,
            password,
            json,
        } => commands::cmd_signup(client, &name, &email, password, json).await,
        Commands::Login {
            email,
            password,
            json,
        } => commands::cmd_login(client, &email, password, json).await,
        Commands::Logout { json } => commands::cmd_logout(client, json).await,
        Commands::ResetPassword { email, json } => {
            commands::cmd_reset_password(client, &email, json).await
        }
        Commands::Whoami { json } => commands::cmd_whoami(client, json),
        Commands::Dashboard { json } => commands::cmd_dashboard(client, json).await,
        Commands::Summary { date, json } => commands::cmd_summary(client, date, json).await,
        Commands::Workout { command } => match command {
            WorkoutCommands::Add {
                title,
                fields,
                completed,
                json,
            } => {
                commands::cmd_workout_add(client, &title, fields.into_args(None), completed, json)
                    .await
            }
            WorkoutCommands::List { json } => commands::cmd_workout_list(client, json).await,
            WorkoutCommands::Show { id, json } => {
                commands::cmd_workout_show(client, &id, json).await
            }
            WorkoutCommands::Update {
                id,
                title,
                fields,
                json,
            } => commands::cmd_workout_update(client, &id, fields.into_args(title), json).await,
            WorkoutCommands::Complete { id, json } => {
                commands::cmd_workout_complete(client, &id, json).await
            }
            WorkoutCommands::Delete { id, json } => {
                commands::cmd_workout_delete(client, &id, json).await
            }
        },
        Commands::Meal { command } => match command {
            MealCommands::Log {
                name,
                meal_type,
                foods,
                date,
                json,
            } => commands::cmd_meal_log(client, &name, &meal_type, &foods, date, json).await,
            MealCommands::List { date, json } => {
                commands::cmd_meal_list(client, date, json).await
            }
            MealCommands::Show { id, json } => commands::cmd_meal_show(client, &id, json).await,
            MealCommands::Update {
                id,
                name,
                meal_type,
                foods,
                date,
                json,
            } => {
                commands::cmd_meal_update(
                    client,
                    &id,
                    name.as_deref(),
                    meal_type.as_deref(),
                    &foods,
                    date,
                    json,
                )
                .await
            }
            MealCommands::Delete { id, json } => {
                commands::cmd_meal_delete(client, &id, json).await
            }
        },
        Commands::Progress { command } => match command {
            ProgressCommands::Add {
                weight,
                body_fat,
                chest,
                waist,
                hips,
                arms,
                thighs,
                notes,
                date,
                json,
            } => {
                let args = commands::ProgressArgs {
                    weight,
                    body_fat,
                    measurements: Measurements {
                        chest,
                        waist,
                        hips,
                        arms,
                        thighs,
                    },
                    notes,
                    date,
                };
                commands::cmd_progress_add(client, args, json).await
            }
            ProgressCommands::List { json } => commands::cmd_progress_list(client, json).await,
        },
        Commands::Plan { command } => match command {
            PlanCommands::Create {
                title,
                days,
                exercises,
                description,
                start,
                end,
                activate,
                json,
            } => {
                let args = commands::PlanArgs {
                    description,
                    days,
                    exercises,
                    start,
                    end,
                };
                commands::cmd_plan_create(client, &title, args, activate, json).await
            }
            PlanCommands::List { json } => commands::cmd_plan_list(client, json).await,
            PlanCommands::Show { id, json } => commands::cmd_plan_show(client, &id, json).await,
            PlanCommands::Activate { id, json } => {
                commands::cmd_plan_activate(client, &id, json).await
            }
            PlanCommands::Delete { id, json } => {
                commands::cmd_plan_delete(client, &id, json).await
            }
        },
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => commands::cmd_profile_show(client, json).await,
            ProfileCommands::Update {
                name,
                photo,
                clear_photo,
                height,
                weight,
                goals,
                clear_goals,
                json,
            } => {
                let args = commands::ProfileArgs {
                    name,
                    photo,
                    clear_photo,
                    height,
                    weight,
                    goals,
                    clear_goals,
                };
                commands::cmd_profile_update(client, args, json).await
            }
        },
        Commands::Settings { command } => match command {
            SettingsCommands::Show { palette, json } => {
                commands::cmd_settings_show(client, palette, json)
            }
            SettingsCommands::Theme { value, json } => {
                commands::cmd_settings_theme(client, &value, json)
            }
            SettingsCommands::Units { value, json } => {
                commands::cmd_settings_units(client, &value, json)
            }
            SettingsCommands::Notifications { value, json } => {
                commands::cmd_settings_notifications(client, value.as_deref(), json)
            }
            SettingsCommands::Reset { json } => commands::cmd_settings_reset(client, json),
        },
        Commands::Serve { .. } => anyhow::bail!("serve does not run against a client session"),
    }
}
