use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use tfmongo::config::ProviderOverrides;
use tfmongo::core::provider::load_user_specs;
use tfmongo::formatters::OutputFormatter;
use tfmongo::shared::logging;
use tfmongo::user::schema::{provider_schema, user_resource_schema};
use tfmongo::user::{read, UserSpec};
use tfmongo::TfMongo;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tfmongo",
    about = "Reconcile MongoDB database users from declarative resource files.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(
        long,
        short = 'c',
        value_name = "PATH",
        help = "Path to the configuration file"
    )]
    pub config: Option<String>,

    #[arg(long, value_name = "URL", help = "MongoDB url (overrides MONGODB_URL)")]
    pub url: Option<String>,

    #[arg(long, value_name = "DB", help = "Authentication database")]
    pub auth_database: Option<String>,

    #[arg(long, value_name = "USER", help = "Login username")]
    pub auth_username: Option<String>,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[derive(Args)]
struct FileArgs {
    #[arg(long, short = 'f', value_name = "PATH", help = "JSON file with one user or a list of users")]
    file: PathBuf,
}

#[derive(Args)]
struct BatchArgs {
    #[command(flatten)]
    input: FileArgs,

    #[arg(long, value_name = "N", help = "Users reconciled at once (1-10)")]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(name = "schema", about = "Print the provider and mongodb_user schema")]
    Schema {
        #[arg(long, help = "Print the JSON Schema of a user declaration instead")]
        json_schema: bool,
    },

    #[command(name = "apply", about = "Create missing users and update existing ones")]
    Apply(BatchArgs),

    #[command(name = "destroy", about = "Drop every declared user")]
    Destroy(BatchArgs),

    #[command(name = "create", about = "Run createUser for each declared user")]
    Create(FileArgs),

    #[command(name = "update", about = "Run updateUser for each declared user")]
    Update(FileArgs),

    #[command(name = "delete", about = "Run dropUser for each declared user")]
    Delete(FileArgs),

    #[command(name = "exists", about = "Check whether each declared user exists")]
    Exists(FileArgs),

    #[command(name = "read", about = "Show the state recorded for each declared user")]
    Read(FileArgs),

    #[command(name = "info", about = "Show the usersInfo reply for each declared user")]
    Info(FileArgs),
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    logging::init();

    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(0);
    }

    let command = match &cli.command {
        Some(command) => command,
        None => {
            // Default behavior if no command is specified
            println!("No command specified. Use --help for usage information.");
            return;
        }
    };

    match run(&cli, command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            logging::error(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// Execute one command; `Ok(false)` means some resource failed
async fn run(cli: &Cli, command: &Commands) -> anyhow::Result<bool> {
    match command {
        Commands::Schema { json_schema } => {
            let output = if *json_schema {
                serde_json::to_value(schemars::schema_for!(UserSpec))?
            } else {
                OutputFormatter::format_schema(&provider_schema(), &[user_resource_schema()])
            };
            print_json(&output)?;
            Ok(true)
        }
        Commands::Read(args) => {
            // read never contacts the server
            let specs = load_user_specs(&args.file)?;
            let output: Vec<Value> = specs
                .iter()
                .map(|spec| OutputFormatter::format_observed(&read(spec)))
                .collect();
            print_json(&Value::Array(output))?;
            Ok(true)
        }
        Commands::Apply(args) | Commands::Destroy(args) => {
            let specs = load_user_specs(&args.input.file)?;
            let mut provider = init_tfmongo(cli).await?;
            if let Some(concurrency) = args.concurrency {
                provider.set_max_concurrent(concurrency);
            }

            let (operation, results) = match command {
                Commands::Apply(_) => {
                    logging::info("Applying declared MongoDB users");
                    ("apply", provider.apply(&specs).await)
                }
                _ => {
                    logging::info("Destroying declared MongoDB users");
                    ("destroy", provider.destroy(&specs).await)
                }
            };

            print_json(&OutputFormatter::format_batch_results(operation, &results))?;
            Ok(results.iter().all(|r| r.is_ok()))
        }
        Commands::Create(args)
        | Commands::Update(args)
        | Commands::Delete(args)
        | Commands::Exists(args)
        | Commands::Info(args) => {
            let specs = load_user_specs(&args.file)?;
            let provider = init_tfmongo(cli).await?;
            let reconciler = provider.reconciler();

            let mut outputs = Vec::with_capacity(specs.len());
            let mut all_ok = true;
            for spec in &specs {
                let identity = spec.identity();
                let (operation, result) = match command {
                    Commands::Create(_) => (
                        "create",
                        reconciler
                            .create(spec)
                            .await
                            .map(|_| json!({}))
                            .map_err(|e| e.to_string()),
                    ),
                    Commands::Update(_) => (
                        "update",
                        reconciler
                            .update(spec)
                            .await
                            .map(|_| json!({}))
                            .map_err(|e| e.to_string()),
                    ),
                    Commands::Delete(_) => (
                        "delete",
                        reconciler
                            .delete(spec)
                            .await
                            .map(|_| json!({}))
                            .map_err(|e| e.to_string()),
                    ),
                    Commands::Exists(_) => (
                        "exists",
                        reconciler
                            .exists(spec)
                            .await
                            .map(|exists| json!({ "exists": exists }))
                            .map_err(|e| e.to_string()),
                    ),
                    _ => (
                        "info",
                        reconciler
                            .users_info(spec)
                            .await
                            .map(|info| OutputFormatter::format_users_info(&identity, &info))
                            .map_err(|e| e.to_string()),
                    ),
                };
                all_ok &= result.is_ok();
                outputs.push(OutputFormatter::format_operation(operation, &identity, result));
            }

            print_json(&Value::Array(outputs))?;
            Ok(all_ok)
        }
    }
}

async fn init_tfmongo(cli: &Cli) -> anyhow::Result<TfMongo> {
    let overrides = ProviderOverrides {
        url: cli.url.clone(),
        auth_database: cli.auth_database.clone(),
        auth_username: cli.auth_username.clone(),
    };

    logging::info(&format!(
        "Initializing tfmongo with config: {:?}",
        cli.config
    ));
    TfMongo::new(cli.config.clone(), overrides)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize tfmongo: {}", e))
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
