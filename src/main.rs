mod api;
mod commands;
mod config;
mod error;
mod fields;
mod mcp;
mod oauth;
mod ops;
mod output;
mod resolve;
#[cfg(test)]
mod testing;
mod token;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tick", version, about = "TickTick from the command line")]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure credentials and sign in
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Start MCP server (stdio transport)
    Mcp,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Save OAuth client credentials to the config file
    Setup {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        #[arg(long, default_value = config::DEFAULT_REDIRECT_URI)]
        redirect_uri: String,
        /// "global" (ticktick.com) or "china" (dida365.com)
        #[arg(long, default_value = "global")]
        region: String,
    },

    /// Authorize in the browser and store the token
    Login {
        /// Authorization code (or the full redirect URL); prompted for when omitted
        #[arg(long)]
        code: Option<String>,
    },

    /// Show whether a token is stored and when it expires
    Status,

    /// Forget the stored token
    Logout,

    /// Refresh the access token now
    Refresh,
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List all projects
    List,

    /// Show one project
    Get { id: String },

    /// Show a project with its tasks (inbox when no ID given)
    Data { id: Option<String> },

    /// Create a project
    Create {
        name: Vec<String>,
        #[arg(long)]
        color: Option<String>,
        /// list, kanban or timeline
        #[arg(long)]
        view_mode: Option<String>,
        /// TASK or NOTE
        #[arg(long)]
        kind: Option<String>,
    },

    /// Rename or restyle a project
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        view_mode: Option<String>,
    },

    /// Delete a project
    Delete { id: String },
}

#[derive(Args)]
struct TaskFieldArgs {
    /// Notes / description
    #[arg(long)]
    content: Option<String>,
    /// YYYY-MM-DD or ISO-8601 timestamp
    #[arg(long)]
    due: Option<String>,
    /// none, low, medium or high
    #[arg(long)]
    priority: Option<String>,
    /// Comma separated, e.g. work,urgent
    #[arg(long)]
    tags: Option<String>,
    /// Reminder before due time: 15m, 1h, 1d
    #[arg(long)]
    reminder: Option<String>,
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks in a project (inbox by default)
    List {
        #[arg(long)]
        project: Option<String>,
    },

    /// Show one task
    Get {
        id: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// Add a task: tick tasks add <title>
    Add {
        title: Vec<String>,
        #[arg(long)]
        project: Option<String>,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },

    /// Change fields of a task
    Update {
        id: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: TaskFieldArgs,
    },

    /// Mark a task as done
    Complete {
        id: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete a task
    Delete {
        id: String,
        #[arg(long)]
        project: Option<String>,
    },

    /// Search all projects by keyword, tags and priority
    Search {
        keyword: Vec<String>,
        /// Comma separated; matches tasks with any of them
        #[arg(long)]
        tags: Option<String>,
        #[arg(long)]
        priority: Option<String>,
    },

    /// Active tasks due within N days, overdue included
    Due {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Active high-priority tasks
    Priority,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing() {
        eprintln!("warning: logging disabled: {}", e);
    }

    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(error::TickError::from)
        .and_then(|rt| rt.block_on(run(cli)));

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr; stdout carries command output and the MCP protocol.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("tick=warn"))?;
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }
    Ok(())
}

async fn run(cli: Cli) -> error::Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Setup {
                client_id,
                client_secret,
                redirect_uri,
                region,
            } => commands::auth_setup(&client_id, &client_secret, &redirect_uri, &region),
            AuthCommands::Login { code } => commands::auth_login(code).await,
            AuthCommands::Status => commands::auth_status(json),
            AuthCommands::Logout => commands::auth_logout(),
            AuthCommands::Refresh => commands::auth_refresh().await,
        },
        Commands::Projects { command } => {
            let ops = commands::operations()?;
            match command {
                ProjectCommands::List => commands::projects_list(&ops, json).await,
                ProjectCommands::Get { id } => commands::projects_get(&ops, &id, json).await,
                ProjectCommands::Data { id } => {
                    commands::projects_data(&ops, id.as_deref().unwrap_or(""), json).await
                }
                ProjectCommands::Create {
                    name,
                    color,
                    view_mode,
                    kind,
                } => {
                    let new = ops::NewProject {
                        name: name.join(" "),
                        color,
                        view_mode,
                        kind,
                    };
                    commands::projects_create(&ops, new, json).await
                }
                ProjectCommands::Update {
                    id,
                    name,
                    color,
                    view_mode,
                } => {
                    let update = ops::ProjectUpdate {
                        name,
                        color,
                        view_mode,
                    };
                    commands::projects_update(&ops, &id, update, json).await
                }
                ProjectCommands::Delete { id } => commands::projects_delete(&ops, &id).await,
            }
        }
        Commands::Tasks { command } => {
            // Input problems are reported before credentials are even loaded.
            let command = commands::TaskCommand::from_cli(command)?;
            let ops = commands::operations()?;
            commands::run_task_command(&ops, command, json).await
        }
        Commands::Mcp => {
            let ops = commands::operations()?;
            mcp::run_mcp_server(ops).await
        }
    }
}
