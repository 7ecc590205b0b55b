use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use blogdash::config::{self, Config};
use blogdash::core::helpers::{format_age, now};
use blogdash::core::token;
use blogdash::guards::{self, Access, Route};
use blogdash::posts::{filter_posts, Feed};
use blogdash::users::RegistrationForm;
use blogdash::{ClientError, Dashboard, FileStore, Post};

#[derive(Debug, Parser)]
#[command(name = "blogdash", about = "Terminal dashboard for BlogDash", version)]
struct Cli {
    /// Backend origin
    #[arg(long, env = "BLOGDASH_API_URL", default_value = config::DEFAULT_API_URL)]
    api_url: String,

    /// Name of the stored session entry
    #[arg(long, env = "BLOGDASH_AUTH_STORAGE_KEY", default_value = config::DEFAULT_AUTH_STORAGE_KEY)]
    storage_key: String,

    /// Directory holding persisted client state
    #[arg(long, env = "BLOGDASH_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, env = "BLOGDASH_REQUEST_TIMEOUT_SECS", default_value_t = config::DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout: u64,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "BLOGDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "BLOGDASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List posts
    Posts {
        /// Only your own posts
        #[arg(long)]
        mine: bool,
        /// Filter by title or content
        #[arg(long)]
        search: Option<String>,
    },
    /// Publish a post
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Edit one of your posts
    Edit {
        id: i64,
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
    },
    /// Delete one of your posts
    Delete {
        id: i64,
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
}

impl Command {
    fn route(&self) -> Route {
        match self {
            Command::Register { .. } => Route::Register,
            Command::Login { .. } => Route::Login,
            Command::Posts { mine: false, .. } | Command::Logout | Command::Whoami => Route::Home,
            Command::Posts { mine: true, .. }
            | Command::Create { .. }
            | Command::Edit { .. }
            | Command::Delete { .. } => Route::Dashboard,
        }
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "blogdash=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn print_post(post: &Post, token: Option<&str>) {
    let yours = token.map_or(false, |t| post.is_authored_by(t));
    println!(
        "#{} {}{}\n   by {} · {}\n   {}\n",
        post.id,
        post.title,
        if yours { "  [yours]" } else { "" },
        post.author_name,
        format_age(&post.created_at, now()),
        post.content.replace('\n', "\n   "),
    );
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    use std::io::Write;
    print!("{prompt} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn run(dashboard: &Dashboard, command: Command) -> anyhow::Result<()> {
    let state = dashboard.start();
    if let Some(error) = &state.error {
        eprintln!("warning: {error}");
    }

    match guards::resolve(command.route(), &state) {
        Access::Allow => {}
        Access::Redirect(Route::Login) => anyhow::bail!("not signed in; run `blogdash login` first"),
        Access::Redirect(Route::Dashboard) => {
            let name = state.user.as_ref().map(|u| u.username.as_str()).unwrap_or_default();
            anyhow::bail!("already signed in as {name}; run `blogdash logout` first")
        }
        Access::Redirect(_) | Access::Wait => anyhow::bail!("session is not ready"),
    }

    let token = state.user.as_ref().map(|u| u.token.clone());

    match command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let form = RegistrationForm {
                username,
                email,
                password,
            };
            let user = dashboard.sign_up(&form).await?;
            println!("Registered {}. Log in to continue.", user.username);
        }
        Command::Login { username, password } => match dashboard.sign_in(&username, &password).await? {
            Some(session) => println!("Welcome, {}", session.username),
            None => println!("Sign-in was superseded; nothing changed."),
        },
        Command::Logout => {
            dashboard.sign_out();
            println!("Signed out.");
        }
        Command::Whoami => match &state.user {
            Some(user) => {
                let expiry = token::expires_at(&user.token)
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "unknown".to_string());
                let id = user.id.as_ref().map(ToString::to_string).unwrap_or_default();
                println!("{} (id {id}), session expires {expiry}", user.username);
            }
            None => println!("Not signed in."),
        },
        Command::Posts { mine, search } => {
            let feed = if mine { Feed::Mine } else { Feed::All };
            let posts = dashboard.feed().posts(feed).await?;
            let shown = filter_posts(&posts, search.as_deref().unwrap_or_default());
            if shown.is_empty() {
                println!("No posts found.");
            }
            for post in shown {
                print_post(post, token.as_deref());
            }
        }
        Command::Create { title, content } => {
            let post = dashboard.feed().create(&title, &content).await?;
            println!("Created post #{}", post.id);
        }
        Command::Edit { id, title, content } => {
            let post = dashboard.feed().update(id, &title, &content).await?;
            println!("Updated post #{}", post.id);
        }
        Command::Delete { id, yes } => {
            if !yes && !confirm(&format!("Delete post #{id}? This cannot be undone."))? {
                println!("Cancelled.");
                return Ok(());
            }
            dashboard.feed().delete(id).await?;
            println!("Deleted post #{id}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let config = Config::new(
        &cli.api_url,
        &cli.storage_key,
        cli.storage_dir.unwrap_or_else(config::storage_dir),
        Duration::from_secs(cli.timeout),
    )?;
    let storage = Arc::new(FileStore::new(config.storage_dir.clone()));
    let dashboard = Dashboard::new(&config, storage).context("building client")?;

    match run(&dashboard, cli.command).await {
        Err(err) => {
            if let Some(ClientError::Network { status: Some(401), .. }) = err.downcast_ref::<ClientError>() {
                if dashboard.session().snapshot().is_authenticated() {
                    dashboard.sign_out();
                    eprintln!("Session rejected by the server; you have been signed out.");
                }
            }
            Err(err)
        }
        ok => ok,
    }
}
