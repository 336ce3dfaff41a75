use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod filter;
mod registry;
mod upload;

use api::ApiError;
use config::Config;
use filter::{FilterCriteria, SizeClass, TypeCategory};
use registry::{LoadState, RegistryCache};

#[derive(Parser)]
#[command(name = "stash")]
#[command(about = "Stash file backup client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to a backup server
    Login {
        /// Server URL, e.g. http://localhost:8080
        #[arg(long)]
        server: Option<String>,
        /// Username
        #[arg(long)]
        username: String,
        /// Account email
        #[arg(long)]
        email: String,
    },
    /// Create an account
    Register {
        /// Server URL, e.g. http://localhost:8080
        #[arg(long)]
        server: Option<String>,
        /// Username
        #[arg(long)]
        username: String,
        /// Account email
        #[arg(long)]
        email: String,
    },
    /// Logout and clear stored credentials
    Logout,
    /// Show the configured server and session
    Status,
    /// List backed-up files, optionally filtered
    Ls {
        /// Case-insensitive substring match on name or MIME type
        #[arg(long)]
        search: Option<String>,
        /// image, video, audio, document, archive or other
        #[arg(long = "type")]
        type_category: Option<TypeCategory>,
        /// small (<1 MiB), medium (1-10 MiB) or large (>=10 MiB)
        #[arg(long)]
        size: Option<SizeClass>,
        /// Only files uploaded on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Only files uploaded on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Upload one or more files
    Upload {
        /// Files to upload
        files: Vec<PathBuf>,
    },
    /// Download a backed-up file
    Restore {
        /// File id or unique file name
        file: String,
        /// Output path (defaults to the original name in the current dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a text file's content without restoring it to disk
    Preview {
        /// File id or unique file name
        file: String,
    },
    /// Delete a backed-up file
    Delete {
        /// File id or unique file name
        file: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Show total storage used
    Usage,
    /// Show the account activity log
    Activity,
    /// Request a password reset email
    ForgotPassword {
        /// Account email
        #[arg(long)]
        email: String,
    },
    /// Set a new password using a reset token
    ResetPassword {
        /// Token from the reset email
        token: String,
    },
    /// Send an issue report to the server operator
    ReportIssue {
        /// Short subject line
        #[arg(long)]
        subject: String,
        /// Problem description
        #[arg(long)]
        description: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stash=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match run(cli.command, &mut config).await {
        Ok(()) => Ok(()),
        Err(err) => {
            // Cross-cutting contract: any 401/403 ends the session.
            if let Some(ApiError::Auth(msg)) = err.downcast_ref::<ApiError>() {
                eprintln!("{}", msg);
                config.clear_credentials();
                config.save()?;
                eprintln!("Session cleared. Run: stash login");
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

async fn run(command: Commands, config: &mut Config) -> anyhow::Result<()> {
    match command {
        Commands::Login {
            server,
            username,
            email,
        } => login(config, server, &username, &email).await,
        Commands::Register {
            server,
            username,
            email,
        } => register(config, server, &username, &email).await,
        Commands::Logout => logout(config),
        Commands::Status => status(config).await,
        Commands::Ls {
            search,
            type_category,
            size,
            from,
            to,
        } => {
            let criteria = FilterCriteria {
                search_text: search,
                type_category,
                size_class: size,
                date_from: from,
                date_to: to,
            };
            list(config, &criteria).await
        }
        Commands::Upload { files } => upload_batch(config, &files).await,
        Commands::Restore { file, output } => restore(config, &file, output).await,
        Commands::Preview { file } => preview(config, &file).await,
        Commands::Delete { file, force } => delete(config, &file, force).await,
        Commands::Usage => usage(config).await,
        Commands::Activity => activity(config).await,
        Commands::ForgotPassword { email } => forgot_password(config, &email).await,
        Commands::ResetPassword { token } => reset_password(config, &token).await,
        Commands::ReportIssue {
            subject,
            description,
        } => report_issue(config, &subject, &description).await,
    }
}

// --- Account commands ---

async fn login(
    config: &mut Config,
    server: Option<String>,
    username: &str,
    email: &str,
) -> anyhow::Result<()> {
    if let Some(server) = server {
        config.server_url = Some(server);
    }
    let api = api::ApiClient::new(config.server_url()?, None)?;

    let password = prompt_password("Password: ").await?;
    let resp = api.login(username, email, &password).await?;

    config.token = Some(resp.token);
    config.username = Some(resp.username);
    config.save()?;

    println!("{}", resp.message);
    Ok(())
}

async fn register(
    config: &mut Config,
    server: Option<String>,
    username: &str,
    email: &str,
) -> anyhow::Result<()> {
    if let Some(server) = server {
        config.server_url = Some(server);
        config.save()?;
    }
    let api = api::ApiClient::new(config.server_url()?, None)?;

    let password = prompt_password("Password: ").await?;
    let confirm = prompt_password("Confirm password: ").await?;
    validate_new_password(&password, &confirm)?;

    let message = api.register(username, email, &password).await?;
    println!("{} You can now log in.", message);
    Ok(())
}

fn logout(config: &mut Config) -> anyhow::Result<()> {
    config.clear_credentials();
    config.save()?;
    println!("logged out");
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    match &config.server_url {
        Some(server) => {
            println!("server: {}", server);
            if config.token.is_some() {
                match config.api_client()?.profile().await {
                    Ok(profile) => {
                        println!("logged in as {} <{}>", profile.username, profile.email)
                    }
                    Err(err) => return Err(err.into()),
                }
            } else {
                println!("not logged in");
            }
        }
        None => {
            println!("not configured");
            println!("run: stash login --server <url>");
        }
    }
    Ok(())
}

async fn forgot_password(config: &Config, email: &str) -> anyhow::Result<()> {
    let api = api::ApiClient::new(config.server_url()?, None)?;
    let message = api.forgot_password(email).await?;
    println!("{}", message);
    Ok(())
}

async fn reset_password(config: &Config, token: &str) -> anyhow::Result<()> {
    let api = api::ApiClient::new(config.server_url()?, None)?;

    let password = prompt_password("New password: ").await?;
    let confirm = prompt_password("Confirm new password: ").await?;
    validate_new_password(&password, &confirm)?;

    let message = api.reset_password(token, &password).await?;
    println!("{} You can now log in with your new password.", message);
    Ok(())
}

// --- File commands ---

async fn list(config: &Config, criteria: &FilterCriteria) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let mut registry = RegistryCache::new();

    if let Err(err) = registry.refresh(&api).await {
        if matches!(err, ApiError::Auth(_)) {
            return Err(err.into());
        }
        // Non-auth failure: the cache state carries the message for render.
    }
    render_files(&registry, criteria);
    Ok(())
}

async fn upload_batch(config: &Config, files: &[PathBuf]) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let mut registry = RegistryCache::new();

    let result = upload::submit(&api, &mut registry, files).await?;
    println!("{}", result.report.message());
    if let Some(bytes) = result.storage_used {
        println!("Total storage used: {}", format_size(bytes));
    }
    Ok(())
}

async fn restore(config: &Config, reference: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let mut registry = RegistryCache::new();
    registry.refresh(&api).await?;

    let record = registry.find(reference)?;
    let content = api.restore(&record.id).await?;

    let out_path = output.unwrap_or_else(|| PathBuf::from(&record.name));
    tokio::fs::write(&out_path, &content).await?;
    println!(
        "File \"{}\" restored to {} ({}).",
        record.name,
        out_path.display(),
        format_size(content.len() as u64)
    );
    Ok(())
}

// Extensions the preview treats as text when the MIME type is unhelpful.
const TEXT_PREVIEW_EXTS: &[&str] = &[
    "txt", "log", "csv", "js", "html", "css", "json", "xml", "md",
];

async fn preview(config: &Config, reference: &str) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let mut registry = RegistryCache::new();
    registry.refresh(&api).await?;

    let record = registry.find(reference)?;
    let ext = record
        .name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    let texty = record.mime_type.to_ascii_lowercase().starts_with("text/")
        || TEXT_PREVIEW_EXTS.contains(&ext.as_str());

    if !texty {
        println!(
            "No preview available for this file type ({}). Use: stash restore {}",
            if record.mime_type.is_empty() {
                "unknown"
            } else {
                &record.mime_type
            },
            record.id
        );
        return Ok(());
    }

    let content = api.restore(&record.id).await?;
    println!("--- {} ---", record.name);
    print!("{}", String::from_utf8_lossy(&content));
    io::stdout().flush()?;
    Ok(())
}

async fn delete(config: &Config, reference: &str, force: bool) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let mut registry = RegistryCache::new();
    registry.refresh(&api).await?;

    let record = registry.find(reference)?;
    let id = record.id.clone();
    let name = record.name.clone();

    if !force {
        print!(
            "Are you sure you want to delete \"{}\"? This cannot be undone. [y/N] ",
            name
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !matches!(input.trim(), "y" | "Y" | "yes") {
            println!("aborted");
            return Ok(());
        }
    }

    let message = api.delete_file(&id).await?;
    println!("{}", message);

    registry.refresh(&api).await.ok();
    let bytes = api.storage_usage().await?;
    println!("Total storage used: {}", format_size(bytes));
    Ok(())
}

async fn usage(config: &Config) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let bytes = api.storage_usage().await?;
    println!("Total storage used: {}", format_size(bytes));
    Ok(())
}

async fn activity(config: &Config) -> anyhow::Result<()> {
    let api = config.api_client()?;
    let entries = api.activities().await?;

    if entries.is_empty() {
        println!("no activity recorded");
        return Ok(());
    }
    for entry in entries {
        println!(
            "{}  {:<10}  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action,
            entry.description
        );
    }
    Ok(())
}

async fn report_issue(config: &Config, subject: &str, description: &str) -> anyhow::Result<()> {
    if subject.trim().is_empty() || description.trim().is_empty() {
        return Err(
            ApiError::Validation("Please fill in both subject and description.".into()).into(),
        );
    }
    let api = config.api_client()?;
    let message = api.report_issue(subject, description).await?;
    println!("{}", message);
    Ok(())
}

// --- Rendering ---

/// Pure projection of (cache state, criteria) to the terminal. The three
/// empty-looking situations render distinctly: not loaded, no files at
/// all, and no files matching the filters.
fn render_files(cache: &RegistryCache, criteria: &FilterCriteria) {
    match cache.state() {
        LoadState::NotLoaded => {
            println!("file list not loaded yet");
        }
        LoadState::Failed(msg) => {
            println!("could not load files: {}", msg);
            println!("retry with: stash ls");
        }
        LoadState::Loaded => {
            let hits = cache.query(criteria);
            if hits.is_empty() {
                if cache.snapshot().is_empty() && !criteria.is_active() {
                    println!("no files backed up yet");
                } else {
                    println!("No files found matching your criteria.");
                }
                return;
            }
            for file in &hits {
                println!(
                    "{:>10}  {}  {:<8}  {}  [{}]",
                    format_size(file.size_bytes),
                    file.uploaded_at.format("%Y-%m-%d %H:%M"),
                    filter::classify(file).name(),
                    file.name,
                    file.id
                );
            }
            println!("{} file(s)", hits.len());
        }
    }
}

// --- Helpers ---

fn validate_new_password(password: &str, confirm: &str) -> Result<(), ApiError> {
    if password != confirm {
        return Err(ApiError::Validation("Passwords do not match.".into()));
    }
    if password.len() < 6 {
        return Err(ApiError::Validation(
            "Password must be 6 or more characters.".into(),
        ));
    }
    Ok(())
}

async fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let password = tokio::task::spawn_blocking(|| -> anyhow::Result<String> {
        let pass = rpassword::read_password()?;
        Ok(pass)
    })
    .await??;

    Ok(password)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_passwords() {
        let err = validate_new_password("secret1", "secret2").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn rejects_short_passwords() {
        let err = validate_new_password("abc", "abc").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn accepts_valid_passwords() {
        assert!(validate_new_password("secret", "secret").is_ok());
    }

    #[test]
    fn format_size_picks_sane_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
