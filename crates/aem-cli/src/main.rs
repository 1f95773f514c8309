//! aemctl - AEM management from the command line
//!
//! Thin wrapper over `aem-core`: every subcommand maps to one resource
//! operation and prints the resulting message.
//!
//! ## Commands
//!
//! - `aem`: instance readiness checks and their `*-wait` variants
//! - `package`: package manager lifecycle, state queries and `*-wait` variants
//! - `repository`: block or unblock repository writes
//! - `path`: tree activation
//! - `flush-agent`: dispatcher flush agents
//! - `user`: user creation and password changes

use std::path::PathBuf;

use aem_core::telemetry::{self, LogFormat};
use aem_core::{
    AemClient, AemResult, ClientConfig, LenientInt, ResultData, RetryOptions,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::debug;

#[derive(Parser)]
#[command(name = "aemctl")]
#[command(author = "Stevedores Org")]
#[command(version = aem_core::VERSION)]
#[command(about = "Manage Adobe Experience Manager instances", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON log lines and JSON results
    #[arg(long, global = true)]
    json: bool,

    /// Instance URL
    #[arg(long, global = true, env = "AEM_URL", default_value = "http://localhost:4502")]
    url: String,

    #[arg(long, global = true, env = "AEM_USERNAME", default_value = "admin")]
    username: String,

    #[arg(
        long,
        global = true,
        env = "AEM_PASSWORD",
        default_value = "admin",
        hide_env_values = true
    )]
    password: String,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "AEM_TIMEOUT_SECS", default_value_t = 300)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the instance is ready
    Aem {
        #[command(subcommand)]
        action: AemAction,
    },

    /// Operate on one package
    Package {
        group: String,
        name: String,
        version: String,

        #[command(subcommand)]
        action: PackageAction,
    },

    /// Toggle repository writes
    Repository {
        #[command(subcommand)]
        action: RepositoryAction,
    },

    /// Operate on a content path
    Path {
        path: String,

        #[command(subcommand)]
        action: PathAction,
    },

    /// Manage a dispatcher flush agent
    FlushAgent {
        /// `author` or `publish`
        run_mode: String,
        name: String,

        #[command(subcommand)]
        action: FlushAgentAction,
    },

    /// Manage a user
    User {
        /// Intermediate path, e.g. /home/users/j
        path: String,
        name: String,

        #[command(subcommand)]
        action: UserAction,
    },
}

/// Retry settings for the `*-wait` actions. Values are read leniently, so
/// `--max-tries 5` and `--max-tries "5 "` are the same.
#[derive(Args, Debug, Default)]
struct RetryArgs {
    /// Number of state checks before giving up (default 30)
    #[arg(long)]
    max_tries: Option<String>,

    /// First sleep between checks, in seconds (default 2)
    #[arg(long)]
    base_sleep: Option<String>,

    /// Sleep cap, in seconds (default 2)
    #[arg(long)]
    max_sleep: Option<String>,
}

impl RetryArgs {
    fn options(&self) -> RetryOptions {
        let lenient = |value: &Option<String>| value.as_deref().map(LenientInt::from);
        RetryOptions {
            max_tries: lenient(&self.max_tries),
            base_sleep_seconds: lenient(&self.base_sleep),
            max_sleep_seconds: lenient(&self.max_sleep),
        }
    }
}

#[derive(Subcommand)]
enum AemAction {
    /// Is the login page fully started
    LoginPage,
    /// Is package installation finished
    InstallStatus,
    /// Is the package manager servlet active
    PackageManagerStatus,
    /// Wait until the login page is fully started
    LoginPageWait {
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Wait until no package installation is running
    InstallStatusWait {
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Wait until the package manager servlet is active
    PackageManagerStatusWait {
        #[command(flatten)]
        retry: RetryArgs,
    },
}

#[derive(Subcommand)]
enum PackageAction {
    Create,
    /// Replace the package filter
    Update {
        /// JSON filter definition
        #[arg(long)]
        filter: String,
    },
    Delete,
    Build,
    Install {
        /// Skip subpackages
        #[arg(long)]
        no_recursive: bool,
    },
    Uninstall,
    Replicate,
    /// Download `{name}-{version}.zip` into a directory
    Download {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Upload `{name}-{version}.zip` from a directory
    Upload {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        force: bool,
    },
    /// Print the filter paths
    GetFilter,
    /// Activate every filter path
    ActivateFilter {
        #[arg(long)]
        ignore_deactivated: bool,
        #[arg(long)]
        modified_only: bool,
    },
    /// List every version of this group and name
    Versions,
    Exists,
    IsUploaded,
    IsInstalled,
    IsEmpty,
    IsBuilt,
    /// Upload, then wait until the package is listed
    UploadWait {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Install, then wait until the package is unpacked
    InstallWait {
        #[arg(long)]
        no_recursive: bool,
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Delete, then wait until the package is gone
    DeleteWait {
        #[command(flatten)]
        retry: RetryArgs,
    },
    /// Build, then wait until the package has content
    BuildWait {
        #[command(flatten)]
        retry: RetryArgs,
    },
}

#[derive(Subcommand)]
enum RepositoryAction {
    BlockWrites,
    UnblockWrites,
}

#[derive(Subcommand)]
enum PathAction {
    Activate {
        #[arg(long)]
        ignore_deactivated: bool,
        #[arg(long)]
        modified_only: bool,
    },
}

#[derive(Subcommand)]
enum FlushAgentAction {
    /// Create the agent, or overwrite it
    CreateUpdate {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Dispatcher base URL, e.g. http://dispatcher:80
        #[arg(long)]
        dest_base_url: String,
    },
    Delete,
    Exists,
}

#[derive(Subcommand)]
enum UserAction {
    Create {
        #[arg(long, env = "AEM_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    ChangePassword {
        #[arg(long)]
        old_password: String,
        #[arg(long)]
        new_password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(
        LogFormat::from_json_flag(cli.json),
        telemetry::level_for(cli.verbose),
    );

    let config = ClientConfig::new(&cli.url)
        .with_credentials(&cli.username, &cli.password)
        .with_timeout(cli.timeout);
    debug!(url = %config.base(), user = %config.username, "connecting");

    let client = AemClient::from_config(config).context("Failed to create HTTP client")?;

    let results = run(&client, cli.command).await?;
    report(&results, cli.json)
}

/// Execute one command, returning every result it produced in order.
async fn run(client: &AemClient, command: Commands) -> Result<Vec<AemResult>> {
    let result = match command {
        Commands::Aem { action } => {
            let aem = client.aem();
            match action {
                AemAction::LoginPage => aem.get_login_page().await,
                AemAction::InstallStatus => aem.get_install_status().await,
                AemAction::PackageManagerStatus => {
                    aem.get_package_manager_servlet_status().await
                }
                AemAction::LoginPageWait { retry } => {
                    aem.get_login_page_wait_until_ready(&retry.options()).await
                }
                AemAction::InstallStatusWait { retry } => {
                    aem.get_install_status_wait_until_finished(&retry.options())
                        .await
                }
                AemAction::PackageManagerStatusWait { retry } => {
                    aem.get_package_manager_servlet_status_wait_until_ready(&retry.options())
                        .await
                }
            }
        }
        Commands::Package {
            group,
            name,
            version,
            action,
        } => return cmd_package(client, &group, &name, &version, action).await,
        Commands::Repository { action } => {
            let repository = client.repository();
            match action {
                RepositoryAction::BlockWrites => repository.block_writes().await,
                RepositoryAction::UnblockWrites => repository.unblock_writes().await,
            }
        }
        Commands::Path { path, action } => match action {
            PathAction::Activate {
                ignore_deactivated,
                modified_only,
            } => {
                client
                    .path(&path)
                    .activate(ignore_deactivated, modified_only)
                    .await
            }
        },
        Commands::FlushAgent {
            run_mode,
            name,
            action,
        } => {
            let agent = client.flush_agent(&run_mode, &name);
            match action {
                FlushAgentAction::CreateUpdate {
                    title,
                    description,
                    dest_base_url,
                } => {
                    agent
                        .create_update(&title, &description, &dest_base_url)
                        .await
                }
                FlushAgentAction::Delete => agent.delete().await,
                FlushAgentAction::Exists => agent.exists().await,
            }
        }
        Commands::User { path, name, action } => {
            let user = client.user(&path, &name);
            match action {
                UserAction::Create { password } => user.create(&password).await,
                UserAction::ChangePassword {
                    old_password,
                    new_password,
                } => user.change_password(&old_password, &new_password).await,
            }
        }
    };
    Ok(vec![result?])
}

async fn cmd_package(
    client: &AemClient,
    group: &str,
    name: &str,
    version: &str,
    action: PackageAction,
) -> Result<Vec<AemResult>> {
    let package = client.package(group, name, version);
    let label = package.identity().to_string();

    let result = match action {
        PackageAction::Create => package.create().await,
        PackageAction::Update { filter } => package.update(&filter).await,
        PackageAction::Delete => package.delete().await,
        PackageAction::Build => package.build().await,
        PackageAction::Install { no_recursive } => package.install(!no_recursive).await,
        PackageAction::Uninstall => package.uninstall().await,
        PackageAction::Replicate => package.replicate().await,
        PackageAction::Download { dir } => package.download(&dir).await,
        PackageAction::Upload { dir, force } => package.upload(&dir, force).await,
        PackageAction::GetFilter => package.get_filter().await,
        PackageAction::ActivateFilter {
            ignore_deactivated,
            modified_only,
        } => {
            return package
                .activate_filter(ignore_deactivated, modified_only)
                .await
                .with_context(|| format!("Failed to activate filter of {}", label));
        }
        PackageAction::Versions => package.get_versions().await,
        PackageAction::Exists => package.exists().await,
        PackageAction::IsUploaded => package.is_uploaded().await,
        PackageAction::IsInstalled => package.is_installed().await,
        PackageAction::IsEmpty => package.is_empty().await,
        PackageAction::IsBuilt => package.is_built().await,
        PackageAction::UploadWait { dir, force, retry } => {
            package
                .upload_wait_until_ready(&dir, force, &retry.options())
                .await
        }
        PackageAction::InstallWait {
            no_recursive,
            retry,
        } => {
            package
                .install_wait_until_ready(!no_recursive, &retry.options())
                .await
        }
        PackageAction::DeleteWait { retry } => {
            package.delete_wait_until_ready(&retry.options()).await
        }
        PackageAction::BuildWait { retry } => {
            package.build_wait_until_ready(&retry.options()).await
        }
    };

    let result = result.with_context(|| format!("Package {} operation failed", label))?;
    Ok(vec![result])
}

fn data_json(data: &ResultData) -> Value {
    match data {
        ResultData::None | ResultData::Document(_) => Value::Null,
        ResultData::Bool(b) => Value::Bool(*b),
        ResultData::Strings(items) => json!(items),
    }
}

fn result_json(result: &AemResult) -> Value {
    json!({
        "message": result.message(),
        "success": result.is_success(),
        "status": result.response().map(|r| r.status_code),
        "data": data_json(result.data()),
    })
}

/// Print results; fail if any of them is not a success.
fn report(results: &[AemResult], json: bool) -> Result<()> {
    for result in results {
        if json {
            println!("{}", serde_json::to_string(&result_json(result))?);
            continue;
        }
        println!("{}", result.message());
        if let Some(items) = result.data().as_strings() {
            for item in items {
                println!("  {}", item);
            }
        }
    }

    if let Some(failed) = results.iter().find(|r| !r.is_success()) {
        anyhow::bail!("{}", failed.message());
    }
    Ok(())
}
