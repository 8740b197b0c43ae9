mod commands;
pub mod error;
pub mod output;
pub mod utils;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::gcloud::RealGcloud;
use crate::backend::{Backend, Credentials, Endpoints};
use crate::bulk::{BatchPolicy, QueryTarget};
use crate::config::{JsonFileStore, ProjectConfig, paths};
use commands::firestore::ExportOptions;
use commands::update::{CRATES_IO_URL, CURRENT_VERSION, CargoInstaller, NO_UPDATE_CHECK_ENV};
use commands::{auth, firestore, storage, update, use_project};
use error::{CliError, CliResult};
use output::{confirm, info};

#[derive(Parser)]
#[command(name = "fb-extra")]
#[command(author, version, about = "Firebase administration CLI", long_about = None)]
pub struct Cli {
    /// Config file (default: FB_EXTRA_CONFIG or ~/.config/fb-extra/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the currently active project
    Use {
        /// Firebase project id
        project: String,
        /// Service account key to store instead of creating one with gcloud
        #[arg(long)]
        key_file: Option<PathBuf>,
    },
    /// Authentication commands
    Auth {
        /// Run against a tenant instead of the project
        #[arg(long, global = true)]
        tenant: Option<String>,
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Firestore commands
    Firestore {
        #[command(subcommand)]
        command: FirestoreCommands,
    },
    /// Cloud Storage commands
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
    /// Update the CLI to the latest published version
    Update,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Create a user
    #[command(visible_alias = "cu")]
    CreateUser {
        email: String,
        password: String,
        uid: Option<String>,
        custom_claims: Option<String>,
    },
    /// Replace a user's custom claims
    #[command(visible_alias = "uc")]
    UpdateClaims {
        /// User id or email
        identifier: String,
        custom_claims: String,
    },
    /// Change a user's password
    #[command(visible_alias = "cp")]
    ChangePassword {
        identifier: String,
        new_password: String,
    },
    /// Change a user's email
    #[command(visible_alias = "ce")]
    ChangeEmail {
        identifier: String,
        new_email: String,
    },
    /// Remove a user
    #[command(visible_alias = "ru")]
    RemoveUser { identifier: String },
    /// Remove every user except the excluded ones
    #[command(visible_alias = "rus")]
    RemoveUsers {
        /// Comma separated ids or emails to keep
        excluded: Option<String>,
        /// Continue after a failed removal
        #[arg(long)]
        keep_going: bool,
    },
    /// List one page of users
    #[command(visible_alias = "lu")]
    ListUsers {
        #[arg(default_value_t = 100)]
        page_size: u32,
        page_token: Option<String>,
        /// Write the page as JSON to this file
        output: Option<PathBuf>,
    },
    /// Show a user
    #[command(visible_alias = "gu")]
    GetUser {
        identifier: String,
        /// Write the user as JSON to this file
        output: Option<PathBuf>,
    },
    /// Mint a custom token
    #[command(visible_alias = "cct")]
    CreateCustomToken { uid: String, claims: Option<String> },
    /// Copy a user into a tenant
    #[command(visible_alias = "at")]
    AddTenant {
        identifier: String,
        #[arg(value_name = "TENANT")]
        target_tenant: String,
    },
}

#[derive(Args)]
struct ExportArgs {
    /// Collection path, or collection id for group exports
    collection: String,
    output: PathBuf,
    /// json, csv, tab or xlsx
    #[arg(value_name = "TYPE")]
    export_type: Option<String>,
    /// `*` or comma separated columns
    columns: Option<String>,
    /// JSON array of {key, filter, value}
    query: Option<String>,
    sort: Option<String>,
    /// asc or desc
    sort_direction: Option<String>,
    limit: Option<u32>,
}

impl ExportArgs {
    fn options(&self) -> ExportOptions<'_> {
        ExportOptions {
            format: self.export_type.as_deref(),
            columns: self.columns.as_deref(),
            query: self.query.as_deref(),
            sort: self.sort.as_deref(),
            sort_direction: self.sort_direction.as_deref(),
            limit: self.limit,
        }
    }
}

#[derive(Subcommand)]
enum FirestoreCommands {
    /// Add a document with a generated id
    #[command(visible_alias = "ad")]
    AddDocument {
        collection: String,
        /// Inline JSON object or path to a JSON file
        data: String,
    },
    /// Remove every document of a collection except the excluded ones
    #[command(visible_alias = "rc")]
    RemoveCollection {
        collection: String,
        /// Comma separated document ids to keep
        excluded: Option<String>,
        #[arg(long)]
        keep_going: bool,
    },
    /// Export a collection
    #[command(visible_alias = "ec")]
    ExportCollection(ExportArgs),
    /// Export every collection with the given id
    #[command(visible_alias = "ecg")]
    ExportCollectionGroup(ExportArgs),
    /// Import a JSON array of documents
    #[command(visible_alias = "ic")]
    ImportCollection {
        collection: String,
        file: PathBuf,
        /// Merge into existing documents instead of replacing them
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        merge: Option<bool>,
        #[arg(long)]
        keep_going: bool,
    },
    /// Copy a document
    #[command(visible_alias = "dd")]
    DuplicateDocument { origin: String, destination: String },
    /// Save a document as JSON
    #[command(visible_alias = "gd")]
    GetDocument { path: String, output: PathBuf },
}

#[derive(Subcommand)]
enum StorageCommands {
    /// Download a bucket, or the objects under a prefix, into the working directory
    #[command(visible_alias = "e")]
    Export {
        /// Remote prefix
        directory: Option<String>,
        #[arg(long)]
        bucket: Option<String>,
    },
    /// Upload a local folder
    #[command(visible_alias = "i")]
    Import {
        #[arg(default_value = ".")]
        folder: PathBuf,
        #[arg(long)]
        bucket: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "fb_extra=debug"
    } else {
        "fb_extra=warn"
    };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn policy(keep_going: bool) -> BatchPolicy {
    if keep_going {
        BatchPolicy::keep_going()
    } else {
        BatchPolicy::abort()
    }
}

pub async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !matches!(cli.command, Commands::Update)
        && std::env::var_os(NO_UPDATE_CHECK_ENV).is_none()
        && let Some(notice) = update::update_notice(CRATES_IO_URL).await
    {
        eprintln!("{}", notice);
    }

    let output = execute(cli).await?;
    println!("{}", output);
    Ok(())
}

async fn execute(cli: Cli) -> CliResult<String> {
    let Cli {
        config,
        yes,
        command,
        ..
    } = cli;
    let config_path = match config {
        Some(path) => path,
        None => paths::get_config_path()?,
    };
    let mut config = ProjectConfig::new(JsonFileStore::open(config_path)?);

    match command {
        Commands::Use { project, key_file } => use_project::use_project(
            &mut config,
            &RealGcloud::new(),
            &project,
            key_file.as_deref(),
        ),
        Commands::Update => {
            let latest = update::latest_version(CRATES_IO_URL).await?;
            update::update(&CargoInstaller, CURRENT_VERSION, &latest, || {
                confirm("Are you sure you want to update CLI?", true, yes)
            })
        }
        command => {
            let project = config.active_project().ok_or(CliError::NoActiveProject)?;
            eprintln!("{}", info(&format!("Using project {}.", project)));

            let credentials = Credentials::resolve(config.credential(&project).as_deref())?;
            let backend = Backend::connect(&project, Arc::new(credentials), &Endpoints::from_env());
            dispatch(command, &backend, yes).await
        }
    }
}

async fn dispatch(command: Commands, backend: &Backend, yes: bool) -> CliResult<String> {
    match command {
        Commands::Auth { tenant, command } => {
            run_auth(command, backend, tenant.as_deref(), yes).await
        }
        Commands::Firestore { command } => run_firestore(command, backend).await,
        Commands::Storage { command } => run_storage(command, backend).await,
        Commands::Use { .. } | Commands::Update => Err(CliError::invalid(
            "command does not run against a project",
        )),
    }
}

async fn run_auth(
    command: AuthCommands,
    backend: &Backend,
    tenant: Option<&str>,
    yes: bool,
) -> CliResult<String> {
    let store = backend.auth.for_tenant(tenant);

    match command {
        AuthCommands::CreateUser {
            email,
            password,
            uid,
            custom_claims,
        } => {
            auth::create_user(
                &store,
                &email,
                &password,
                uid.as_deref(),
                custom_claims.as_deref(),
            )
            .await
        }
        AuthCommands::UpdateClaims {
            identifier,
            custom_claims,
        } => auth::update_claims(&store, &identifier, &custom_claims).await,
        AuthCommands::ChangePassword {
            identifier,
            new_password,
        } => auth::change_password(&store, &identifier, &new_password).await,
        AuthCommands::ChangeEmail {
            identifier,
            new_email,
        } => auth::change_email(&store, &identifier, &new_email).await,
        AuthCommands::RemoveUser { identifier } => {
            auth::remove_user(&store, &identifier, |user| {
                confirm(
                    &format!("Are you sure you want to remove user {}?", user.label()),
                    false,
                    yes,
                )
            })
            .await
        }
        AuthCommands::RemoveUsers {
            excluded,
            keep_going,
        } => auth::remove_users(&store, excluded.as_deref(), policy(keep_going)).await,
        AuthCommands::ListUsers {
            page_size,
            page_token,
            output,
        } => {
            auth::list_users(&store, page_size, page_token.as_deref(), output.as_deref()).await
        }
        AuthCommands::GetUser { identifier, output } => {
            auth::get_user(&store, &identifier, output.as_deref()).await
        }
        AuthCommands::CreateCustomToken { uid, claims } => auth::create_custom_token(
            backend.credentials.service_account(),
            &uid,
            claims.as_deref(),
            store.tenant(),
        ),
        AuthCommands::AddTenant {
            identifier,
            target_tenant,
        } => {
            let tenant_store = backend.auth.for_tenant(Some(&target_tenant));
            auth::add_tenant(&store, &tenant_store, &identifier, &target_tenant).await
        }
    }
}

async fn run_firestore(command: FirestoreCommands, backend: &Backend) -> CliResult<String> {
    let store = &backend.firestore;

    match command {
        FirestoreCommands::AddDocument { collection, data } => {
            firestore::add_document(store, &collection, &data).await
        }
        FirestoreCommands::RemoveCollection {
            collection,
            excluded,
            keep_going,
        } => {
            firestore::remove_collection(store, &collection, excluded.as_deref(), policy(keep_going))
                .await
        }
        FirestoreCommands::ExportCollection(args) => {
            let target = QueryTarget::Collection(args.collection.clone());
            firestore::export_collection(store, target, &args.output, args.options()).await
        }
        FirestoreCommands::ExportCollectionGroup(args) => {
            let target = QueryTarget::CollectionGroup(args.collection.clone());
            firestore::export_collection(store, target, &args.output, args.options()).await
        }
        FirestoreCommands::ImportCollection {
            collection,
            file,
            merge,
            keep_going,
        } => {
            firestore::import_collection(
                store,
                &collection,
                &file,
                merge.unwrap_or(false),
                policy(keep_going),
            )
            .await
        }
        FirestoreCommands::DuplicateDocument {
            origin,
            destination,
        } => firestore::duplicate_document(store, &origin, &destination).await,
        FirestoreCommands::GetDocument { path, output } => {
            firestore::get_document(store, &path, &output).await
        }
    }
}

async fn run_storage(command: StorageCommands, backend: &Backend) -> CliResult<String> {
    let cwd = std::env::current_dir()?;

    match command {
        StorageCommands::Export { directory, bucket } => {
            let bucket = bucket.unwrap_or_else(|| backend.default_bucket());
            storage::export(&backend.storage, &bucket, directory.as_deref(), &cwd).await
        }
        StorageCommands::Import { folder, bucket } => {
            let bucket = bucket.unwrap_or_else(|| backend.default_bucket());
            storage::import(&backend.storage, &bucket, &cwd, &folder).await
        }
    }
}

#[cfg(test)]
#[path = "utils_test.rs"]
mod utils_test;
