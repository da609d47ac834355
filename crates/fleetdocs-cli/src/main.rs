//! fleetdocs CLI: upload and manage company documents from the command line.
//!
//! Configuration comes from the environment (or `.env`): DATABASE_URL,
//! STORAGE_BACKEND and the backend settings.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use fleetdocs_cli::{init_tracing, parse_date_bound, read_upload_file, render_record_table};
use fleetdocs_core::models::{
    EntityType, FileFilters, FileRecord, Page, UploadRequest, UploadedFile, DEFAULT_PAGE_LIMIT,
};
use fleetdocs_core::{Config, ErrorMetadata};
use fleetdocs_services::AppContext;
use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "fleetdocs", about = "Fleet document storage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(clap::Args)]
struct PageArgs {
    /// Maximum number of items
    #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
    limit: i64,
    /// Offset for pagination
    #[arg(long, default_value_t = 0)]
    offset: i64,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

impl PageArgs {
    fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Upload files for a company, staff member, driver or passenger
    Upload {
        /// Company id
        #[arg(long)]
        company: String,
        /// Entity type: company, staff, driver, passenger
        #[arg(long, default_value = "company")]
        entity_type: String,
        /// Entity id (required for staff, driver and passenger)
        #[arg(long)]
        entity_id: Option<String>,
        /// Document type, e.g. logo, cni, permis_conduite
        #[arg(long)]
        document_type: String,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload files to a generic folder (no metadata records)
    UploadFolder {
        /// Target folder: company, drivers, vehicles, other or company/...
        #[arg(long)]
        folder: String,
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the active files of a company
    List {
        /// Company id
        company: String,
        /// Only this document type
        #[arg(long)]
        document_type: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List the active files of one entity
    Entity {
        /// Company id
        company: String,
        /// Entity type: company, staff, driver, passenger
        entity_type: String,
        /// Entity id
        entity_id: String,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List the logos of a company
    Logos {
        /// Company id
        company: String,
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Search active files
    Search {
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long)]
        entity_id: Option<String>,
        #[arg(long)]
        document_type: Option<String>,
        /// Inclusive lower bound: YYYY-MM-DD or RFC 3339
        #[arg(long)]
        from: Option<String>,
        /// Inclusive upper bound: YYYY-MM-DD or RFC 3339
        #[arg(long)]
        to: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Get a single file record by ID
    Get {
        /// File UUID
        id: Uuid,
    },
    /// File statistics of a company
    Stats {
        /// Company id
        company: String,
    },
    /// Replace the metadata map of a file
    SetMetadata {
        /// File UUID
        id: Uuid,
        /// JSON object
        metadata: String,
    },
    /// Delete a file (soft by default)
    Delete {
        /// File UUID
        id: Uuid,
        /// Remove the record and the stored objects
        #[arg(long)]
        hard: bool,
    },
    /// Download the original bytes of a file
    Download {
        /// File UUID
        id: Uuid,
        /// Output path (defaults to the original name in the current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn print_records(records: &[FileRecord], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let views: Vec<_> = records.iter().map(FileRecord::to_public).collect();
            print_json(&views)
        }
        OutputFormat::Table => {
            print!("{}", render_record_table(records));
            Ok(())
        }
    }
}

fn parse_entity_type(value: &str) -> anyhow::Result<EntityType> {
    Ok(value.parse::<EntityType>()?)
}

async fn read_files(paths: &[PathBuf]) -> anyhow::Result<Vec<UploadedFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push(read_upload_file(path).await?);
    }
    Ok(files)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let app = AppContext::initialize(config).await?;

    match cli.command {
        Commands::Upload {
            company,
            entity_type,
            entity_id,
            document_type,
            files,
        } => {
            let request = UploadRequest {
                company_id: company,
                entity_type,
                entity_id,
                document_type,
                files: read_files(&files).await?,
            };
            match app.uploads.upload(request).await {
                Ok(response) => print_json(&response)?,
                Err(e) => bail!("{} ({})", e.client_message(), e.error_code()),
            }
        }
        Commands::UploadFolder { folder, files } => {
            let files = read_files(&files).await?;
            match app.uploads.upload_to_folder(&folder, files).await {
                Ok(response) => print_json(&response)?,
                Err(e) => bail!("{} ({})", e.client_message(), e.error_code()),
            }
        }
        Commands::List {
            company,
            document_type,
            page,
        } => {
            let records = match document_type {
                Some(ref document_type) => {
                    app.files
                        .list_document_type(&company, document_type, page.page())
                        .await?
                }
                None => app.files.list_company(&company, page.page()).await?,
            };
            print_records(&records, page.format)?;
        }
        Commands::Entity {
            company,
            entity_type,
            entity_id,
            page,
        } => {
            let entity_type = parse_entity_type(&entity_type)?;
            let records = app
                .files
                .list_entity(&company, entity_type, &entity_id, page.page())
                .await?;
            print_records(&records, page.format)?;
        }
        Commands::Logos { company, format } => {
            let records = app.files.company_logos(&company).await?;
            print_records(&records, format)?;
        }
        Commands::Search {
            company,
            entity_type,
            entity_id,
            document_type,
            from,
            to,
            page,
        } => {
            let filters = FileFilters {
                company_id: company,
                entity_type: entity_type.as_deref().map(parse_entity_type).transpose()?,
                entity_id,
                document_type,
                date_from: from.as_deref().map(|v| parse_date_bound(v, false)).transpose()?,
                date_to: to.as_deref().map(|v| parse_date_bound(v, true)).transpose()?,
            };
            let records = app.files.search(&filters, page.page()).await?;
            print_records(&records, page.format)?;
        }
        Commands::Get { id } => {
            let record = app.files.get(id).await?;
            print_json(&record.to_public())?;
        }
        Commands::Stats { company } => {
            let stats = app.files.stats(&company).await?;
            print_json(&stats)?;
        }
        Commands::SetMetadata { id, metadata } => {
            let metadata: serde_json::Value =
                serde_json::from_str(&metadata).context("Metadata must be valid JSON")?;
            let record = app.files.update_metadata(id, metadata).await?;
            print_json(&record.to_public())?;
        }
        Commands::Delete { id, hard } => {
            if hard {
                app.files.hard_delete(id).await?;
                println!("Deleted {} permanently", id);
            } else {
                app.files.delete(id).await?;
                println!("Deleted {}", id);
            }
        }
        Commands::Download { id, output } => {
            let (record, mut stream) = app.files.download(id).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&record.original_name));

            let mut file = tokio::fs::File::create(&path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut written = 0usize;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                written += chunk.len();
                file.write_all(&chunk).await?;
            }
            file.flush().await?;

            println!("Wrote {} bytes to {}", written, path.display());
        }
    }

    Ok(())
}
