use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

mod db;
mod error;
mod extract;
mod matching;
mod models;
mod ocr;
mod report;
mod server;

#[derive(Parser)]
#[command(name = "attendance-tracker")]
#[command(about = "Student ID-card attendance tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small realistic roster
    Seed,
    /// Register students in bulk from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the attendance HTTP service
    Serve {
        #[arg(long, default_value = "127.0.0.1:5780")]
        bind: String,
        #[arg(long, env = "OCR_SERVICE_URL", default_value = "http://127.0.0.1:8000")]
        ocr_url: String,
        #[arg(long, default_value = "http://localhost:3000")]
        allowed_origin: String,
    },
    /// Generate a markdown attendance report
    #[command(group(
        ArgGroup::new("scope")
            .args(["class", "student_code"])
            .multiple(false)
    ))]
    Report {
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        student_code: Option<String>,
        #[arg(long, default_value_t = 7)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed roster inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Serve {
            bind,
            ocr_url,
            allowed_origin,
        } => {
            let ocr = ocr::OcrClient::new(&ocr_url)
                .context("failed to build OCR service client")?;
            let state = server::AppState::new(pool, ocr);
            let app = server::build_router(state, &allowed_origin)?;

            let listener = tokio::net::TcpListener::bind(&bind)
                .await
                .with_context(|| format!("failed to bind {bind}"))?;
            info!("attendance-tracker listening on http://{bind}");
            info!("OCR service at {ocr_url}");

            axum::serve(listener, app).await?;
        }
        Commands::Report {
            class,
            student_code,
            since_days,
            out,
        } => {
            if let Some(code) = student_code.as_deref() {
                db::find_student_by_code(&pool, code)
                    .await?
                    .with_context(|| format!("no student registered with code {code}"))?;
            }

            let cutoff = Utc::now() - Duration::days(since_days.max(1));
            let rows = db::fetch_attendance(
                &pool,
                cutoff,
                class.as_deref(),
                student_code.as_deref(),
            )
            .await?;
            let scope = class.as_deref().or(student_code.as_deref());
            let report = report::build_report(scope, since_days, cutoff, &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
