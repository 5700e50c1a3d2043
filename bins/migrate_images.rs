//! Move every locally stored service history image to the remote store.
//!
//! Usage: `migrate-images [--dry-run]`
//!
//! Run while the server is stopped. Safe to re-run: images already on the
//! remote store are not selected again.

use std::process::ExitCode;

use anyhow::Context;
use configs::AppConfig;
use service::{runtime, MigrationJob};
use tracing::{error, info};

fn dry_run_requested() -> anyhow::Result<bool> {
    let mut dry_run = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dry-run" | "-n" => dry_run = true,
            other => anyhow::bail!("unknown argument {other}; usage: migrate-images [--dry-run]"),
        }
    }
    Ok(dry_run)
}

async fn run(dry_run: bool) -> anyhow::Result<bool> {
    let cfg = AppConfig::load_and_validate()?;
    if cfg.remote.is_none() {
        anyhow::bail!("remote storage is not configured; set CLOUDINARY_* or a [remote] section");
    }
    let db = models::db::connect_with_config(&cfg.database).await?;
    let storage = runtime::build_storage(&cfg).await?;
    let job = MigrationJob::from_storage(db, &storage)?;

    if dry_run {
        let plan = job.dry_run().await?;
        info!(candidates = plan.candidates.len(), "dry run");
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(true);
    }

    let report = job.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.failed.is_empty())
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    common::utils::logging::init_logging_from_env();

    let dry_run = match dry_run_requested() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build().context("build tokio runtime") {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "runtime_build_failed");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(dry_run)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("some images failed to migrate; re-run after fixing the cause");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "image migration aborted");
            ExitCode::FAILURE
        }
    }
}
