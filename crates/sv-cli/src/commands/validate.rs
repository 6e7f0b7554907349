use std::sync::Arc;

use anyhow::{bail, Result};
use sv_runtime::{HttpStoreFactory, ModeController, RunOptions};

use super::{build_request, load_config};
use crate::RequestArgs;

pub struct ValidateArgs {
    pub request: RequestArgs,
    pub config_paths: Vec<String>,
    pub environment: Option<String>,
    pub no_alert: bool,
    pub no_upload: bool,
}

pub async fn run(args: ValidateArgs) -> Result<()> {
    let (loaded, config) = load_config(&args.config_paths)?;
    let mut req = build_request(&args.request)?;
    if args.environment.is_some() {
        req.environment = args.environment.clone();
    }

    let stores = HttpStoreFactory::from_env(&config.source).await;
    let mut controller = ModeController::new(config, Arc::new(stores));
    if let Some(l) = &loaded {
        controller = controller.with_config_hash(l.config_hash.clone());
    }

    let opts = RunOptions {
        alerts: !args.no_alert,
        write_report: true,
        upload_report: !args.no_upload,
    };
    let outcome = controller.run(&req, opts).await?;

    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    if let Some(path) = &outcome.report.local_path {
        tracing::info!(path = %path.display(), "report written");
    }

    if outcome.is_fatal() {
        bail!(
            "VALIDATION_FAILED: {} discrepancies (mode={}, container={}, bucket={})",
            outcome.result.discrepancies.len(),
            outcome.result.mode,
            outcome.result.source,
            outcome.result.target
        );
    }
    Ok(())
}
