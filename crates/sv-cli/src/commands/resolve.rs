use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use sv_reconcile::ExpectationSet;
use sv_runtime::resolve_expectations;
use sv_schemas::RunMode;

use super::{build_request, load_config};
use crate::RequestArgs;

#[derive(Serialize)]
struct Resolved {
    mode: RunMode,
    expectations: ExpectationSet,
}

pub fn run(args: &RequestArgs, config_paths: &[String]) -> Result<()> {
    let (_, config) = load_config(config_paths)?;
    let req = build_request(args)?;
    let (mode, expectations) = resolve_expectations(&config, &req, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&Resolved { mode, expectations })?);
    Ok(())
}
