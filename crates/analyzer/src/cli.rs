use std::path::PathBuf;

use anyhow::{Context, Result};
use common::config::Config;
use common::snapshots::{AnySnapshotSource, SnapshotSource};
use serde_json::Value;

use crate::address_tracker::track_address;
use crate::comparator::compare;
use crate::dataset::{Dataset, CURRENT_LABEL, DEFAULT_TOP_N};
use crate::metrics::record_dataset_loaded;
use crate::multipliers::MultiplierTable;

pub const USAGE: &str = "usage: analyzer [--config <path>] <command>
  report <balances> <voting_power>
  wallet <balances> <voting_power> <address>
  track <address> [<balances> <voting_power>]
  compare <balances> <voting_power> <date>
  snapshots";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetFiles {
    pub balances: PathBuf,
    pub voting_power: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Report(DatasetFiles),
    Wallet { files: DatasetFiles, address: String },
    Track { address: String, files: Option<DatasetFiles> },
    Compare { files: DatasetFiles, date: String },
    Snapshots,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub command: Command,
}

fn dataset_files<I>(args: &mut I, usage: &str) -> std::result::Result<DatasetFiles, String>
where
    I: Iterator<Item = String>,
{
    let balances = args.next().ok_or_else(|| usage.to_string())?;
    let voting_power = args.next().ok_or_else(|| usage.to_string())?;
    Ok(DatasetFiles {
        balances: balances.into(),
        voting_power: voting_power.into(),
    })
}

pub fn parse_args<I>(args: I) -> std::result::Result<Invocation, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0], pull `--config <path>` out from wherever it appears.
    let mut config = None;
    let mut rest = Vec::new();
    let mut args = args.skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args
                .next()
                .ok_or_else(|| "--config requires a path".to_string())?;
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }

    let mut args = rest.into_iter();
    let Some(cmd) = args.next() else {
        return Err(USAGE.to_string());
    };

    let command = match cmd.as_str() {
        "report" => Command::Report(dataset_files(&mut args, "usage: analyzer report <balances> <voting_power>")?),
        "wallet" => {
            let usage = "usage: analyzer wallet <balances> <voting_power> <address>";
            let files = dataset_files(&mut args, usage)?;
            let address = args.next().ok_or_else(|| usage.to_string())?;
            Command::Wallet { files, address }
        }
        "track" => {
            let usage = "usage: analyzer track <address> [<balances> <voting_power>]";
            let address = args.next().ok_or_else(|| usage.to_string())?;
            let files = match args.next() {
                None => None,
                Some(balances) => {
                    let voting_power = args.next().ok_or_else(|| usage.to_string())?;
                    Some(DatasetFiles {
                        balances: balances.into(),
                        voting_power: voting_power.into(),
                    })
                }
            };
            Command::Track { address, files }
        }
        "compare" => {
            let usage = "usage: analyzer compare <balances> <voting_power> <date>";
            let files = dataset_files(&mut args, usage)?;
            let date = args.next().ok_or_else(|| usage.to_string())?;
            Command::Compare { files, date }
        }
        "snapshots" => Command::Snapshots,
        other => return Err(format!("unknown command: {other}\n{USAGE}")),
    };

    Ok(Invocation { config, command })
}

fn load(files: &DatasetFiles) -> Result<Dataset> {
    let ds = Dataset::load_files(CURRENT_LABEL, &files.balances, &files.voting_power)?;
    record_dataset_loaded("file", &ds.summary());
    tracing::info!(
        balances = %files.balances.display(),
        holders = ds.balances().len(),
        "dataset loaded"
    );
    Ok(ds)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("failed to serialize output")
}

/// Run one command and return what it would print.
pub async fn execute(config: &Config, command: Command) -> Result<Value> {
    let source = AnySnapshotSource::from_config(&config.snapshots)?;
    let table = MultiplierTable::from(&config.multipliers);

    match command {
        Command::Report(files) => to_json(&load(&files)?.report(DEFAULT_TOP_N)),
        Command::Wallet { files, address } => {
            let detail = load(&files)?
                .wallet_detail(&address, &table)
                .with_context(|| format!("address {address} has no balance row"))?;
            to_json(&detail)
        }
        Command::Track { address, files } => {
            let current = files.as_ref().map(load).transpose()?;
            let dates: Vec<String> = source
                .list_snapshots()
                .await?
                .into_iter()
                .map(|e| e.date)
                .collect();
            let results = track_address(
                &source,
                current.as_ref(),
                &address,
                &dates,
                config.snapshots.fetch_timeout(),
            )
            .await;
            to_json(&results)
        }
        Command::Compare { files, date } => {
            let current = load(&files)?;
            let docs = source
                .load_snapshot(&date)
                .await
                .with_context(|| format!("failed to load snapshot {date}"))?;
            let historical = Dataset::from_snapshot(&docs);
            to_json(&compare(&date, current.summary(), historical.summary()))
        }
        Command::Snapshots => to_json(&source.list_snapshots().await?),
    }
}

pub async fn run_command(config: &Config, command: Command) -> Result<()> {
    let output = execute(config, command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn config_path(invocation: &Invocation) -> PathBuf {
    invocation
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path)
}
