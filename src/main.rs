use anyhow::{Context, Result};
use arrow::{record_batch::RecordBatch, util::pretty::print_batches};
use flowbased::{
    config::{Command, Config},
    input::read_payloads,
    process::{
        build_from_records, derive_maczt, parse_final_domain, parse_net_positions,
        parse_utility_tool_xml, Record,
    },
};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn parse_payload(config: &Config, bytes: &[u8]) -> Result<RecordBatch> {
    let batch = match &config.command {
        Command::UtilityTool(subject) => parse_utility_tool_xml(bytes, *subject)?,
        Command::NetPositions => parse_net_positions(bytes)?,
        Command::FinalDomain => parse_final_domain(std::str::from_utf8(bytes)?)?,
        Command::Maczt => {
            let domain = parse_final_domain(std::str::from_utf8(bytes)?)?;
            derive_maczt(&domain, &config.maczt_zone)?
        }
        Command::Records { subject, nested } => {
            let data: Record = serde_json::from_slice(bytes).context("decoding record dump")?;
            build_from_records(&data, subject, *nested)?
        }
    };
    Ok(batch)
}

fn main() -> Result<()> {
    let config = Config::from_env()?;

    // ─── 1) init logging ─────────────────────────────────────────────
    fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!(command = ?config.command, pattern = %config.pattern, "startup");

    // ─── 2) read inputs ──────────────────────────────────────────────
    let payloads = read_payloads(&config.pattern)?;
    if payloads.is_empty() {
        info!("no files match {}; exit", config.pattern);
        return Ok(());
    }

    // ─── 3) parse and print each file ────────────────────────────────
    let mut failed = 0usize;
    for (path, bytes) in payloads {
        let start = Instant::now();
        match parse_payload(&config, &bytes) {
            Ok(batch) => {
                info!(
                    path = %path.display(),
                    rows = batch.num_rows(),
                    columns = batch.num_columns(),
                    elapsed = ?start.elapsed(),
                    "parsed"
                );
                print_batches(&[batch])?;
            }
            Err(e) => {
                error!("{} failed: {:#}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} file(s) failed to parse", failed);
    }
    info!("all done");
    Ok(())
}
