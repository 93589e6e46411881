//! # SSE Client Test
//!
//! Connects to a running `server_sse`, prints every pushed quote with its
//! change against the last value seen for the same symbol, and reports
//! frames that cannot be decoded.

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use lib_common::core::{FrameBuffer, parse_frame};
use lib_common::markets::stocks::{PriceModel, StockRecord};

#[derive(Parser, Debug)]
#[clap(about = "Prints live price updates from a push stream")]
struct Args {
    /// Root URL of the server's API.
    #[clap(long, env = "SSE_API_URL", default_value = "http://127.0.0.1:8080/api/v1")]
    api_url: String,

    /// Stop after this many updates.
    #[clap(long)]
    max_events: Option<usize>,
}

/// Stores `record` in `model` and returns the change of `current` against the
/// previous value of the same symbol. Unknown symbols are appended with a zero
/// delta.
fn apply_update(model: &mut PriceModel, record: StockRecord) -> f64 {
    match model.find_stock_index(&record.symbol) {
        Some(index) => {
            let delta = record.current - model.pricelist[index].current;
            model.pricelist[index] = record;
            delta
        }
        None => {
            model.pricelist.push(record);
            0.0
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let api_url = args.api_url.trim_end_matches('/');

    // // Statement: Baseline prices so the first update already has a delta
    let mut model: PriceModel = reqwest::get(format!("{api_url}/getData"))
        .await?
        .error_for_status()?
        .json()
        .await
        .context("decoding the price list")?;
    log::info!("Tracking {} symbols", model.pricelist.len());

    let response = reqwest::get(format!("{api_url}/subscribe")).await?.error_for_status()?;
    println!("[*] Connected to {api_url}/subscribe");

    let mut stream = response.bytes_stream();
    let mut buffer = FrameBuffer::new();
    let mut seen = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("reading the push stream")?;
        for frame in buffer.push(&chunk) {
            match frame.and_then(|frame| parse_frame(&frame)) {
                Ok(record) => {
                    let (symbol, name, current) = (record.symbol.clone(), record.name.clone(), record.current);
                    let delta = apply_update(&mut model, record);
                    println!("{:<6} {:<22} {:>10.3} {:>+9.3}", symbol, name, current, delta);
                    seen += 1;
                }
                Err(e) => log::warn!("Skipping malformed frame: {}", e),
            }
            if args.max_events.is_some_and(|max| seen >= max) {
                log::info!("Received {} updates, stopping", seen);
                return Ok(());
            }
        }
    }

    log::info!("Stream closed by the server after {} updates", seen);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_common::markets::stocks::Stocklist;

    #[test]
    fn delta_is_measured_against_previous_value() {
        let mut model = Stocklist::find();
        let mut hpe = model.pricelist[3].clone();
        hpe.current = 14.62;

        let delta = apply_update(&mut model, hpe);
        assert!((delta - 0.5).abs() < 1e-9);
        assert_eq!(model.pricelist[3].current, 14.62);
    }

    #[test]
    fn unknown_symbol_is_added() {
        let mut model = Stocklist::find();
        let delta = apply_update(&mut model, StockRecord::new("NEW", "Newcomer", 1.0, 2.0, 1.5));
        assert_eq!(delta, 0.0);
        assert_eq!(model.find_stock_index("NEW"), Some(6));
    }
}
