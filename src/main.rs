use dotenv::dotenv;
use hltv_arb_bot::match_fetcher::fetch_upcoming_matches;
use hltv_arb_bot::pipeline::{run_concurrent, run_sequential, summarize, RendererOddsSource};
use hltv_arb_bot::renderer::{DocumentRenderer, WebDriverRenderer};
use hltv_arb_bot::shared_types::{MatchOutcome, MatchReport};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn print_report(report: &MatchReport) {
    let m = &report.match_info;
    println!(
        "--- {} ({}, {}, {}) ---",
        m,
        m.start_time.format("%Y-%m-%d %H:%M UTC"),
        m.event.as_deref().unwrap_or("unknown event"),
        m.format,
    );
    match &report.outcome {
        MatchOutcome::Opportunity(opp) => {
            println!("⚡ Arbitrage Opportunity Found!");
            for leg in &opp.legs {
                println!(
                    "   Bet on {} at {} with odds {} (stake {})",
                    leg.team,
                    leg.provider,
                    leg.odds,
                    leg.stake.round_dp(2),
                );
            }
            println!(
                "   Margin: {}%  Total stake: {}  Guaranteed profit: {}",
                opp.margin_percent.round_dp(2),
                opp.total_stake,
                opp.guaranteed_profit.round_dp(2),
            );
        }
        MatchOutcome::NoArbitrage { providers } => {
            println!("   No arbitrage across {} provider(s).", providers);
        }
        MatchOutcome::NoData { reason } => {
            println!("   No data: {}", reason);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let endpoint = env::var("WEBDRIVER_URL").unwrap_or_else(|_| "http://localhost:9515".to_string());
    let days_ahead: i64 = env_or("SCAN_DAYS", 1);
    let total_stake: Decimal = env_or("TOTAL_STAKE", dec!(100));
    let workers: usize = env_or("WORKERS", 1);

    println!("Scanning HLTV for matches in the next {} day(s)...", days_ahead);
    let mut discovery = WebDriverRenderer::new_session(&endpoint).await?;
    let matches = match fetch_upcoming_matches(&mut discovery, days_ahead).await {
        Ok(matches) => {
            discovery.close().await?;
            matches
        }
        Err(reason) => {
            discovery.close().await?;
            return Err(reason.into());
        }
    };
    println!("Found {} upcoming match(es).", matches.len());

    if matches.is_empty() {
        println!("Nothing to scan.");
        return Ok(());
    }

    let reports = if workers <= 1 {
        let renderer = WebDriverRenderer::new_session(&endpoint).await?;
        let mut source = RendererOddsSource::new(renderer);
        run_sequential(&mut source, &matches, total_stake).await
    } else {
        let count = workers.min(matches.len());
        println!("Fetching odds with {} browser sessions...", count);
        let mut sources = Vec::with_capacity(count);
        for _ in 0..count {
            sources.push(RendererOddsSource::new(
                WebDriverRenderer::new_session(&endpoint).await?,
            ));
        }
        run_concurrent(sources, matches, total_stake).await
    };

    for report in &reports {
        print_report(report);
    }

    let summary = summarize(&reports);
    println!(
        "=== Scanned {}: {} with arbitrage, {} without, {} unreadable ===",
        summary.scanned, summary.opportunities, summary.no_arbitrage, summary.no_data,
    );

    Ok(())
}
