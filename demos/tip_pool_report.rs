use std::error::Error;
use std::fs;
use std::result::Result;
use tip_pool_allocator::*;

/// Usage:
///   tip_pool_report                         run the bundled two-day sample
///   tip_pool_report long.csv                record-oriented file
///   tip_pool_report wide.csv weights.csv    cross-tab plus weights, pools from TIP_POOLS
///
/// TIP_POOLS holds `date=amount` pairs separated by semicolons, e.g. `05/08=1000;06/08=1200,50`.
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut session = TipPoolSession::default();

    println!("💶 Tip pool report\n");

    match args.as_slice() {
        [] => {
            println!("No files given, using the bundled sample.");
            session.ingest_record_oriented(sample::record_oriented_csv());
        }
        [long] => {
            let text = fs::read_to_string(long)?;
            session.ingest_record_oriented(&text);
        }
        [wide, weights, ..] => {
            session.ingest_wide_format(&fs::read_to_string(wide)?);
            session.ingest_weights(&fs::read_to_string(weights)?);
            let raw = std::env::var("TIP_POOLS").unwrap_or_default();
            for (date, amount) in parse_pools(&raw)? {
                session.set_pool_amount(&date, amount);
            }
        }
    }

    if !session.warnings().is_empty() {
        println!("⚠️  Warnings:");
        for warning in session.warnings() {
            println!("  - {}", warning);
        }
        println!();
    }

    match session.report() {
        Some(report) => {
            println!("{}", report.render_text());
            println!("📊 Chart");
            for (name, total) in report.chart_series() {
                let bar = "#".repeat((total / 25.0).round() as usize);
                println!("  {:<12} {:>10} {}", name, format_amount(total), bar);
            }
        }
        None => println!("❌ Nothing computed."),
    }

    Ok(())
}

fn parse_pools(raw: &str) -> Result<Vec<(String, f64)>, Box<dyn Error>> {
    raw.split(';')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| -> Result<(String, f64), Box<dyn Error>> {
            let (date, amount) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected date=amount, got '{}'", pair))?;
            Ok((date.trim().to_string(), parse_amount(amount)))
        })
        .collect()
}
