use anyhow::Result;

use super::{parse_date, Wiring};

/// Expire every lapsed subscription as of `today` (default: the business date).
pub async fn run_sweep(today: Option<String>) -> Result<()> {
    let today = today
        .map(|raw| parse_date("--today", &raw))
        .transpose()?;

    let w = Wiring::connect().await?;
    let lifecycle = w.subscriptions();
    let report = match today {
        Some(day) => lifecycle.sweep_expired(day).await?,
        None => lifecycle.sweep_now().await?,
    };

    println!("examined={}", report.examined);
    println!("expired={}", report.expired.len());
    println!("already_handled={}", report.already_handled);
    println!("failed={}", report.failed.len());
    for id in &report.expired {
        println!("expired_id={id}");
    }
    for f in &report.failed {
        println!("failed_id={} error={}", f.id, f.error);
    }
    Ok(())
}
