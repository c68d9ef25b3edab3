use anyhow::{Context, Result};
use tfn_billing::GenerateBill;
use tfn_schemas::Bill;
use uuid::Uuid;

use super::{operator, parse_date, reader, Wiring};

pub async fn run_generate(
    subscriber: String,
    from: String,
    to: String,
    name: Option<String>,
    by: String,
) -> Result<()> {
    // Parse everything before touching the database.
    let actor = operator(&by)?;
    let req = GenerateBill {
        subscriber_id: subscriber,
        start_date: parse_date("--from", &from)?,
        end_date: parse_date("--to", &to)?,
        subscriber_name: name,
    };

    let w = Wiring::connect().await?;
    let bill = w.billing().generate(&actor, req).await?;
    print_bill(&bill);
    Ok(())
}

pub async fn run_show(id: String, reconcile: bool) -> Result<()> {
    let id = Uuid::parse_str(&id).context("invalid bill id uuid")?;
    let actor = reader()?;

    let w = Wiring::connect().await?;
    let billing = w.billing();

    if !reconcile {
        print_bill(&billing.get(&actor, id).await?);
        return Ok(());
    }

    let view = billing.reconciled(&actor, id).await?;
    print_bill(&view.bill);
    let r = &view.reconciliation;
    println!("active_total={}", r.active_total);
    println!("active_meals={}", r.active_meals);
    println!("removed={}", r.removed.len());
    for e in &r.removed {
        println!("removed_entry={} {} {}", e.date, e.meal_type, e.price);
    }
    for p in &r.repriced {
        println!(
            "repriced_entry={} {} {} -> {}",
            p.entry.date, p.entry.meal_type, p.entry.price, p.live_price
        );
    }
    Ok(())
}

fn print_bill(b: &Bill) {
    println!("bill_id={}", b.id);
    println!("bill_number={}", b.bill_number);
    println!("subscriber_id={}", b.subscriber_id);
    println!("subscriber_name={}", b.subscriber_name);
    println!("period={}..{}", b.start_date, b.end_date);
    println!("total_meals={}", b.total_meals);
    println!("total={}", b.total);
    println!("status={}", b.status);
    println!("generated_by={}", b.generated_by);
}
