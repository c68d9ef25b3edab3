use serde::{Deserialize, Serialize};
use tfn_schemas::{Paise, Plan, Subscription, SubscriptionStatus};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBreakdown {
    pub plan: Plan,
    pub count: u64,
    pub revenue: Paise,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub status: SubscriptionStatus,
    pub count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStats {
    pub total: u64,
    pub revenue: Paise,
    pub average_price: Paise,
    pub meals_included: u64,
    pub by_plan: Vec<PlanBreakdown>,
    pub by_status: Vec<StatusBreakdown>,
}

pub fn compute(rows: &[Subscription]) -> SubscriptionStats {
    let total = rows.len() as u64;
    let revenue: Paise = rows.iter().map(|s| s.price).sum();
    let meals_included = rows.iter().map(|s| u64::from(s.meals_included)).sum();

    let by_plan = [Plan::Weekly, Plan::Monthly]
        .into_iter()
        .map(|plan| {
            let matching = rows.iter().filter(|s| s.plan == plan);
            PlanBreakdown {
                plan,
                count: matching.clone().count() as u64,
                revenue: matching.map(|s| s.price).sum(),
            }
        })
        .collect();

    let by_status = [
        SubscriptionStatus::Active,
        SubscriptionStatus::Paused,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Cancelled,
    ]
    .into_iter()
    .map(|status| StatusBreakdown {
        status,
        count: rows.iter().filter(|s| s.status == status).count() as u64,
    })
    .collect();

    SubscriptionStats {
        total,
        revenue,
        average_price: Paise::average(revenue, total),
        meals_included,
        by_plan,
        by_status,
    }
}
