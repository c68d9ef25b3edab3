use tfn_schemas::{
    check_name, check_price, NewSubscription, Result, SubscriberId, Subscription,
    SubscriptionInput, SubscriptionPatch, SubscriptionStatus, SubscriptionTerms, TiffinError,
    Validator,
};

use SubscriptionStatus::*;

/// Upper bound on `meals_included`; a year of three meals a day fits.
pub const MAX_MEALS_INCLUDED: u32 = 1_100;

/// Statuses whose terms may still be edited.
pub const EDITABLE: &[SubscriptionStatus] = &[Active, Paused];

/// Statuses from which `to` may be entered. Self-loops are not listed; the
/// caller treats them as no-ops.
pub fn allowed_sources(to: SubscriptionStatus) -> &'static [SubscriptionStatus] {
    match to {
        Active => &[Paused],
        Paused => &[Active],
        Expired => &[Active, Paused],
        Cancelled => &[Active, Paused],
    }
}

pub fn check_transition(from: SubscriptionStatus, to: SubscriptionStatus) -> Result<()> {
    if from.is_terminal() {
        return Err(TiffinError::conflict(format!(
            "subscription is {from}; {from} is terminal"
        )));
    }
    if !allowed_sources(to).contains(&from) {
        return Err(TiffinError::conflict(format!(
            "cannot move subscription from {from} to {to}"
        )));
    }
    Ok(())
}

pub fn validate_input(input: &SubscriptionInput, created_by: &str) -> Result<NewSubscription> {
    let mut v = Validator::new();

    let subscriber_id = match SubscriberId::parse(&input.subscriber_id) {
        Ok(id) => Some(id),
        Err(e) => {
            if let Some(other) = v.absorb("", e) {
                return Err(other);
            }
            None
        }
    };
    let subscriber_name = check_name(&mut v, "subscriber_name", &input.subscriber_name);
    v.check(
        input.end_date > input.start_date,
        "end_date",
        "End date must be after start date",
    );
    let price = check_price(&mut v, "price_paise", input.price_paise);
    if let Some(m) = input.meals_included {
        check_meals(&mut v, m);
    }
    v.finish("Validation failed")?;

    let subscriber_id = subscriber_id.ok_or_else(|| {
        TiffinError::validation("subscriber_id", "Please enter a valid 10-digit phone number")
    })?;

    Ok(NewSubscription {
        subscriber_id,
        subscriber_name,
        plan: input.plan,
        start_date: input.start_date,
        end_date: input.end_date,
        price,
        meals_included: input
            .meals_included
            .unwrap_or_else(|| input.plan.default_meals_included()),
        created_by: created_by.to_string(),
    })
}

/// Merge an edit over the current terms and validate the result as a whole.
pub fn apply_patch(current: &Subscription, patch: &SubscriptionPatch) -> Result<SubscriptionTerms> {
    if patch.is_empty() {
        return Err(TiffinError::validation(
            "body",
            "At least one field must be supplied",
        ));
    }

    let mut v = Validator::new();
    let subscriber_name = match &patch.subscriber_name {
        Some(raw) => check_name(&mut v, "subscriber_name", raw),
        None => current.subscriber_name.clone(),
    };
    let start_date = patch.start_date.unwrap_or(current.start_date);
    let end_date = patch.end_date.unwrap_or(current.end_date);
    v.check(
        end_date > start_date,
        "end_date",
        "End date must be after start date",
    );
    let price = match patch.price_paise {
        Some(raw) => check_price(&mut v, "price_paise", raw),
        None => current.price,
    };
    if let Some(m) = patch.meals_included {
        check_meals(&mut v, m);
    }
    v.finish("Validation failed")?;

    Ok(SubscriptionTerms {
        subscriber_name,
        plan: patch.plan.unwrap_or(current.plan),
        start_date,
        end_date,
        price,
        meals_included: patch.meals_included.unwrap_or(current.meals_included),
    })
}

fn check_meals(v: &mut Validator, m: u32) {
    v.check(
        (1..=MAX_MEALS_INCLUDED).contains(&m),
        "meals_included",
        "Meals included must be between 1 and 1100",
    );
}
