//! Pure input checks. No IO, no clock reads: `today` is passed in.

use std::collections::HashMap;

use chrono::NaiveDate;
use tfn_schemas::{
    check_name, check_price, AttendanceInput, AttendanceKey, NewAttendance, Result, SubscriberId,
    TiffinError, Validator,
};

/// Validate one entry into a store-ready row.
pub fn validate_input(
    input: &AttendanceInput,
    today: NaiveDate,
    recorded_by: &str,
) -> Result<NewAttendance> {
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
    let price = check_price(&mut v, "price_paise", input.price_paise);
    v.check(
        input.date <= today,
        "date",
        "Attendance date cannot be in the future",
    );
    v.finish("Validation failed")?;

    let subscriber_id = subscriber_id.ok_or_else(|| {
        TiffinError::validation("subscriber_id", "Please enter a valid 10-digit phone number")
    })?;

    Ok(NewAttendance {
        subscriber_id,
        subscriber_name,
        meal_type: input.meal_type,
        date: input.date,
        price,
        recorded_by: recorded_by.to_string(),
    })
}

/// Validate every entry, reporting all failures under `records[i].<field>`.
pub fn validate_batch(
    inputs: &[AttendanceInput],
    today: NaiveDate,
    recorded_by: &str,
) -> Result<Vec<NewAttendance>> {
    if inputs.is_empty() {
        return Err(TiffinError::validation(
            "records",
            "At least one attendance record is required",
        ));
    }

    let mut v = Validator::new();
    let mut rows = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        match validate_input(input, today, recorded_by) {
            Ok(row) => rows.push(row),
            Err(e) => {
                if let Some(other) = v.absorb(&format!("records[{i}]"), e) {
                    return Err(other);
                }
            }
        }
    }
    v.finish("Validation failed")?;
    Ok(rows)
}

/// Labels of entries whose key repeats an earlier entry in the same batch.
pub fn in_batch_duplicates(rows: &[NewAttendance]) -> Vec<String> {
    let mut first_seen: HashMap<AttendanceKey, usize> = HashMap::new();
    let mut dups = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let first = *first_seen.entry(row.key()).or_insert(i);
        if first != i {
            dups.push(format!("{} (repeats entry {})", row.label(), first + 1));
        }
    }
    dups
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfn_schemas::{MealType, Paise};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn input(phone: &str, price: i64, date: &str) -> AttendanceInput {
        AttendanceInput {
            subscriber_id: phone.to_string(),
            subscriber_name: "Asha".to_string(),
            meal_type: MealType::Lunch,
            date: d(date),
            price_paise: price,
        }
    }

    #[test]
    fn rejects_every_bad_field_at_once() {
        let err = validate_input(&input("12ab", -1, "2024-02-01"), d("2024-01-31"), "op")
            .unwrap_err();
        let TiffinError::Validation { errors, .. } = err else {
            panic!("expected validation");
        };
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["subscriber_id", "price_paise", "date"]);
    }

    #[test]
    fn today_is_not_the_future() {
        let row = validate_input(&input("9998887777", 0, "2024-01-31"), d("2024-01-31"), "op")
            .unwrap();
        assert_eq!(row.price, Paise::ZERO);
        assert_eq!(row.recorded_by, "op");
    }

    #[test]
    fn price_above_ceiling_is_rejected() {
        let err = validate_input(
            &input("9998887777", Paise::MAX_PRICE.as_i64() + 1, "2024-01-31"),
            d("2024-01-31"),
            "op",
        )
        .unwrap_err();
        let TiffinError::Validation { errors, .. } = err else {
            panic!("expected validation");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "price_paise");
    }

    #[test]
    fn batch_errors_carry_entry_index() {
        let err = validate_batch(
            &[
                input("9998887777", 5000, "2024-01-01"),
                input("9998887777", -5, "2024-01-02"),
            ],
            d("2024-01-31"),
            "op",
        )
        .unwrap_err();
        let TiffinError::Validation { errors, .. } = err else {
            panic!("expected validation");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "records[1].price_paise");
    }

    #[test]
    fn in_batch_duplicates_flag_each_repeat() {
        let rows = validate_batch(
            &[
                input("9998887777", 5000, "2024-01-01"),
                input("9998887777", 5000, "2024-01-01"),
                input("9998887777", 5000, "2024-01-02"),
                input("9998887777", 5000, "2024-01-01"),
            ],
            d("2024-01-31"),
            "op",
        )
        .unwrap();
        let dups = in_batch_duplicates(&rows);
        assert_eq!(dups.len(), 2);
        assert!(dups[0].starts_with("Asha - lunch - 2024-01-01"));
        assert!(dups.iter().all(|l| l.ends_with("(repeats entry 1)")));
    }
}
