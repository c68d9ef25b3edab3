//! tfn-schemas
//!
//! Shared domain vocabulary for the tiffin attendance/billing core.
//!
//! Everything here is plain data plus the two injection seams every service
//! needs (`Clock`, `NotificationSink`). No IO.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod attendance;
pub mod billing;
pub mod clock;
pub mod error;
pub mod identity;
pub mod notification;
pub mod subscription;

pub use attendance::*;
pub use billing::*;
pub use clock::{Clock, SystemClock};
pub use error::{FieldError, Result, TiffinError, Validator};
pub use identity::{CredentialVerifier, Identity, Role};
pub use notification::*;
pub use subscription::*;

// ---------------------------------------------------------------------------
// SubscriberId
// ---------------------------------------------------------------------------

/// A subscriber is identified by their 10-digit phone number.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn parse(raw: &str) -> Result<Self> {
        let t = raw.trim();
        if is_ten_digit_phone(t) {
            Ok(Self(t.to_string()))
        } else {
            Err(TiffinError::validation(
                "subscriber_id",
                "Please enter a valid 10-digit phone number",
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_ten_digit_phone(s: &str) -> bool {
    s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<String> for SubscriberId {
    type Error = TiffinError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SubscriberId> for String {
    fn from(value: SubscriberId) -> Self {
        value.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MealType
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [MealType::Breakfast, MealType::Lunch, MealType::Dinner];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "breakfast" => Ok(MealType::Breakfast),
            "lunch" => Ok(MealType::Lunch),
            "dinner" => Ok(MealType::Dinner),
            _ => Err(TiffinError::validation(
                "meal_type",
                "Meal type must be breakfast, lunch, or dinner",
            )),
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Paise (money)
// ---------------------------------------------------------------------------

/// Money in integer minor units (1 rupee = 100 paise). No floats anywhere.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Paise(pub i64);

impl Paise {
    pub const ZERO: Paise = Paise(0);

    /// Ceiling for any single caller-supplied price (₹1,00,00,000).
    pub const MAX_PRICE: Paise = Paise(1_000_000_000);

    pub fn checked_add(self, rhs: Paise) -> Option<Paise> {
        self.0.checked_add(rhs.0).map(Paise)
    }

    /// Exact sum, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Paise>>(iter: I) -> Option<Paise> {
        iter.into_iter()
            .try_fold(Paise::ZERO, |acc, p| acc.checked_add(p))
    }

    pub fn from_rupees(rupees: i64) -> Self {
        Paise(rupees.saturating_mul(100))
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Integer mean, truncated toward zero. `count == 0` => zero.
    pub fn average(total: Paise, count: u64) -> Paise {
        if count == 0 {
            return Paise::ZERO;
        }
        Paise(total.0 / count as i64)
    }
}

/// Saturating. Used by reporting aggregates; bill totals go through
/// [`Paise::checked_sum`].
impl std::ops::Add for Paise {
    type Output = Paise;

    fn add(self, rhs: Paise) -> Paise {
        Paise(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Paise {
    fn add_assign(&mut self, rhs: Paise) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Paise {
    fn sum<I: Iterator<Item = Paise>>(iter: I) -> Paise {
        iter.fold(Paise::ZERO, |acc, p| acc + p)
    }
}

impl<'a> std::iter::Sum<&'a Paise> for Paise {
    fn sum<I: Iterator<Item = &'a Paise>>(iter: I) -> Paise {
        iter.copied().sum()
    }
}

impl fmt::Display for Paise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let (rupees, paise) = (abs / 100, abs % 100);
        if paise == 0 {
            write!(f, "{sign}₹{rupees}")
        } else {
            write!(f, "{sign}₹{rupees}.{paise:02}")
        }
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// Inclusive calendar-date range; either bound may be open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.from.map_or(true, |f| d >= f) && self.to.map_or(true, |t| d <= t)
    }

    /// Both bounds present and inverted.
    pub fn is_inverted(&self) -> bool {
        matches!((self.from, self.to), (Some(f), Some(t)) if f > t)
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Missing values fall back to page 1 / size 10.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Result<Self> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let mut v = Validator::new();
        v.check(page >= 1, "page", "Page must be a positive integer");
        v.check(
            (1..=MAX_PAGE_SIZE).contains(&page_size),
            "page_size",
            "Page size must be between 1 and 100",
        );
        v.finish("Validation failed")?;
        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub pages: u64,
    pub total: u64,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, req: PageRequest, total: u64) -> Self {
        let size = u64::from(req.page_size.max(1));
        Self {
            items,
            page: req.page,
            pages: total.div_ceil(size),
            total,
            page_size: req.page_size,
        }
    }

    /// Slice an already-sorted, fully materialised result set.
    pub fn from_sorted(all: Vec<T>, req: PageRequest) -> Self {
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(req.offset() as usize)
            .take(req.limit() as usize)
            .collect();
        Self::new(items, req, total)
    }
}

/// Bound a caller-supplied price to `0..=Paise::MAX_PRICE`.
pub fn check_price(v: &mut Validator, field: &str, raw: i64) -> Paise {
    v.check(raw >= 0, field, "Price must be a non-negative amount");
    v.check(
        raw <= Paise::MAX_PRICE.0,
        field,
        "Price exceeds the maximum allowed amount",
    );
    Paise(raw)
}

/// Trim and bound a display name. Shared by attendance and subscription input.
pub fn check_name(v: &mut Validator, field: &str, raw: &str) -> String {
    let name = raw.trim().to_string();
    let len = name.chars().count();
    v.check(
        (2..=100).contains(&len),
        field,
        "Name must be between 2 and 100 characters",
    );
    name
}
