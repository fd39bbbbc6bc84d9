//! Occurrence dates for the seven billing frequencies.
//!
//! Month-based frequencies are always computed from the anchor
//! (`anchor + n * step` months) rather than by stepping from the previous
//! occurrence, so a month-end anchor is not dragged down by a short month.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BizFinError;
use crate::types::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

/// One step of a frequency: a fixed number of days or of calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Days(u64),
    Months(u32),
}

impl Frequency {
    pub const ALL: [Frequency; 7] = [
        Frequency::Weekly,
        Frequency::Biweekly,
        Frequency::Monthly,
        Frequency::Bimonthly,
        Frequency::Quarterly,
        Frequency::Semiannual,
        Frequency::Annual,
    ];

    fn step(self) -> Step {
        match self {
            Frequency::Weekly => Step::Days(7),
            Frequency::Biweekly => Step::Days(14),
            Frequency::Monthly => Step::Months(1),
            Frequency::Bimonthly => Step::Months(2),
            Frequency::Quarterly => Step::Months(3),
            Frequency::Semiannual => Step::Months(6),
            Frequency::Annual => Step::Months(12),
        }
    }

    pub fn is_month_based(self) -> bool {
        matches!(self.step(), Step::Months(_))
    }

    pub fn periods_per_year(self) -> u32 {
        match self {
            Frequency::Weekly => 52,
            Frequency::Biweekly => 26,
            Frequency::Monthly => 12,
            Frequency::Bimonthly => 6,
            Frequency::Quarterly => 4,
            Frequency::Semiannual => 2,
            Frequency::Annual => 1,
        }
    }

    /// Normalizes a per-period amount to a per-month figure (unrounded).
    pub fn monthly_equivalent(self, amount: Money) -> Money {
        amount * Decimal::from(self.periods_per_year()) / Decimal::from(12u32)
    }

    pub fn label(self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
            Frequency::Monthly => "monthly",
            Frequency::Bimonthly => "bimonthly",
            Frequency::Quarterly => "quarterly",
            Frequency::Semiannual => "semiannual",
            Frequency::Annual => "annual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = BizFinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .collect();
        match normalized.as_str() {
            "weekly" | "semanal" => Ok(Frequency::Weekly),
            "biweekly" | "fortnightly" | "quincenal" => Ok(Frequency::Biweekly),
            "monthly" | "mensual" => Ok(Frequency::Monthly),
            "bimonthly" | "bimestral" => Ok(Frequency::Bimonthly),
            "quarterly" | "trimestral" => Ok(Frequency::Quarterly),
            "semiannual" | "semiannually" | "biannual" | "semestral" => {
                Ok(Frequency::Semiannual)
            }
            "annual" | "annually" | "yearly" | "anual" => Ok(Frequency::Annual),
            _ => Err(BizFinError::UnknownFrequency(s.to_string())),
        }
    }
}

/// Last valid day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(31)
}

/// Moves `date` to `day` of its month, clipped to the month's last day.
fn clamp_day(date: NaiveDate, day: u32) -> NaiveDate {
    let last = last_day_of_month(date.year(), date.month());
    let target = day.clamp(1, last);
    date.with_day(target).unwrap_or(date)
}

/// Date of the `n`th occurrence (0-based) of `frequency` starting at `anchor`.
///
/// `day_of_charge` pins month-based occurrences to that day of the month,
/// clipped to the month's length. Day-based frequencies ignore it. Results
/// past the representable calendar saturate at `NaiveDate::MAX`.
pub fn nth_occurrence(
    anchor: NaiveDate,
    frequency: Frequency,
    day_of_charge: Option<u32>,
    n: u32,
) -> NaiveDate {
    match frequency.step() {
        Step::Days(days) => anchor
            .checked_add_days(Days::new(days * u64::from(n)))
            .unwrap_or(NaiveDate::MAX),
        Step::Months(months) => {
            let shifted = months
                .checked_mul(n)
                .and_then(|total| anchor.checked_add_months(Months::new(total)));
            match shifted {
                Some(date) => match day_of_charge {
                    Some(day) => clamp_day(date, day),
                    None => date,
                },
                None => NaiveDate::MAX,
            }
        }
    }
}

/// Iterator over `(period_index, date)` pairs up to and including `limit`.
#[derive(Debug, Clone)]
pub struct Occurrences {
    anchor: NaiveDate,
    frequency: Frequency,
    day_of_charge: Option<u32>,
    limit: NaiveDate,
    next_index: Option<u32>,
}

impl Iterator for Occurrences {
    type Item = (u32, NaiveDate);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next_index?;
        let date = nth_occurrence(self.anchor, self.frequency, self.day_of_charge, index);
        // dates are non-decreasing in the index, so the first miss ends it
        if date > self.limit || date == NaiveDate::MAX {
            self.next_index = None;
            return None;
        }
        self.next_index = index.checked_add(1);
        Some((index, date))
    }
}

pub fn occurrences_until(
    anchor: NaiveDate,
    frequency: Frequency,
    day_of_charge: Option<u32>,
    limit: NaiveDate,
) -> Occurrences {
    Occurrences {
        anchor,
        frequency,
        day_of_charge,
        limit,
        next_index: Some(0),
    }
}
