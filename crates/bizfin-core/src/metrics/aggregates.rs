//! Monthly aggregates in a single reporting currency.
//!
//! Every amount is converted exactly on the way in and each bucket is
//! rounded once when the row is produced. Months without activity between
//! the first and last active month are emitted as zero rows so trailing
//! windows count calendar months, not active months.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accruals::AccruedExpense;
use crate::currency::{round_to_unit, CurrencyConverter};
use crate::payments::{Payment, PaymentKind};
use crate::types::{Amount, Currency, Money};
use crate::BizFinResult;

/// Realized income not tied to a payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub description: String,
    pub amount: Money,
    pub currency: Currency,
    pub date: NaiveDate,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub year: i32,
    pub month: u32,
    pub currency: Currency,
    pub total_income: Money,
    pub total_expense: Money,
    /// Part of `total_income` that comes from recurring charges.
    #[serde(default)]
    pub recurring_income: Money,
    #[serde(default)]
    pub income_by_client: BTreeMap<String, Money>,
    #[serde(default)]
    pub recurring_by_client: BTreeMap<String, Money>,
    #[serde(default)]
    pub expense_by_category: BTreeMap<String, Money>,
}

impl MonthlyAggregate {
    pub fn empty(year: i32, month: u32, currency: Currency) -> Self {
        Self {
            year,
            month,
            currency,
            total_income: Decimal::ZERO,
            total_expense: Decimal::ZERO,
            recurring_income: Decimal::ZERO,
            income_by_client: BTreeMap::new(),
            recurring_by_client: BTreeMap::new(),
            expense_by_category: BTreeMap::new(),
        }
    }

    pub fn period(&self) -> (i32, u32) {
        (self.year, self.month)
    }

    pub fn net(&self) -> Money {
        self.total_income - self.total_expense
    }

    /// Same row expressed in `to`, converted exactly (no rounding).
    pub fn converted(&self, converter: &CurrencyConverter, to: Currency) -> BizFinResult<Self> {
        let from = self.currency;
        let conv = |v: Money| converter.convert(v, from, to);
        let conv_map = |m: &BTreeMap<String, Money>| -> BizFinResult<BTreeMap<String, Money>> {
            m.iter().map(|(k, v)| Ok((k.clone(), conv(*v)?))).collect()
        };
        Ok(Self {
            year: self.year,
            month: self.month,
            currency: to,
            total_income: conv(self.total_income)?,
            total_expense: conv(self.total_expense)?,
            recurring_income: conv(self.recurring_income)?,
            income_by_client: conv_map(&self.income_by_client)?,
            recurring_by_client: conv_map(&self.recurring_by_client)?,
            expense_by_category: conv_map(&self.expense_by_category)?,
        })
    }
}

/// Exact running totals for one month.
#[derive(Debug, Clone)]
struct Bucket {
    income: Amount,
    expense: Amount,
    recurring: Amount,
    by_client: BTreeMap<String, Money>,
    recurring_by_client: BTreeMap<String, Money>,
    by_category: BTreeMap<String, Money>,
}

impl Bucket {
    fn new(currency: Currency) -> Self {
        Self {
            income: Amount::zero(currency),
            expense: Amount::zero(currency),
            recurring: Amount::zero(currency),
            by_client: BTreeMap::new(),
            recurring_by_client: BTreeMap::new(),
            by_category: BTreeMap::new(),
        }
    }

    fn add_income(&mut self, amount: Amount, client: Option<&str>, recurring: bool) -> BizFinResult<()> {
        self.income = self.income.checked_add(amount)?;
        if recurring {
            self.recurring = self.recurring.checked_add(amount)?;
        }
        if let Some(client) = client {
            *self.by_client.entry(client.to_string()).or_default() += amount.value;
            if recurring {
                *self
                    .recurring_by_client
                    .entry(client.to_string())
                    .or_default() += amount.value;
            }
        }
        Ok(())
    }

    fn add_expense(&mut self, amount: Amount, category: &str) -> BizFinResult<()> {
        self.expense = self.expense.checked_add(amount)?;
        *self.by_category.entry(category.to_string()).or_default() += amount.value;
        Ok(())
    }

    fn finish(self, (year, month): (i32, u32), currency: Currency) -> MonthlyAggregate {
        let round_map = |m: BTreeMap<String, Money>| -> BTreeMap<String, Money> {
            m.into_iter()
                .map(|(k, v)| (k, round_to_unit(v, currency)))
                .collect()
        };
        MonthlyAggregate {
            year,
            month,
            currency,
            total_income: round_to_unit(self.income.value, currency),
            total_expense: round_to_unit(self.expense.value, currency),
            recurring_income: round_to_unit(self.recurring.value, currency),
            income_by_client: round_map(self.by_client),
            recurring_by_client: round_map(self.recurring_by_client),
            expense_by_category: round_map(self.by_category),
        }
    }
}

fn month_key(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Months since year zero; consecutive calendar months differ by one.
pub(crate) fn month_index((year, month): (i32, u32)) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

/// Rows inside the trailing `months` calendar months that end at the latest
/// row, and the number of calendar months that window spans. The span is
/// shorter than `months` only when the history itself is; months with no
/// row inside it count as zero.
pub fn trailing_window(history: &[MonthlyAggregate], months: usize) -> (Vec<&MonthlyAggregate>, usize) {
    let indices = history.iter().map(|a| month_index(a.period()));
    let (Some(first), Some(last)) = (indices.clone().min(), indices.max()) else {
        return (Vec::new(), 0);
    };
    let reach = i64::try_from(months.max(1)).unwrap_or(i64::MAX) - 1;
    let start = last.saturating_sub(reach).max(first);
    let rows = history
        .iter()
        .filter(|a| month_index(a.period()) >= start)
        .collect();
    let span = usize::try_from(last - start + 1).unwrap_or(usize::MAX);
    (rows, span)
}

fn next_month((year, month): (i32, u32)) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Builds one row per calendar month from settled payments, other income and
/// non-voided accrued expenses.
///
/// Paid payments count on their paid date; unpaid payments are not income.
pub fn build_monthly_aggregates(
    payments: &[Payment],
    incomes: &[Income],
    expenses: &[AccruedExpense],
    converter: &CurrencyConverter,
    currency: Currency,
) -> BizFinResult<Vec<MonthlyAggregate>> {
    let mut buckets: BTreeMap<(i32, u32), Bucket> = BTreeMap::new();

    for p in payments.iter().filter(|p| p.is_paid()) {
        let date = p.paid_date.unwrap_or(p.scheduled_date);
        let amount = converter.convert_amount(Amount::new(p.amount, p.currency), currency)?;
        buckets
            .entry(month_key(date))
            .or_insert_with(|| Bucket::new(currency))
            .add_income(
                amount,
                Some(p.client_id.as_str()),
                p.kind == PaymentKind::Recurring,
            )?;
    }

    for i in incomes {
        let amount = converter.convert_amount(Amount::new(i.amount, i.currency), currency)?;
        buckets
            .entry(month_key(i.date))
            .or_insert_with(|| Bucket::new(currency))
            .add_income(amount, i.client_id.as_deref(), i.is_recurring)?;
    }

    for e in expenses.iter().filter(|e| e.counts_as_expense()) {
        let amount = converter.convert_amount(Amount::new(e.amount, e.currency), currency)?;
        buckets
            .entry(month_key(e.due_date))
            .or_insert_with(|| Bucket::new(currency))
            .add_expense(amount, &e.category)?;
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Ok(Vec::new()),
    };

    let mut rows = Vec::new();
    let mut key = first;
    loop {
        let row = match buckets.remove(&key) {
            Some(bucket) => bucket.finish(key, currency),
            None => MonthlyAggregate::empty(key.0, key.1, currency),
        };
        rows.push(row);
        if key == last {
            break;
        }
        key = next_month(key);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accruals::AccrualStatus;
    use crate::payments::PaymentStatus;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn converter() -> CurrencyConverter {
        CurrencyConverter::new(dec!(4000)).unwrap()
    }

    fn paid_payment(client: &str, amount: Money, currency: Currency, paid: NaiveDate, kind: PaymentKind) -> Payment {
        Payment {
            project_id: "p".into(),
            client_id: client.into(),
            kind,
            amount,
            currency,
            scheduled_date: paid,
            status: PaymentStatus::Paid,
            paid_date: Some(paid),
            installment_number: None,
            period_index: Some(0),
            invoice_number: None,
        }
    }

    fn expense(category: &str, amount: Money, currency: Currency, due: NaiveDate) -> AccruedExpense {
        AccruedExpense::variable("e", "expense", amount, currency, category, "card", due)
    }

    #[test]
    fn test_mixed_currencies_normalized() {
        let payments = vec![
            paid_payment("acme", dec!(1_000_000), Currency::COP, d(2024, 1, 10), PaymentKind::Recurring),
            paid_payment("globex", dec!(100), Currency::USD, d(2024, 1, 20), PaymentKind::Implementation),
        ];
        let expenses = vec![expense("rent", dec!(50), Currency::USD, d(2024, 1, 5))];
        let rows = build_monthly_aggregates(&payments, &[], &expenses, &converter(), Currency::COP).unwrap();
        assert_eq!(rows.len(), 1);
        let jan = &rows[0];
        assert_eq!(jan.total_income, dec!(1_400_000));
        assert_eq!(jan.recurring_income, dec!(1_000_000));
        assert_eq!(jan.total_expense, dec!(200_000));
        assert_eq!(jan.income_by_client["globex"], dec!(400_000));
        assert_eq!(jan.recurring_by_client.get("globex"), None);
        assert_eq!(jan.expense_by_category["rent"], dec!(200_000));
    }

    #[test]
    fn test_rounds_once_per_bucket() {
        // 3 x 16 COP = 48 COP = 0.012 USD -> 0.01, not 3 x 0.00
        let expenses = vec![
            expense("fees", dec!(16), Currency::COP, d(2024, 2, 1)),
            expense("fees", dec!(16), Currency::COP, d(2024, 2, 2)),
            expense("fees", dec!(16), Currency::COP, d(2024, 2, 3)),
        ];
        let rows = build_monthly_aggregates(&[], &[], &expenses, &converter(), Currency::USD).unwrap();
        assert_eq!(rows[0].total_expense, dec!(0.01));
    }

    #[test]
    fn test_gap_months_filled_with_zero_rows() {
        let incomes = vec![
            Income {
                id: "i1".into(),
                client_id: None,
                project_id: None,
                description: "consulting".into(),
                amount: dec!(10),
                currency: Currency::COP,
                date: d(2023, 11, 3),
                is_recurring: false,
            },
            Income {
                id: "i2".into(),
                client_id: Some("acme".into()),
                project_id: None,
                description: "support".into(),
                amount: dec!(20),
                currency: Currency::COP,
                date: d(2024, 2, 3),
                is_recurring: true,
            },
        ];
        let rows = build_monthly_aggregates(&[], &incomes, &[], &converter(), Currency::COP).unwrap();
        let periods: Vec<_> = rows.iter().map(|r| r.period()).collect();
        assert_eq!(periods, vec![(2023, 11), (2023, 12), (2024, 1), (2024, 2)]);
        assert_eq!(rows[1].total_income, Decimal::ZERO);
        assert!(rows[0].income_by_client.is_empty());
        assert_eq!(rows[3].recurring_by_client["acme"], dec!(20));
    }

    #[test]
    fn test_unpaid_payments_and_voided_expenses_excluded() {
        let mut unpaid = paid_payment("acme", dec!(500), Currency::COP, d(2024, 1, 1), PaymentKind::Recurring);
        unpaid.status = PaymentStatus::Pending;
        unpaid.paid_date = None;
        let mut voided = expense("rent", dec!(100), Currency::COP, d(2024, 1, 1));
        voided.status = AccrualStatus::Voided;
        let rows = build_monthly_aggregates(&[unpaid], &[], &[voided], &converter(), Currency::COP).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_trailing_window_counts_calendar_months() {
        let mut jan = MonthlyAggregate::empty(2024, 1, Currency::COP);
        jan.total_expense = dec!(600);
        let dec_row = MonthlyAggregate::empty(2024, 12, Currency::COP);
        let history = vec![jan, dec_row];

        let (rows, span) = trailing_window(&history, 6);
        assert_eq!(span, 6);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].period(), (2024, 12));

        // the whole history is shorter than the window
        let (rows, span) = trailing_window(&history[..1], 6);
        assert_eq!((rows.len(), span), (1, 1));
        assert_eq!(trailing_window(&[], 6).1, 0);
    }

    #[test]
    fn test_trailing_window_crosses_year_end() {
        let history = vec![
            MonthlyAggregate::empty(2023, 11, Currency::COP),
            MonthlyAggregate::empty(2024, 1, Currency::COP),
        ];
        let (rows, span) = trailing_window(&history, 3);
        assert_eq!(span, 3);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_converted_is_exact() {
        let mut row = MonthlyAggregate::empty(2024, 1, Currency::COP);
        row.total_income = dec!(10);
        let usd = row.converted(&converter(), Currency::USD).unwrap();
        assert_eq!(usd.total_income, dec!(0.0025));
        assert_eq!(usd.currency, Currency::USD);
    }
}
