//! Typed provider records. Each struct is the validated form of one raw record; a raw record
//! that does not deserialize into its struct is dropped at the fetch boundary.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A key that must be present in the payload but may carry `null`.
///
/// Plain `Option<f64>` fields treat a missing key as `None`; routing them through
/// `deserialize_with` makes serde report the key as missing instead.
fn present<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer)
}

/// Provider timestamps arrive as RFC 3339, as a naive `YYYY-MM-DD[T ]HH:MM:SS` (read as UTC),
/// or as a bare date (midnight UTC).
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(raw.trim())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw:?}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMetrics {
    pub ticker: String,
    pub report_period: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    pub period: String,
    pub currency: String,

    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub enterprise_value: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub price_to_earnings_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub price_to_book_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub price_to_sales_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub enterprise_value_to_ebitda_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub enterprise_value_to_revenue_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub gross_margin: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub operating_margin: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub net_margin: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub return_on_equity: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub return_on_assets: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub current_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub quick_ratio: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub earnings_per_share: Option<f64>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub debt_to_equity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_cash_flow_yield: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peg_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_on_invested_capital: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory_turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivables_turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_sales_outstanding: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_cycle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_capital_turnover: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_cash_flow_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_to_assets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_coverage: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_value_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings_per_share_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_cash_flow_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_income_growth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebitda_growth: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_value_per_share: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_cash_flow_per_share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub ticker: String,
    pub report_period: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    pub period: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gross_profit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_expense: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selling_general_and_administrative_expenses: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_and_development: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_expense: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_tax_expense: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income_common_stock: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings_per_share: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub earnings_per_share_diluted: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividends_per_common_share: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_average_shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_average_shares_diluted: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub ticker: String,
    pub report_period: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    pub period: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_assets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_assets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_and_equivalents: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_and_non_trade_receivables: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_plant_and_equipment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goodwill_and_intangible_assets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outstanding_shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_liabilities: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_liabilities: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_debt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_current_debt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deferred_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shareholders_equity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retained_earnings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_debt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub ticker: String,
    pub report_period: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiscal_period: Option<String>,
    pub period: String,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depreciation_and_amortization: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_based_compensation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_cash_flow_from_operations: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital_expenditure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_cash_flow_from_investing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_or_purchase_of_equity_shares: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividends_and_other_cash_distributions: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_cash_flow_from_financing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_in_cash_and_equivalents: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_cash_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_cash_flow: Option<f64>,
}

/// One row from any of the three statement arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "statement", rename_all = "snake_case")]
pub enum StatementRow {
    Income(IncomeStatement),
    Balance(BalanceSheet),
    CashFlow(CashFlowStatement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub ticker: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub source: String,
    #[serde(deserialize_with = "timestamp")]
    pub date: DateTime<Utc>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
    #[serde(default, skip_serializing)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
    #[serde(deserialize_with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing)]
    pub time_milliseconds: Option<i64>,
}

/// A raw record that passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidatedRecord {
    Metrics(FinancialMetrics),
    Statement(StatementRow),
    News(NewsItem),
    Price(PriceBar),
}

impl ValidatedRecord {
    /// Single-line JSON form used inside prompts. Unset optional fields are omitted.
    pub fn to_prompt_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metrics_json() -> serde_json::Value {
        json!({
            "ticker": "AAPL",
            "report_period": "2024-09-28",
            "fiscal_period": "2024-Q4",
            "period": "quarterly",
            "currency": "USD",
            "market_cap": 3.4e12,
            "enterprise_value": 3.5e12,
            "price_to_earnings_ratio": 37.2,
            "price_to_book_ratio": 60.1,
            "price_to_sales_ratio": 8.9,
            "enterprise_value_to_ebitda_ratio": 26.0,
            "enterprise_value_to_revenue_ratio": 9.1,
            "gross_margin": 0.46,
            "operating_margin": 0.31,
            "net_margin": 0.24,
            "return_on_equity": 1.6,
            "return_on_assets": 0.27,
            "current_ratio": 0.87,
            "quick_ratio": 0.83,
            "earnings_per_share": 6.1,
            "debt_to_equity": null,
            "peg_ratio": 2.4,
        })
    }

    #[test]
    fn metrics_accept_null_core_values() {
        let m: FinancialMetrics = serde_json::from_value(metrics_json()).unwrap();
        assert_eq!(m.debt_to_equity, None);
        assert_eq!(m.peg_ratio, Some(2.4));
        assert_eq!(m.revenue_growth, None);
    }

    #[test]
    fn metrics_reject_missing_core_key() {
        let mut v = metrics_json();
        v.as_object_mut().unwrap().remove("debt_to_equity");
        assert!(serde_json::from_value::<FinancialMetrics>(v).is_err());
    }

    #[test]
    fn metrics_reject_string_numbers() {
        let mut v = metrics_json();
        v["market_cap"] = json!("3.4e12");
        assert!(serde_json::from_value::<FinancialMetrics>(v).is_err());
    }

    #[test]
    fn prompt_line_omits_unset_fields_and_tags_statements() {
        let row = StatementRow::Income(IncomeStatement {
            ticker: "AAPL".into(),
            report_period: NaiveDate::from_ymd_opt(2024, 9, 28).unwrap(),
            fiscal_period: None,
            period: "quarterly".into(),
            currency: "USD".into(),
            revenue: Some(94.9e9),
            cost_of_revenue: None,
            gross_profit: None,
            operating_expense: None,
            selling_general_and_administrative_expenses: None,
            research_and_development: None,
            operating_income: None,
            interest_expense: None,
            ebit: None,
            income_tax_expense: None,
            net_income: None,
            net_income_common_stock: None,
            earnings_per_share: None,
            earnings_per_share_diluted: None,
            dividends_per_common_share: None,
            weighted_average_shares: None,
            weighted_average_shares_diluted: None,
        });
        let line = ValidatedRecord::Statement(row).to_prompt_line();
        assert!(line.starts_with("{\"statement\":\"income\""));
        assert!(line.contains("\"revenue\":"));
        assert!(!line.contains("null"));
    }

    #[test]
    fn prompt_line_omits_null_core_metrics() {
        let mut v = metrics_json();
        v["market_cap"] = json!(null);
        let m: FinancialMetrics = serde_json::from_value(v).unwrap();
        let line = ValidatedRecord::Metrics(m).to_prompt_line();
        assert!(line.contains("\"report_period\":\"2024-09-28\""));
        assert!(line.contains("\"enterprise_value\":"));
        assert!(!line.contains("market_cap"));
        assert!(!line.contains("debt_to_equity"));
        assert!(!line.contains("null"));
    }

    #[test]
    fn timestamps_accept_provider_formats() {
        let midnight = NaiveDate::from_ymd_opt(2024, 11, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        assert_eq!(parse_timestamp("2024-11-01"), Some(midnight));
        assert_eq!(parse_timestamp("2024-11-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_timestamp("2024-11-01T01:00:00+01:00"), Some(midnight));
        assert_eq!(parse_timestamp("2024-11-01 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("not-a-date"), None);
        assert_eq!(parse_timestamp("2024-13-01"), None);
    }

    #[test]
    fn metrics_reject_malformed_report_period() {
        let mut v = metrics_json();
        v["report_period"] = json!("Q3 2024");
        assert!(serde_json::from_value::<FinancialMetrics>(v).is_err());
    }
}
