//! Decoding of provider bodies into validated batches.
//!
//! Every raw record is validated on its own; failures are logged and counted. An empty body is
//! `NoDataFound`, a non-empty body with no valid record is `AllRecordsInvalid`.

use crate::domain::records::{
    BalanceSheet, CashFlowStatement, FinancialMetrics, IncomeStatement, NewsItem, PriceBar,
    StatementRow, ValidatedRecord,
};
use crate::ingest::error::FetchError;
use crate::ingest::types::{Domain, RawRecord, ValidatedBatch};
use serde::de::DeserializeOwned;
use serde_json::Value;

const STATEMENT_ARRAYS: [(&str, RowKind); 3] = [
    ("income_statements", RowKind::Income),
    ("balance_sheets", RowKind::Balance),
    ("cash_flow_statements", RowKind::CashFlow),
];

#[derive(Debug, Clone, Copy)]
enum RowKind {
    Metrics,
    Income,
    Balance,
    CashFlow,
    News,
    Price,
}

pub fn decode_batch(domain: Domain, body: Value) -> Result<ValidatedBatch, FetchError> {
    let raw = extract_raw(domain, body)?;
    if raw.is_empty() {
        return Err(FetchError::NoDataFound { domain });
    }

    let mut records = Vec::with_capacity(raw.len());
    let mut dropped = 0usize;
    for (idx, (kind, item)) in raw.into_iter().enumerate() {
        match validate_one(kind, item) {
            Ok(record) => records.push(record),
            Err(error) => {
                dropped += 1;
                tracing::warn!(%domain, idx, %error, "dropping invalid provider record");
            }
        }
    }

    if records.is_empty() {
        return Err(FetchError::AllRecordsInvalid { domain, dropped });
    }

    if dropped > 0 {
        tracing::info!(%domain, valid = records.len(), dropped, "provider batch partially valid");
    }

    Ok(ValidatedBatch {
        domain,
        records,
        dropped,
    })
}

fn extract_raw(domain: Domain, body: Value) -> Result<Vec<(RowKind, Value)>, FetchError> {
    let Value::Object(mut body) = body else {
        return Err(FetchError::Decode {
            domain,
            detail: "response body is not a JSON object".to_string(),
        });
    };

    let (key, kind) = match domain {
        Domain::Metrics => ("financial_metrics", RowKind::Metrics),
        Domain::News => ("news", RowKind::News),
        Domain::Prices => ("prices", RowKind::Price),
        Domain::Statements => {
            let mut financials = match body.remove("financials") {
                None | Some(Value::Null) => return Ok(Vec::new()),
                Some(Value::Object(o)) => o,
                Some(_) => {
                    return Err(FetchError::Decode {
                        domain,
                        detail: "\"financials\" is not an object".to_string(),
                    })
                }
            };
            let mut out = Vec::new();
            for (array_key, kind) in STATEMENT_ARRAYS {
                for row in take_array(domain, &mut financials, array_key)? {
                    out.push((kind, row));
                }
            }
            return Ok(out);
        }
    };

    Ok(take_array(domain, &mut body, key)?
        .into_iter()
        .map(|v| (kind, v))
        .collect())
}

fn take_array(domain: Domain, obj: &mut RawRecord, key: &str) -> Result<Vec<Value>, FetchError> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(FetchError::Decode {
            domain,
            detail: format!("{key:?} is not an array"),
        }),
    }
}

fn validate_one(kind: RowKind, item: Value) -> Result<ValidatedRecord, serde_json::Error> {
    Ok(match kind {
        RowKind::Metrics => ValidatedRecord::Metrics(typed::<FinancialMetrics>(item)?),
        RowKind::Income => {
            ValidatedRecord::Statement(StatementRow::Income(typed::<IncomeStatement>(item)?))
        }
        RowKind::Balance => {
            ValidatedRecord::Statement(StatementRow::Balance(typed::<BalanceSheet>(item)?))
        }
        RowKind::CashFlow => {
            ValidatedRecord::Statement(StatementRow::CashFlow(typed::<CashFlowStatement>(item)?))
        }
        RowKind::News => ValidatedRecord::News(typed::<NewsItem>(item)?),
        RowKind::Price => ValidatedRecord::Price(typed::<PriceBar>(item)?),
    })
}

fn typed<T: DeserializeOwned>(item: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(item)
}
