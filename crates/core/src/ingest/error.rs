use crate::ingest::types::Domain;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{domain} request returned HTTP {status}: {body}")]
    Upstream {
        domain: Domain,
        status: u16,
        body: String,
    },

    #[error("no data found")]
    NoDataFound { domain: Domain },

    #[error("all {dropped} {domain} records failed validation")]
    AllRecordsInvalid { domain: Domain, dropped: usize },

    #[error("{domain} request failed: {detail}")]
    Transport { domain: Domain, detail: String },

    #[error("{domain} response could not be decoded: {detail}")]
    Decode { domain: Domain, detail: String },
}
