pub mod contract;
pub mod recommendation;
pub mod records;
pub mod request;
