pub mod baseline;
pub mod query;
pub mod score;
