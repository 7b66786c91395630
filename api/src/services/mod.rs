pub mod composer;
pub mod forest;
pub mod inference;
pub mod ingest;
