//! Background workers (C7/C8): the ticker-driven trending refresher and the
//! one-shot bulk indexer, both scanning the store via the shared scoring
//! engine (C5).

pub mod indexer;
pub mod refresher;

pub use indexer::{IndexReport, Indexer};
pub use refresher::Refresher;
