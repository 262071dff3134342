//! Star-schema loader: reshapes cleaned statistical sheets into a long staging
//! table, reconciles year, location and indicator dimensions against their
//! master references (Type-1 merge), and rebuilds the fact table.

pub mod adapters;
pub mod config;
pub mod dimension;
pub mod error;
pub mod fact;
pub mod output;
pub mod pipeline;
pub mod staging;
pub mod storage;
pub mod types;
pub mod util;
