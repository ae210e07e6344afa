//! Data layer: core types, loading, filtering, and write-back.
//!
//! Architecture:
//! ```text
//!  .csv / .xlsx / .xls   (local path, URL, or uploaded bytes)
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse source → Table
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │   Table   │  ordered named columns, rows aligned by position
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  range bounds + optional time buckets → row subset
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  writer   │  append row, overwrite the backing file in place
//!   └──────────┘
//! ```
pub mod filter;
pub mod loader;
pub mod model;
pub mod writer;
