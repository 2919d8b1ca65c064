//! Data layer: ingestion, the table model, filtering, derived columns and
//! export. Nothing in here knows about the UI.
//!
//! Architecture:
//! ```text
//!  .csv / .txt                 .xlsx / .xls / .ods
//!        │                            │
//!        ▼                            ▼
//!   ┌──────────┐               ┌────────────┐
//!   │ encoding  │ bytes → text │  calamine   │ first sheet → grid
//!   └──────────┘               └────────────┘
//!        │                            │
//!        ▼                            ▼
//!   ┌──────────┐  parse_document / table_from_grid
//!   │  parser   │──────────────────────────────┐
//!   └──────────┘                               ▼
//!                                       ┌──────────┐
//!                 classify ───────────▶ │ Dataset  │ rows, columns, selection,
//!                                       └──────────┘ derived registry
//!                                          │    ▲
//!                                ┌─────────┘    │ commit / remove
//!                                ▼              │
//!                          ┌──────────┐   ┌──────────┐
//!                          │  filter   │   │  derive   │
//!                          └──────────┘   └──────────┘
//!                                │
//!                                ▼
//!                          ┌──────────┐
//!                          │  export   │ BOM + escaped CSV
//!                          └──────────┘
//! ```
//!
//! `loader` ties the ingestion half together behind one `load_file` call.

pub mod classify;
pub mod derive;
pub mod encoding;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod parser;
