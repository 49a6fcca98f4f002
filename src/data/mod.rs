//! Data layer: measurement loading, grid unification, and aggregation.
//!
//! ```text
//!  <dir>/*.txt   or   <root>/<run>/<interface polarization>/*.txt
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  decode cp1251 rows, parse angle/radius/path tokens
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐   ┌──────────┐
//!   │   grid    │ → │  impute   │  unify frequency axes, fill gaps
//!   └──────────┘   └──────────┘
//!        │
//!        ▼
//!   ┌─────────────────────────┐
//!   │ aggregate / containment  │  AggregatedMatrix / ContainmentTable
//!   └─────────────────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  export   │  optional per-frequency CSV
//!   └──────────┘
//! ```

pub mod aggregate;
pub mod containment;
pub mod export;
pub mod grid;
pub mod impute;
pub mod loader;
pub mod model;
