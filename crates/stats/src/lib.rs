//! # Mentor Stats
//!
//! Rebuilds a learner's statistics from the semi-structured block that the
//! host application embeds in every tutoring prompt.
//!
//! ```text
//! prompt text
//!     │
//!     ├──> "User statistics:"      ─> level, scores, response time
//!     ├──> "Latest exercises:"     ─> recent attempts
//!     ├──> "Performance by type:"  ─> per-category success / time
//!     └──> "Recent trends:"        ─> per-day score + sessions
//! ```
//!
//! Each section is matched on its own; a section missing from the prompt
//! leaves its fields unset. Extraction never fails.

mod extract;
mod model;

pub use extract::{
    extract, parse_overview, parse_performance, parse_recent_exercises, parse_trends,
    EXERCISES_HEADER, OVERVIEW_HEADER, PERFORMANCE_HEADER, TRENDS_HEADER,
};
pub use model::{
    ExerciseAttempt, Overview, PerformanceTable, TrendEntry, TypePerformance, UserStats,
};
