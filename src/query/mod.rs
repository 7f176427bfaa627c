//! Eventflow Query Engine
//!
//! Turns retrieval parameters into a store read:
//!
//! - **condition**: Backend-neutral condition tree and builder
//! - **filter**: `EventsQuery` composition (type, time policy, pagination)
//! - **engine**: Executes composed queries against an `EventStore`
//!
//! # Time policy
//!
//! ```text
//! interval > 0          → now - interval*3600 <= ts <= now   (wins over from/to)
//! from > 0 && to > 0    → from <= ts <= to
//! from > 0              → ts >= from
//! to > 0                → ts <= to
//! otherwise             → no time filter
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use eventflow::query::{EventsQuery, QueryEngine};
//!
//! let engine = QueryEngine::new(store);
//! let events = engine
//!     .execute(&EventsQuery::new().event_type("login").range(900, 1100))
//!     .await?;
//! ```

mod condition;
mod engine;
mod error;
mod filter;

pub use condition::{Condition, ConditionBuilder, Field, Operator, Value};
pub use engine::QueryEngine;
pub use error::{QueryError, QueryResult};
pub use filter::{EventsQuery, FindQuery, TimeFilter, DEFAULT_LIMIT};
