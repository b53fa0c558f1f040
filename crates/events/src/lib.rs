//! BankerJoe Events
//!
//! Every successful mutating operation yields one or more `JoeEvent` records.
//! The engine keeps no log: the caller persists or publishes them.

mod event;

pub use event::{Action, JoeEvent};
