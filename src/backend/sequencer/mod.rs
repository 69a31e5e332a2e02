//! Commit-Order Sequencer
//!
//! Change-capture events arrive in delivery order. The sequencer sorts each
//! batch into commit order and hands the events one at a time to a
//! `ChangeHandler`, logging and skipping failures.
//!
//! # Module Structure
//!
//! ```text
//! sequencer/
//! ├── mod.rs        - Module exports
//! ├── ordering.rs   - Commit-order comparator
//! ├── processor.rs  - ChangeHandler, sequential batch processing
//! ├── dispatch.rs   - ChangeDispatcher (table -> sync / access calls)
//! └── handlers.rs   - Change-capture webhook
//! ```

pub mod dispatch;
pub mod handlers;
pub mod ordering;
pub mod processor;

pub use dispatch::ChangeDispatcher;
pub use ordering::{compare_commit_order, sort_by_commit_order};
pub use processor::{process_in_commit_order, BatchOutcome, ChangeHandler};
