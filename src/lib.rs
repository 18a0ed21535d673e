//! RustDock-Batch: parallel batch orchestration of external docking tools
//!
//! This library fans out structure preparation (Open Babel, PDBFixer,
//! AutoDockTools), pocket prediction (P2Rank) and docking (AutoDock Vina,
//! AutoDock4) runs over a bounded worker pool. A CPU budget is split between
//! the workers, every task ends up with exactly one recorded outcome, and
//! docking logs are combined into a single summary table.

pub mod allocator;
pub mod batch;
pub mod config;
pub mod engines;
pub mod executor;
pub mod io;
pub mod outcome;
pub mod pocket;
pub mod prep;
pub mod process;
pub mod progress;
pub mod task;

// Re-export commonly used types and functions
pub use allocator::CpuAllocation;
pub use batch::{BatchDocking, BatchError, BatchPocketFinder, BatchPreparation};
pub use config::ToolConfig;
pub use engines::{Ad4Engine, DockingEngine, VinaEngine};
pub use executor::BatchExecutor;
pub use outcome::{BatchSummary, Outcome, OutcomeMap};
pub use task::{Center, TaskDescriptor, TaskKey};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
