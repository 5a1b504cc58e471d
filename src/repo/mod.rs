//! The reconciliation engine: classify packages, plan mutations, apply them.

mod classify;
mod execute;
mod plan;

pub use classify::{
    ClassifyInput, Criterion, Filter, PackageStatus, Tag, Tags, classify,
};
pub use execute::{Executor, Outcome, Report};
pub use plan::{AddTarget, ImportMode, Mutation, Operation, Plan, Planner, Policy, add_targets};
