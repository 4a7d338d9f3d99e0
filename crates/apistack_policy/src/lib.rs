//! # apistack_policy
//!
//! Declarative validation rules for stack configurations.
//!
//! Every invariant the stack relies on is expressed as a rule with a stable
//! id and a severity. `RuleSet::standard()` accepts the stack as originally
//! declared (with warnings); `RuleSet::strict()` promotes warnings to errors.
//!
//! ## Example
//!
//! ```rust
//! use apistack_model::StackConfig;
//! use apistack_policy::RuleSet;
//!
//! let report = RuleSet::standard().evaluate(&StackConfig::default());
//! assert!(report.valid);
//!
//! for warning in report.warnings() {
//!     println!("{}", warning);
//! }
//! ```

pub mod error;
pub mod report;
pub mod rules;

pub use error::{PolicyError, PolicyResult};
pub use report::{RuleSeverity, RuleViolation, ValidationReport};
pub use rules::{RuleOverride, RuleOverrides, RuleSet, RuleType, StackRule, MAX_AVAILABILITY_ZONES};
