//! Detection stages that turn files and facts into findings.
//!
//! - `security`: pattern catalog run over raw text and syntax trees
//! - `governance`: heuristic detectors over extracted [`FileFact`]s
//!
//! Both stages share the [`Finding`] taxonomy; the `kind` prefix
//! (`security.`, `governance.`, `parse.`) tells them apart.
//!
//! [`FileFact`]: crate::analysis::FileFact

pub mod governance;
pub mod security;
mod suppress;
mod types;

pub use governance::{GovernanceDetector, GovernanceReport};
pub use security::{SecurityReport, SecurityScanner};
pub use suppress::{
    filter_suppressed, parse_suppressions, SuppressedFinding, Suppression, SuppressionType,
};
pub use types::{
    count_by, severity_counts, sort_findings, Domain, Finding, FindingSet, MatchContext,
    Severity,
};
