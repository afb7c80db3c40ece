//! Templated, prioritized architecture recommendations.

use serde::{Deserialize, Serialize};

use super::concerns::ConcernMix;
use super::cycles::Cycle;
use super::hotspots::{Bottleneck, GodModule};
use crate::detect::Severity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// 1 is most urgent.
    pub priority: u8,
    pub category: String,
    pub target: String,
    pub action: String,
    pub impact: String,
}

impl Recommendation {
    fn new(priority: u8, category: &str, target: String, action: String, impact: String) -> Self {
        Self {
            priority,
            category: category.to_string(),
            target,
            action,
            impact,
        }
    }

    /// One-line form used in the `recommendations` list.
    pub fn render(&self) -> String {
        format!(
            "[P{}] {}: {}. {} ({})",
            self.priority, self.category, self.target, self.action, self.impact
        )
    }
}

fn stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".py").unwrap_or(name)
}

fn bottleneck_action(b: &Bottleneck) -> String {
    let name = stem(&b.file);
    if b.avg_complexity >= 5.0 {
        format!(
            "Split {} into a thin interface module that others depend on and an implementation module holding the complex logic",
            name
        )
    } else if b.function_count >= 10 {
        format!(
            "Group the {} functions in {} into cohesive sub-modules with one responsibility each",
            b.function_count, name
        )
    } else {
        format!(
            "Extract a stable interface from {} so dependents rely on the contract, not the implementation",
            name
        )
    }
}

/// Build the list ordered by priority, then target.
pub fn recommend(
    cycles: &[Cycle],
    god_modules: &[GodModule],
    bottlenecks: &[Bottleneck],
    concerns: &[ConcernMix],
) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    for cycle in cycles.iter().filter(|c| !c.truncated) {
        recs.push(Recommendation::new(
            1,
            "Circular Dependency",
            cycle.chain(),
            "Move the shared types into a common module, or invert one import through dependency injection".to_string(),
            format!("Untangles {} tightly coupled modules", cycle.length),
        ));
    }

    for god in god_modules {
        recs.push(Recommendation::new(
            1,
            "Module Decomposition",
            god.file.clone(),
            format!(
                "Decompose {} into two or three cohesive modules, extracting the most complex functions first",
                stem(&god.file)
            ),
            format!("Breaks up {} lines with {} dependents", god.line_count, god.fan_in),
        ));
    }

    for bottleneck in bottlenecks
        .iter()
        .filter(|b| b.severity >= Severity::High)
    {
        recs.push(Recommendation::new(
            2,
            "Bottleneck Resolution",
            bottleneck.file.clone(),
            bottleneck_action(bottleneck),
            format!("Reduces risk for {} dependent modules", bottleneck.fan_in),
        ));
    }

    for mix in concerns {
        recs.push(Recommendation::new(
            3,
            "Concern Separation",
            mix.file.clone(),
            format!(
                "Separate {} into concern-specific modules: {}",
                stem(&mix.file),
                mix.concerns.join(", ")
            ),
            format!("Isolates {} mixed concerns for testing", mix.concerns.len()),
        ));
    }

    recs.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.target.cmp(&b.target))
            .then_with(|| a.category.cmp(&b.category))
    });
    recs
}
