//! Project-wide metrics aggregated from per-file facts.

use serde::{Deserialize, Serialize};

use super::facts::round2;
use super::{FileFact, FunctionFact};

/// How many functions the hotspot and longest lists keep.
pub const TOP_FUNCTIONS: usize = 10;

/// Function counts per complexity band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityDistribution {
    /// 1-5
    pub low: usize,
    /// 6-10
    pub medium: usize,
    /// 11-15
    pub high: usize,
    /// above 15
    pub critical: usize,
}

impl ComplexityDistribution {
    fn record(&mut self, complexity: u32) {
        match complexity {
            0..=5 => self.low += 1,
            6..=10 => self.medium += 1,
            11..=15 => self.high += 1,
            _ => self.critical += 1,
        }
    }
}

/// A function reference in a ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub name: String,
    pub file: String,
    pub line: usize,
    pub complexity: u32,
    pub line_count: usize,
}

impl FunctionRef {
    fn new(file: &str, f: &FunctionFact) -> Self {
        Self {
            name: f.name.clone(),
            file: file.to_string(),
            line: f.line,
            complexity: f.complexity,
            line_count: f.line_count,
        }
    }
}

/// Aggregate metrics for a whole project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetrics {
    pub avg_complexity: f64,
    pub max_complexity: u32,
    pub median_complexity: f64,
    pub avg_function_length: f64,
    pub max_function_length: usize,
    pub docstring_coverage: f64,
    pub type_hint_coverage: f64,
    pub complexity_distribution: ComplexityDistribution,
    pub hotspot_functions: Vec<FunctionRef>,
    pub longest_functions: Vec<FunctionRef>,
    pub total_functions: usize,
    pub total_classes: usize,
}

impl ProjectMetrics {
    /// Compute metrics from `files`.
    ///
    /// With no functions every metric is zero and the lists are empty.
    pub fn compute(files: &[FileFact]) -> Self {
        let functions: Vec<FunctionRef> = files
            .iter()
            .flat_map(|file| file.functions.iter().map(move |f| FunctionRef::new(&file.path, f)))
            .collect();
        let total_classes = files.iter().map(|f| f.classes.len()).sum();

        if functions.is_empty() {
            return Self {
                total_classes,
                ..Self::default()
            };
        }

        let count = functions.len() as f64;
        let mut complexities: Vec<u32> = functions.iter().map(|f| f.complexity).collect();
        complexities.sort_unstable();

        let mut distribution = ComplexityDistribution::default();
        for c in &complexities {
            distribution.record(*c);
        }

        let documented = files
            .iter()
            .flat_map(|f| &f.functions)
            .filter(|f| f.has_docstring)
            .count();
        let (typed, slots) = files
            .iter()
            .flat_map(|f| &f.functions)
            .map(FunctionFact::type_hint_slots)
            .fold((0usize, 0usize), |(t, s), (ft, fs)| (t + ft, s + fs));

        let total_lines: usize = functions.iter().map(|f| f.line_count).sum();
        let total_complexity: u32 = complexities.iter().sum();

        Self {
            avg_complexity: round2(total_complexity as f64 / count),
            max_complexity: complexities.last().copied().unwrap_or(0),
            median_complexity: round2(median(&complexities)),
            avg_function_length: round2(total_lines as f64 / count),
            max_function_length: functions.iter().map(|f| f.line_count).max().unwrap_or(0),
            docstring_coverage: round2(documented as f64 / count),
            type_hint_coverage: if slots == 0 {
                0.0
            } else {
                round2(typed as f64 / slots as f64)
            },
            complexity_distribution: distribution,
            hotspot_functions: top_by(&functions, |f| f.complexity as usize),
            longest_functions: top_by(&functions, |f| f.line_count),
            total_functions: functions.len(),
            total_classes,
        }
    }
}

fn median(sorted: &[u32]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Highest `TOP_FUNCTIONS` by `key`, ties broken by file then line.
fn top_by(functions: &[FunctionRef], key: impl Fn(&FunctionRef) -> usize) -> Vec<FunctionRef> {
    let mut ranked: Vec<&FunctionRef> = functions.iter().collect();
    ranked.sort_by(|a, b| {
        key(b)
            .cmp(&key(a))
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
    });
    ranked.into_iter().take(TOP_FUNCTIONS).cloned().collect()
}
