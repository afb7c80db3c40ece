//! Language-specific analyzer implementations.

mod python;

pub use python::PythonAnalyzer;

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Whether analyzers have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available language analyzers.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_analyzers() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }

    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new);
}

/// Get an analyzer for the given file extension.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    register_analyzers();

    match ext {
        "py" => PYTHON_ANALYZER.get().map(|a| a as &'static dyn LanguageAnalyzer),
        _ => None,
    }
}

/// The analyzer used for project runs.
pub fn python() -> &'static PythonAnalyzer {
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new)
}
