//! Execution policy knobs.

/// Step caps and reporting limits for one analysis run.
///
/// The caps bound every sub-execution, which is what makes the whole
/// analysis terminate: the set of call sites is finite and each method
/// run stops at its cap as if it had returned void.
#[derive(Debug, Clone)]
pub struct EmulatorConfig {
    /// Steps allowed per nested method execution
    pub method_step_cap: u32,

    /// Steps allowed per class initializer
    pub clinit_step_cap: u32,

    /// Steps allowed for the target method at each call site
    pub site_step_cap: u32,

    /// Warnings printed per call site before suppression
    pub max_warnings_per_site: u32,

    /// Maximum call sites to analyze, 0 for all
    pub site_limit: usize,

    /// Nested-call depth bound for cross-method execution
    pub max_call_depth: usize,
}

impl Default for EmulatorConfig {
    fn default() -> EmulatorConfig {
        EmulatorConfig {
            method_step_cap: 5000,
            clinit_step_cap: 500,
            site_step_cap: 10000,
            max_warnings_per_site: 5,
            site_limit: 0,
            max_call_depth: 48,
        }
    }
}
