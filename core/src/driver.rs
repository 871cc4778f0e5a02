//! The analysis loop: find every call site of the target method,
//! reconstruct the arguments at each site, execute the target, and
//! collect the returned values.

use serde::Serialize;

use crate::context::AnalysisContext;
use crate::errors::EmuError;
use crate::format::format_value;
use crate::interp::Interp;
use crate::loader;
use crate::mocks::factories::create_mock_for_class;
use crate::slicer::{self, ArgInfo, DependencyAnalyzer};
use crate::value::Value;

/// One analyzed call site.
#[derive(Debug, Serialize)]
pub struct CallSiteReport {
    /// Caller signature `LClass;->name`
    pub caller: String,
    /// Byte offset of the invoke inside the caller
    pub pc: usize,
    /// Formatted argument values
    pub args: Vec<String>,
    /// Formatted return value
    pub result: String,
}

/// Full result of one analysis run.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub target: String,
    pub sites: Vec<CallSiteReport>,
}

#[derive(Debug)]
struct CandidateSite {
    record_idx: usize,
    caller: String,
    pc: usize,
    line: String,
}

/// Types whose unresolved occurrences get a mock injected.
const CONTEXT_TYPES: &[&str] = &[
    "Landroid/content/Context;",
    "Landroid/app/Activity;",
    "Landroid/app/Application;",
];

/// Analyze every call site of `target` (`LClass;->name` form).
pub fn analyze(ctx: &AnalysisContext, target: &str) -> Result<AnalysisReport, EmuError> {
    let Some((target_class, rest)) = target.split_once("->") else {
        return Err(EmuError::InvalidTarget(target.to_string()));
    };
    if !target_class.starts_with('L') || !target_class.ends_with(';') {
        return Err(EmuError::InvalidTarget(target.to_string()));
    }
    let target_name = rest.split('(').next().unwrap_or(rest);

    let target_idx = loader::find_method(ctx, target_class, target_name)
        .ok_or_else(|| EmuError::MethodNotFound(target.to_string()))?;
    if loader::method_code(ctx, target_idx).is_none() {
        return Err(EmuError::MethodNotFound(target.to_string()));
    }

    log::info!("target: {target_class}->{target_name}");

    // transitive dependencies of the target, plus every caller's class
    let mut deps = DependencyAnalyzer::new(ctx).analyze(target_idx);
    let candidates = find_call_sites(ctx, target_class, target_name);
    for candidate in &candidates {
        if let Some(record) = ctx.program.methods.get(candidate.record_idx) {
            deps.classes_needing_init.insert(record.class.clone());
        }
    }

    ctx.reset_store();
    log::info!(
        "initializing {} class(es)",
        deps.classes_needing_init.len()
    );
    for class in &deps.classes_needing_init {
        loader::run_clinit(ctx, class);
    }

    let mut sites = Vec::new();
    for candidate in candidates {
        ctx.reset_warn_budget();
        log::info!(
            "call site: {} @ PC={} ({})",
            candidate.caller,
            candidate.pc,
            candidate.line
        );

        let args = resolve_site_args(ctx, &candidate);
        let formatted_args: Vec<String> = args.iter().map(format_value).collect();

        // every site starts from a clean static state
        ctx.reset_store();
        loader::run_clinit(ctx, target_class);

        let result = execute_target(ctx, target_idx, &args);

        sites.push(CallSiteReport {
            caller: candidate.caller,
            pc: candidate.pc,
            args: formatted_args,
            result: format_value(&result),
        });
    }

    Ok(AnalysisReport {
        target: target.to_string(),
        sites,
    })
}

/// Textual scan of every program method for invokes naming the target.
/// Candidates come back sorted by `(caller, pc)` and capped by the
/// configured site limit.
fn find_call_sites(
    ctx: &AnalysisContext,
    target_class: &str,
    target_name: &str,
) -> Vec<CandidateSite> {
    let mut candidates = Vec::new();

    for (record_idx, record) in ctx.program.iter_code_methods() {
        let Some(code) = loader::method_code(ctx, record_idx) else {
            continue;
        };
        let caller = record.signature();

        for (pc, entry) in code.trace.iter() {
            if entry.text.contains("invoke")
                && entry.text.contains(target_name)
                && entry.text.contains(target_class)
            {
                candidates.push(CandidateSite {
                    record_idx,
                    caller: caller.clone(),
                    pc,
                    line: entry.text.clone(),
                });
            }
        }
    }

    candidates.sort_by(|a, b| a.caller.cmp(&b.caller).then(a.pc.cmp(&b.pc)));

    if ctx.config.site_limit > 0 {
        candidates.truncate(ctx.config.site_limit);
    }

    candidates
}

/// Resolve the arguments at one call site: statically where possible,
/// by slice execution otherwise.
fn resolve_site_args(ctx: &AnalysisContext, candidate: &CandidateSite) -> Vec<Value> {
    let Some(code) = loader::method_code(ctx, candidate.record_idx) else {
        return Vec::new();
    };

    let arg_infos = slicer::extract_args_static(&code.trace, candidate.pc);
    if arg_infos.iter().all(|info| info.resolved) {
        return arg_infos
            .into_iter()
            .map(|info| info.value.unwrap_or(Value::Null))
            .collect();
    }

    resolve_args_by_execution(ctx, candidate, &arg_infos)
}

/// Execute the caller's dependency slice to materialize the argument
/// registers that static analysis could not fold.
fn resolve_args_by_execution(
    ctx: &AnalysisContext,
    candidate: &CandidateSite,
    arg_infos: &[ArgInfo],
) -> Vec<Value> {
    let Some(code) = loader::method_code(ctx, candidate.record_idx) else {
        return arg_infos
            .iter()
            .map(|info| info.value.clone().unwrap_or(Value::Null))
            .collect();
    };
    let Some(record) = ctx.program.methods.get(candidate.record_idx) else {
        return Vec::new();
    };

    let arg_regs = slicer::invoke_arg_registers(&candidate.line);
    let deps = slicer::build_register_dependencies(&code.trace, candidate.pc, &arg_regs);

    log::info!(
        "executing {} of {} caller instructions affecting the arguments",
        deps.len(),
        code.trace.pcs_before(candidate.pc).count()
    );

    ctx.reset_store();
    loader::run_clinit(ctx, &record.class);

    let mut caller = Interp::new(ctx, code, candidate.caller.clone());
    caller.silent = true;

    // framework-typed caller parameters get stand-ins up front
    let caller_params = parse_param_types(&record.descriptor);
    let receiver = usize::from(!record.is_static());
    let param_count = caller_params.len() + receiver;
    let first_param_reg = (caller.regs.len()).saturating_sub(param_count);
    for (i, param) in caller_params.iter().enumerate() {
        if CONTEXT_TYPES.contains(&param.as_str()) {
            if let Some(mock) = create_mock_for_class(&ctx.mocks, param) {
                let reg = first_param_reg + receiver + i;
                log::info!("injecting {} mock into v{}", param, reg);
                caller.regs.set(reg, mock);
            }
        }
    }

    caller.run_slice(&deps, candidate.pc);

    // expected parameter types of the target, for mock injection of
    // arguments that stayed unresolved
    let target_params = ctx
        .method_token_re
        .captures(&candidate.line)
        .and_then(|caps| caps.get(1))
        .map(|token| {
            let token = token.as_str();
            let params = token
                .split_once('(')
                .map(|(_, rest)| rest.split(')').next().unwrap_or(""))
                .unwrap_or("");
            parse_param_types(params)
        })
        .unwrap_or_default();

    arg_regs
        .iter()
        .enumerate()
        .map(|(i, &reg)| {
            let val = caller.regs.get(reg);
            if !val.is_null() {
                log::debug!("resolved v{reg} = {}", format_value(&val));
                return val;
            }
            if let Some(info) = arg_infos.get(i) {
                if info.resolved {
                    return info.value.clone().unwrap_or(Value::Null);
                }
            }
            // last resort: a framework mock matching the declared type
            if let Some(param) = target_params.get(i) {
                if CONTEXT_TYPES.contains(&param.as_str()) {
                    if let Some(mock) = create_mock_for_class(&ctx.mocks, param) {
                        log::info!("injecting {param} mock for unresolved v{reg}");
                        return mock;
                    }
                }
            }
            Value::Null
        })
        .collect()
}

/// Run the target with the reconstructed arguments and return its value.
fn execute_target(ctx: &AnalysisContext, target_idx: usize, args: &[Value]) -> Value {
    let Some(code) = loader::method_code(ctx, target_idx) else {
        return Value::Null;
    };
    let signature = ctx
        .program
        .methods
        .get(target_idx)
        .map(|record| record.signature())
        .unwrap_or_default();

    let mut target = Interp::new(ctx, code, signature);
    target.set_args(args);
    target.run(ctx.config.site_step_cap);
    target.last_result
}

/// Split a parameter list like `I I Ljava/lang/String; [B` into its
/// individual type descriptors. Separating spaces are cosmetic.
pub(crate) fn parse_param_types(params: &str) -> Vec<String> {
    let mut types = Vec::new();
    let params = match params.split_once('(') {
        // tolerate a full descriptor
        Some((_, rest)) => rest.split(')').next().unwrap_or(rest),
        None => params.split(')').next().unwrap_or(params),
    };

    let bytes = params.as_bytes();
    let mut i = 0usize;
    let mut array_depth = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b' ' => i += 1,
            b'[' => {
                array_depth += 1;
                i += 1;
            }
            b'L' => {
                let end = params[i..].find(';').map(|at| i + at).unwrap_or(bytes.len() - 1);
                let ty = format!("{}{}", "[".repeat(array_depth), &params[i..=end]);
                types.push(ty);
                array_depth = 0;
                i = end + 1;
            }
            c if b"ZBCSIJFD".contains(&c) => {
                types.push(format!("{}{}", "[".repeat(array_depth), c as char));
                array_depth = 0;
                i += 1;
            }
            _ => i += 1,
        }
    }

    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_lists_with_spaces_and_arrays() {
        assert_eq!(parse_param_types("I I"), vec!["I", "I"]);
        assert_eq!(
            parse_param_types("Ljava/lang/String; [B J"),
            vec!["Ljava/lang/String;", "[B", "J"]
        );
        assert_eq!(parse_param_types("[[I Z"), vec!["[[I", "Z"]);
        assert_eq!(
            parse_param_types("(Landroid/content/Context;)V"),
            vec!["Landroid/content/Context;"]
        );
        assert!(parse_param_types("").is_empty());
    }
}
