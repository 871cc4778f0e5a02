//! Backward register-dependency analysis over trace maps.
//!
//! Given an invoke site and its argument registers, the slicer walks the
//! trace backwards collecting the minimum set of PCs whose execution
//! materializes those registers. Object construction and array
//! initialization need targeted forward lookups: the `<init>` call and
//! the `fill-array-data` payload are part of how the value is built and
//! must run in sequence with the rest of the slice.

use std::collections::BTreeSet;

use ahash::AHashSet;

use crate::context::AnalysisContext;
use crate::dis::TraceMap;
use crate::loader;
use crate::value::Value;

/// Parse a register token like `v12` or `v3,`.
fn reg_token(token: &str) -> Option<usize> {
    let token = token.trim_end_matches(',');
    let digits = token.strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a rendered literal operand (decimal, or hex with `0x`).
fn literal_token(token: &str) -> Option<i64> {
    let token = token.trim_end_matches(',');
    if let Some(hex) = token.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = token.strip_prefix("-0x") {
        return i64::from_str_radix(hex, 16).ok().map(|v| -v);
    }
    token.parse().ok()
}

/// Argument registers of an invoke line: the `v` tokens before the
/// method or type reference.
pub fn invoke_arg_registers(line: &str) -> Vec<usize> {
    let mut regs = Vec::new();
    for token in line.split_whitespace().skip(1) {
        let token = token.trim_end_matches(',');
        if token.starts_with('L') || token.starts_with('[') {
            break;
        }
        if let Some(reg) = reg_token(token) {
            regs.push(reg);
        }
    }
    regs
}

/// Classification of one instruction: the register it writes, the
/// registers it reads, and any forward-lookup PCs that belong with it.
#[derive(Debug, Default)]
struct Effects {
    written: Option<usize>,
    reads: Vec<usize>,
    extra_pcs: Vec<usize>,
}

fn classify(
    trace: &TraceMap,
    pc: usize,
    line: &str,
    sorted_pcs: &[usize],
) -> Effects {
    let mut fx = Effects::default();
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(&opcode) = parts.first() else {
        return fx;
    };

    let dst = parts.get(1).and_then(|t| reg_token(t));
    let src = parts.get(2).and_then(|t| reg_token(t));
    let third = parts.get(3).and_then(|t| reg_token(t));

    if opcode.starts_with("const") {
        fx.written = dst;
    } else if opcode == "move" || opcode.starts_with("move/")
        || opcode == "move-object" || opcode.starts_with("move-object/")
        || opcode == "move-wide" || opcode.starts_with("move-wide/")
    {
        fx.written = dst;
        fx.reads.extend(src);
    } else if opcode.starts_with("move-result") {
        fx.written = dst;
        // the producing invoke (or filled-new-array) and its own argument
        // registers come along
        for prev in sorted_pcs.iter().rev().filter(|&&p| p < pc) {
            let Some(prev_line) = trace.line(*prev) else {
                continue;
            };
            if prev_line.contains("invoke") || prev_line.starts_with("filled-new-array") {
                fx.extra_pcs.push(*prev);
                fx.reads.extend(invoke_arg_registers(prev_line));
                break;
            }
        }
    } else if opcode.starts_with("sget") {
        fx.written = dst;
    } else if opcode.starts_with("iget") {
        fx.written = dst;
        fx.reads.extend(src);
    } else if opcode.starts_with("aget") {
        fx.written = dst;
        fx.reads.extend(src);
        fx.reads.extend(third);
    } else if opcode == "new-array" {
        fx.written = dst;
        fx.reads.extend(src);
        // forward: the fill-array-data that populates this array
        if let Some(reg) = dst {
            let needle = format!("v{reg}");
            for fwd in sorted_pcs.iter().filter(|&&p| p > pc) {
                let Some(fwd_line) = trace.line(*fwd) else {
                    continue;
                };
                if fwd_line.starts_with("fill-array-data") {
                    let fill_reg = fwd_line.split_whitespace().nth(1).map(|t| t.trim_end_matches(','));
                    if fill_reg == Some(needle.as_str()) {
                        fx.extra_pcs.push(*fwd);
                        break;
                    }
                }
            }
        }
    } else if opcode == "new-instance" {
        fx.written = dst;
        // forward: the invoke-direct <init> that builds the object
        if let Some(reg) = dst {
            let needle = format!("v{reg}");
            for fwd in sorted_pcs.iter().filter(|&&p| p > pc) {
                let Some(fwd_line) = trace.line(*fwd) else {
                    continue;
                };
                if fwd_line.contains("invoke-direct") && fwd_line.contains("<init>") {
                    let fwd_parts: Vec<&str> = fwd_line.split_whitespace().collect();
                    let first_arg = fwd_parts.get(1).map(|t| t.trim_end_matches(','));
                    if first_arg == Some(needle.as_str()) {
                        fx.extra_pcs.push(*fwd);
                        // the constructor arguments are read too
                        for token in fwd_parts.iter().skip(2) {
                            let token = token.trim_end_matches(',');
                            if token.starts_with('L') || token.starts_with('[') {
                                break;
                            }
                            fx.reads.extend(reg_token(token));
                        }
                        break;
                    }
                }
            }
        }
    } else if opcode == "check-cast" {
        // modifies the register in place
        fx.written = dst;
        fx.reads.extend(dst);
    } else if opcode == "array-length" {
        fx.written = dst;
        fx.reads.extend(src);
    } else if opcode.starts_with("cmp") {
        fx.written = dst;
        fx.reads.extend(src);
        fx.reads.extend(third);
    } else if is_binop(opcode) {
        if opcode.contains("/2addr") {
            fx.written = dst;
            fx.reads.extend(dst);
            fx.reads.extend(src);
        } else if opcode.contains("/lit") || opcode == "rsub-int" {
            fx.written = dst;
            fx.reads.extend(src);
        } else {
            fx.written = dst;
            fx.reads.extend(src);
            fx.reads.extend(third);
        }
    } else if is_unop(opcode) {
        fx.written = dst;
        fx.reads.extend(src);
    }

    fx
}

fn is_binop(opcode: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "add-", "sub-", "mul-", "div-", "rem-", "and-", "or-", "xor-", "shl-", "shr-", "ushr-",
        "rsub-",
    ];
    PREFIXES.iter().any(|p| opcode.starts_with(p))
}

fn is_unop(opcode: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "neg-", "not-", "int-to-", "long-to-", "float-to-", "double-to-",
    ];
    PREFIXES.iter().any(|p| opcode.starts_with(p))
}

/// Compute the set of PCs strictly before `target_pc` whose execution is
/// sufficient to materialize `arg_regs` at the invoke.
pub fn build_register_dependencies(
    trace: &TraceMap,
    target_pc: usize,
    arg_regs: &[usize],
) -> BTreeSet<usize> {
    let sorted_pcs: Vec<usize> = trace.pcs_before(target_pc).collect();
    if sorted_pcs.is_empty() {
        return BTreeSet::new();
    }

    let mut needed: BTreeSet<usize> = arg_regs.iter().copied().collect();
    let mut deps = BTreeSet::new();

    for &pc in sorted_pcs.iter().rev() {
        let Some(line) = trace.line(pc) else {
            continue;
        };
        let fx = classify(trace, pc, line, &sorted_pcs);

        if let Some(written) = fx.written {
            if needed.remove(&written) {
                deps.insert(pc);
                deps.extend(fx.extra_pcs);
                needed.extend(fx.reads);
            }
        }
    }

    deps
}

// ---------------------------------------------------------------------------
// static argument extraction

/// Where an argument register's value comes from, statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSource {
    Const,
    ConstString,
    StaticField,
    Invoke,
    Computed,
    Param,
    Unknown,
}

/// Static resolution result for one argument register.
#[derive(Debug, Clone)]
pub struct ArgInfo {
    pub register: usize,
    pub value: Option<Value>,
    pub source: ArgSource,
    pub detail: String,
    pub resolved: bool,
}

impl ArgInfo {
    fn unresolved(register: usize, source: ArgSource, detail: impl Into<String>) -> ArgInfo {
        ArgInfo {
            register,
            value: None,
            source,
            detail: detail.into(),
            resolved: false,
        }
    }
}

/// Extract the arguments of the invoke at `call_pc` by backward tracing,
/// without execution.
pub fn extract_args_static(trace: &TraceMap, call_pc: usize) -> Vec<ArgInfo> {
    let Some(line) = trace.line(call_pc) else {
        return Vec::new();
    };

    invoke_arg_registers(line)
        .into_iter()
        .map(|reg| trace_register_source(reg, call_pc, trace))
        .collect()
}

/// Walk backwards from `start_pc` to find where a register gets its
/// value. Constant loads resolve immediately; everything else is left to
/// the slice executor.
fn trace_register_source(reg: usize, start_pc: usize, trace: &TraceMap) -> ArgInfo {
    for pc in trace.pcs_before(start_pc).rev() {
        let Some(line) = trace.line(pc) else {
            continue;
        };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&opcode) = parts.first() else {
            continue;
        };

        let Some(dst) = parts.get(1).and_then(|t| reg_token(t)) else {
            continue;
        };
        if dst != reg {
            continue;
        }

        if opcode.starts_with("const-string") {
            // resolved by execution against the real string table; trace
            // text may mangle special characters
            return ArgInfo::unresolved(reg, ArgSource::ConstString, "needs execution");
        }

        if opcode.starts_with("const") {
            let value = parts.get(2).and_then(|t| literal_token(t));
            return match value {
                Some(lit) => ArgInfo {
                    register: reg,
                    value: Some(if opcode.contains("wide") {
                        Value::Long(lit)
                    } else {
                        Value::Int(lit as i32)
                    }),
                    source: ArgSource::Const,
                    detail: lit.to_string(),
                    resolved: true,
                },
                None => ArgInfo::unresolved(reg, ArgSource::Const, "unparseable literal"),
            };
        }

        if opcode.starts_with("sget") {
            let field = parts
                .iter()
                .find(|t| t.contains("->"))
                .map(|t| t.trim_end_matches(','))
                .unwrap_or("");
            log::debug!("arg v{reg} requires static field: {field}");
            return ArgInfo::unresolved(reg, ArgSource::StaticField, field);
        }

        if opcode.starts_with("invoke") || opcode.starts_with("move-result") {
            let detail = invoke_detail(trace, pc, opcode);
            log::debug!("arg v{reg} requires method result: {detail}");
            return ArgInfo::unresolved(reg, ArgSource::Invoke, detail);
        }

        if opcode == "move" || opcode.starts_with("move/") || opcode == "move-object" {
            if let Some(src) = parts.get(2).and_then(|t| reg_token(t)) {
                return trace_register_source(src, pc, trace);
            }
            return ArgInfo::unresolved(reg, ArgSource::Unknown, "move without source");
        }

        // written by something the static pass cannot fold
        return ArgInfo::unresolved(reg, ArgSource::Computed, opcode.to_string());
    }

    log::debug!("arg v{reg} is unresolved (possibly a method parameter)");
    ArgInfo::unresolved(reg, ArgSource::Param, format!("method parameter v{reg}"))
}

fn invoke_detail(trace: &TraceMap, pc: usize, opcode: &str) -> String {
    let line = if opcode.starts_with("move-result") {
        trace
            .pcs_before(pc)
            .next_back()
            .and_then(|prev| trace.line(prev))
            .unwrap_or("")
            .to_string()
    } else {
        trace.line(pc).unwrap_or("").to_string()
    };

    line.split_whitespace()
        .find(|t| t.contains("->"))
        .map(|t| t.split('(').next().unwrap_or(t).to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// method-level dependency discovery

/// Dependencies discovered for a method without executing it.
#[derive(Debug, Default)]
pub struct MethodDependencies {
    /// `LClass;->fieldName`
    pub static_fields: BTreeSet<String>,
    /// `LClass;`
    pub classes_needing_init: BTreeSet<String>,
    /// `LClass;->method`
    pub methods_called: BTreeSet<String>,
}

impl MethodDependencies {
    pub fn merge(&mut self, other: MethodDependencies) {
        self.static_fields.extend(other.static_fields);
        self.classes_needing_init.extend(other.classes_needing_init);
        self.methods_called.extend(other.methods_called);
    }
}

/// Recursive scan for static fields, classes needing `<clinit>`, and
/// called methods. Depth-limited; a visited set stops cycles.
pub struct DependencyAnalyzer<'a> {
    ctx: &'a AnalysisContext,
    analyzed: AHashSet<String>,
}

impl<'a> DependencyAnalyzer<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> DependencyAnalyzer<'a> {
        DependencyAnalyzer {
            ctx,
            analyzed: AHashSet::new(),
        }
    }

    pub fn analyze(&mut self, record_idx: usize) -> MethodDependencies {
        self.analyze_at(record_idx, 0)
    }

    fn analyze_at(&mut self, record_idx: usize, depth: usize) -> MethodDependencies {
        let mut deps = MethodDependencies::default();

        let Some(record) = self.ctx.program.methods.get(record_idx) else {
            return deps;
        };
        let signature = record.signature();
        if !self.analyzed.insert(signature) {
            return deps;
        }

        let Some(code) = loader::method_code(self.ctx, record_idx) else {
            return deps;
        };

        deps.classes_needing_init.insert(record.class.clone());

        for (_, entry) in code.trace.iter() {
            analyze_line(&entry.text, &mut deps);
        }

        if depth < 3 {
            for called in deps.methods_called.clone() {
                let Some((class, name)) = called.split_once("->") else {
                    continue;
                };
                if let Some(child_idx) = loader::find_method(self.ctx, class, name) {
                    let child = self.analyze_at(child_idx, depth + 1);
                    deps.merge(child);
                }
            }
        }

        deps
    }
}

fn analyze_line(line: &str, deps: &mut MethodDependencies) {
    let mut parts = line.split_whitespace();
    let Some(opcode) = parts.next() else {
        return;
    };

    if opcode.starts_with("sget") || opcode.starts_with("sput") {
        if let Some(field) = parts.find(|t| t.contains("->")) {
            let field = field.trim_end_matches(',');
            let field = field.split(':').next().unwrap_or(field);
            deps.static_fields.insert(field.to_string());
            if let Some(class) = field.split("->").next() {
                deps.classes_needing_init.insert(class.to_string());
            }
        }
    } else if opcode.starts_with("invoke") {
        if let Some(method) = parts.find(|t| t.contains("->")) {
            let method = method.trim_end_matches(',');
            let method = method.split('(').next().unwrap_or(method);
            deps.methods_called.insert(method.to_string());
            if let Some(class) = method.split("->").next() {
                deps.classes_needing_init.insert(class.to_string());
            }
        }
    } else if opcode == "new-instance" {
        if let Some(class) = parts.find(|t| t.starts_with('L') && t.ends_with(';')) {
            deps.classes_needing_init.insert(class.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(usize, &str)]) -> TraceMap {
        let mut trace = TraceMap::new();
        let mut pcs: Vec<usize> = entries.iter().map(|(pc, _)| *pc).collect();
        pcs.push(usize::MAX);
        for (i, (pc, line)) in entries.iter().enumerate() {
            let len = pcs[i + 1].saturating_sub(*pc).min(6);
            trace.insert(*pc, line.to_string(), len);
        }
        trace
    }

    #[test]
    fn slice_is_a_subset_of_prior_pcs_and_closed() {
        let trace = map(&[
            (0, "const/16 v0, 5"),
            (4, "const/16 v1, 7"),
            (8, "const/16 v2, 9"),
            (12, "add-int v3, v0, v1"),
            (16, "invoke-static v3, LMath;->use(I)I"),
        ]);

        let deps = build_register_dependencies(&trace, 16, &[3]);

        // v2 is irrelevant, everything feeding v3 is included
        assert_eq!(deps, BTreeSet::from([0, 4, 12]));
        assert!(deps.iter().all(|&pc| pc < 16));
    }

    #[test]
    fn move_result_drags_in_the_producing_invoke() {
        let trace = map(&[
            (0, "const/4 v1, 3"),
            (2, "invoke-static v1, LA;->f(I)I"),
            (8, "move-result v0"),
            (10, "invoke-static v0, LB;->g(I)I"),
        ]);

        let deps = build_register_dependencies(&trace, 10, &[0]);
        assert_eq!(deps, BTreeSet::from([0, 2, 8]));
    }

    #[test]
    fn new_instance_pulls_the_constructor_forward() {
        let trace = map(&[
            (0, "new-instance v0, LThing;"),
            (4, "const/4 v1, 2"),
            (6, "invoke-direct v0, v1, LThing;-><init>(I)V"),
            (12, "invoke-static v0, LUse;->u(LThing;)V"),
        ]);

        let deps = build_register_dependencies(&trace, 12, &[0]);
        assert_eq!(deps, BTreeSet::from([0, 4, 6]));
    }

    #[test]
    fn new_array_pulls_fill_array_data_forward() {
        let trace = map(&[
            (0, "const/4 v1, 3"),
            (2, "new-array v0, v1, [B"),
            (6, "fill-array-data v0, 20"),
            (12, "invoke-static v0, LUse;->u([B)V"),
        ]);

        let deps = build_register_dependencies(&trace, 12, &[0]);
        assert_eq!(deps, BTreeSet::from([0, 2, 6]));
    }

    #[test]
    fn static_extraction_resolves_constants_only() {
        let trace = map(&[
            (0, "const/16 v0, 5"),
            (4, "const-string v1, \"abc\""),
            (8, "sget v2, LK;->field I"),
            (12, "invoke-static v0, v1, v2, LX;->f(I Ljava/lang/String; I)V"),
        ]);

        let args = extract_args_static(&trace, 12);
        assert_eq!(args.len(), 3);

        assert!(args[0].resolved);
        assert_eq!(args[0].value.as_ref().unwrap().as_int(), 5);

        assert!(!args[1].resolved);
        assert_eq!(args[1].source, ArgSource::ConstString);

        assert!(!args[2].resolved);
        assert_eq!(args[2].source, ArgSource::StaticField);
    }

    #[test]
    fn moves_are_chased_to_their_origin() {
        let trace = map(&[
            (0, "const/4 v3, -1"),
            (2, "move v0, v3"),
            (4, "invoke-static v0, LX;->f(I)V"),
        ]);

        let args = extract_args_static(&trace, 4);
        assert!(args[0].resolved);
        assert_eq!(args[0].value.as_ref().unwrap().as_int(), -1);
    }

    #[test]
    fn parameters_stay_unresolved() {
        let trace = map(&[(0, "invoke-static v5, LX;->f(I)V")]);
        let args = extract_args_static(&trace, 0);
        assert_eq!(args[0].source, ArgSource::Param);
        assert!(!args[0].resolved);
    }

    #[test]
    fn dependency_scan_collects_fields_methods_classes() {
        let mut deps = MethodDependencies::default();
        analyze_line("sget v0, LVault;->KEY I", &mut deps);
        analyze_line("invoke-static v0, LHelper;->mul(I I)I", &mut deps);
        analyze_line("new-instance v1, Ljava/lang/StringBuilder;", &mut deps);

        assert!(deps.static_fields.contains("LVault;->KEY"));
        assert!(deps.methods_called.contains("LHelper;->mul"));
        assert!(deps.classes_needing_init.contains("LVault;"));
        assert!(deps.classes_needing_init.contains("LHelper;"));
        assert!(
            deps.classes_needing_init
                .contains("Ljava/lang/StringBuilder;")
        );
    }
}
