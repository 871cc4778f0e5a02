//! Lazy method resolution and cross-method execution.
//!
//! Methods are resolved by name, by signature, or preferably from the
//! trace line: in multi-container archives a raw method index is local
//! to the calling container, while the rendered token carries the full
//! Unicode signature and is unambiguous.

use std::rc::Rc;

use dexemu_dex::EncodedValue;

use crate::context::AnalysisContext;
use crate::dis;
use crate::interp::{Interp, MethodCode};
use crate::value::{DvArray, Value};

/// Classes with no bytecode in the archive; their static fields cannot be
/// seeded from class definitions.
const EXTERNAL_PREFIXES: &[&str] = &[
    "Ljava/",
    "Ljavax/",
    "Landroid/",
    "Ldalvik/",
    "Lsun/",
    "Lorg/apache/",
    "Lorg/xml/",
    "Lorg/w3c/",
    "Lorg/json/",
    "Ljunit/",
];

/// Library methods covered by hooks; a missing-bytecode fall-through on
/// these is expected and logged quietly.
const MOCKED_METHODS: &[&str] = &[
    "Ljava/lang/String;->length",
    "Ljava/lang/String;->charAt",
    "Ljava/lang/String;->toCharArray",
    "Ljava/lang/String;->getBytes",
    "Ljava/lang/String;->intern",
    "Ljava/lang/String;-><init>",
    "Ljava/lang/StringBuilder;-><init>",
    "Ljava/lang/StringBuilder;->append",
    "Ljava/lang/StringBuilder;->toString",
    "Ljava/io/PrintStream;->println",
    "Ljava/util/List;->",
    "Ljava/util/ArrayList;->",
    "Ljava/util/Iterator;->",
];

pub fn is_external_class(class: &str) -> bool {
    EXTERNAL_PREFIXES.iter().any(|p| class.starts_with(p))
}

/// Find a defined method by class and name. Results (including misses)
/// are cached.
pub fn find_method(ctx: &AnalysisContext, class: &str, name: &str) -> Option<usize> {
    find_method_with_signature(ctx, class, name, None)
}

/// Signature-aware lookup for overload disambiguation. The signature is
/// compared after whitespace normalization.
pub fn find_method_with_signature(
    ctx: &AnalysisContext,
    class: &str,
    name: &str,
    signature: Option<&str>,
) -> Option<usize> {
    let key = match signature {
        Some(sig) => format!("{class}->{name}{sig}"),
        None => format!("{class}->{name}"),
    };

    if let Some(cached) = ctx.lookup_cache.borrow().get(&key) {
        return *cached;
    }

    let normalized = signature.map(|sig| sig.replace(' ', ""));
    let found = ctx
        .program
        .methods
        .iter()
        .position(|record| {
            if record.class != class || record.name != name {
                return false;
            }
            match &normalized {
                Some(sig) => record.descriptor.replace(' ', "") == *sig,
                None => true,
            }
        });

    ctx.lookup_cache.borrow_mut().insert(key, found);
    found
}

/// Resolve the first `LClass;->name(params)ret` token of a trace line.
pub fn find_method_by_trace(ctx: &AnalysisContext, trace: &str) -> Option<usize> {
    if !trace.contains("->") {
        return None;
    }

    let token = ctx
        .method_token_re
        .captures(trace)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())?;

    let (class, rest) = token.split_once("->")?;
    let name = rest.split('(').next()?;
    let signature = rest.find('(').map(|at| &rest[at..]);

    find_method_with_signature(ctx, class, name, signature)
}

/// Bytecode, register count, and trace map for a defined method, cached
/// on first use.
pub fn method_code(ctx: &AnalysisContext, record_idx: usize) -> Option<Rc<MethodCode>> {
    if let Some(cached) = ctx.code_cache.borrow().get(&record_idx) {
        return Some(Rc::clone(cached));
    }

    let record = ctx.program.methods.get(record_idx)?;
    if record.code_off == 0 {
        return None;
    }

    let dex = ctx.program.dexes.get(record.dex_index)?;
    let (registers_size, insns) = dex.code_item(record.code_off)?;
    let bytecode = insns.to_vec();
    let trace = dis::build_trace_map(Some(dex), &bytecode);

    let code = Rc::new(MethodCode {
        dex_index: record.dex_index,
        registers_size,
        bytecode,
        trace,
    });
    ctx.code_cache
        .borrow_mut()
        .insert(record_idx, Rc::clone(&code));
    Some(code)
}

fn encoded_to_value(ctx: &AnalysisContext, dex_index: usize, value: &EncodedValue) -> Value {
    match value {
        EncodedValue::Byte(v) => Value::Int(*v as i32),
        EncodedValue::Short(v) => Value::Int(*v as i32),
        EncodedValue::Char(v) => Value::Int(*v as i32),
        EncodedValue::Int(v) => Value::Int(*v),
        EncodedValue::Long(v) => Value::Long(*v),
        EncodedValue::Float(v) => Value::Float(*v),
        EncodedValue::Double(v) => Value::Double(*v),
        EncodedValue::Boolean(v) => Value::Int(*v as i32),
        EncodedValue::Null => Value::Null,
        EncodedValue::String(idx) => {
            let text = ctx
                .program
                .dexes
                .get(dex_index)
                .and_then(|dex| dex.get_string(*idx as usize))
                .map(|s| s.into_owned())
                .unwrap_or_default();
            Value::string(text)
        }
        EncodedValue::Type(_) => Value::Null,
        EncodedValue::Array(values) => {
            let data = values
                .iter()
                .map(|v| encoded_to_value(ctx, dex_index, v))
                .collect();
            Value::array(DvArray::from_values("[?", data))
        }
    }
}

/// Seed static fields from the constants declared in the class definition.
fn seed_static_values(ctx: &AnalysisContext, class: &str) {
    if is_external_class(class) {
        return;
    }

    let Some((dex_index, class_def)) = ctx.program.find_class_def(class) else {
        return;
    };
    let Some(dex) = ctx.program.dexes.get(dex_index) else {
        return;
    };
    let Some(class_data) = dex.class_data(class_def.class_data_off) else {
        return;
    };

    let values = dex.static_values(class_def.static_values_off);
    for (field, value) in class_data.static_fields.iter().zip(values.iter()) {
        let Some(item) = dex.field_ids.get(field.field_idx as usize) else {
            continue;
        };
        let Some(name) = item.get_name(dex) else {
            continue;
        };

        let val = encoded_to_value(ctx, dex_index, value);
        log::debug!("seeding {class}->{name} from class definition");
        ctx.store_mut().set(class, &name, val);
    }
}

/// Run `<clinit>` for a class unless it was already attempted this run.
///
/// The class is marked attempted before its initializer executes, which
/// is what keeps nested initialization from recursing forever.
pub fn run_clinit(ctx: &AnalysisContext, class: &str) {
    if ctx.store().is_initialized(class) {
        return;
    }

    seed_static_values(ctx, class);
    ctx.store_mut().mark_initialized(class);

    let Some(record_idx) = find_method(ctx, class, "<clinit>") else {
        return;
    };
    let Some(code) = method_code(ctx, record_idx) else {
        return;
    };

    let mut init = Interp::new(ctx, code, format!("{class}-><clinit>"));
    init.silent = true;
    init.run(ctx.config.clinit_step_cap);
}

/// Execute a defined method in a child interpreter: arguments go to the
/// tail registers (receiver first for non-static methods), execution is
/// silent and bounded by the method step cap.
///
/// Returns `None` when the method has no bytecode.
pub fn execute(
    ctx: &AnalysisContext,
    record_idx: usize,
    args: &[Value],
    depth: usize,
) -> Option<Value> {
    let record = ctx.program.methods.get(record_idx)?;

    if depth >= ctx.config.max_call_depth {
        log::debug!("call depth cap reached at {}", record.signature());
        return Some(Value::Null);
    }

    let code = method_code(ctx, record_idx)?;
    let class = record.class.clone();
    let signature = record.signature();

    if !ctx.store().is_initialized(&class) {
        run_clinit(ctx, &class);
    }

    log::debug!("[call] {signature}");

    let mut child = Interp::new(ctx, code, signature);
    child.silent = true;
    child.depth = depth + 1;
    child.set_args(args);
    child.run(ctx.config.method_step_cap);

    Some(child.last_result)
}

/// Resolve an invoke target and execute it. Textual resolution is
/// preferred; the raw index is the fallback. Never fails: a missing
/// method yields null, with a warning only when the call sits on the
/// active dependency slice.
pub fn resolve_and_execute(
    ctx: &AnalysisContext,
    dex_index: usize,
    method_idx: u32,
    args: &[Value],
    trace: &str,
    on_slice: bool,
    depth: usize,
) -> Value {
    let record_idx = find_method_by_trace(ctx, trace).or_else(|| {
        let text = ctx.program.method_ref_text(dex_index, method_idx as usize)?;
        let (class, rest) = text.split_once("->")?;
        let name = rest.split('(').next()?;
        find_method(ctx, class, name)
    });

    let Some(record_idx) = record_idx else {
        if on_slice {
            report_unresolved(ctx, dex_index, method_idx, trace);
        }
        return Value::Null;
    };

    match execute(ctx, record_idx, args, depth) {
        Some(result) => result,
        None => {
            if on_slice {
                if let Some(record) = ctx.program.methods.get(record_idx) {
                    log::warn!("no bytecode for {}", record.signature());
                }
            }
            Value::Null
        }
    }
}

fn report_unresolved(ctx: &AnalysisContext, dex_index: usize, method_idx: u32, trace: &str) {
    let sig = ctx
        .program
        .method_ref_text(dex_index, method_idx as usize)
        .unwrap_or_else(|| trace.to_string());

    if MOCKED_METHODS.iter().any(|m| sig.contains(m)) {
        log::debug!("[mocked] {sig}");
    } else if is_external_class(&sig) {
        log::debug!("framework call without mock: {sig}");
    } else {
        log::warn!("no mock for {sig}");
    }
}
