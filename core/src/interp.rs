//! The interpreter frame and its execution loops.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::context::AnalysisContext;
use crate::dis::TraceMap;
use crate::ops;
use crate::value::{Registers, Value};

/// Cached executable form of one method: raw bytecode, declared register
/// count, and the lazily built trace map.
#[derive(Debug)]
pub struct MethodCode {
    /// Owning container, for table lookups during execution
    pub dex_index: usize,
    pub registers_size: u16,
    pub bytecode: Vec<u8>,
    pub trace: TraceMap,
}

impl MethodCode {
    /// Code over hand-assembled bytecode, for driving the interpreter
    /// without a parsed container.
    pub fn synthetic(registers_size: u16, bytecode: Vec<u8>, trace: TraceMap) -> MethodCode {
        MethodCode {
            dex_index: 0,
            registers_size,
            bytecode,
            trace,
        }
    }
}

/// One interpreter frame. Frames are short-lived values: nested calls
/// build a child frame, run it to completion (or step cap), and return.
pub struct Interp<'ctx> {
    pub ctx: &'ctx AnalysisContext,
    pub code: Rc<MethodCode>,
    pub regs: Registers,
    pub pc: usize,
    pub finished: bool,
    /// Result slot populated by invokes and consumed by `move-result`
    pub last_result: Value,
    /// Suppresses per-instruction output (slices, `<clinit>`)
    pub silent: bool,
    /// `LClass;->name`, for logs
    pub method: String,
    /// Dependency-slice PCs when executing under the slice executor;
    /// warnings for missing callees are scoped to these
    pub slice: Option<Rc<BTreeSet<usize>>>,
    /// Nesting depth of cross-method execution
    pub depth: usize,
}

impl<'ctx> Interp<'ctx> {
    pub fn new(ctx: &'ctx AnalysisContext, code: Rc<MethodCode>, method: String) -> Interp<'ctx> {
        let regs = Registers::new(code.registers_size as usize);
        Interp {
            ctx,
            code,
            regs,
            pc: 0,
            finished: false,
            last_result: Value::Null,
            silent: false,
            method,
            slice: None,
            depth: 0,
        }
    }

    /// Place arguments in the tail registers. The receiver of a
    /// non-static method is simply the first argument.
    pub fn set_args(&mut self, args: &[Value]) {
        let start = self.regs.len().saturating_sub(args.len());
        for (i, arg) in args.iter().enumerate() {
            self.regs.set(start + i, arg.clone());
        }
    }

    // Operand reads degrade to zero past the end of the bytecode: a
    // truncated instruction must not fault, and a register nibble read
    // across the end is register 0.

    #[inline]
    pub fn byte(&self, off: usize) -> u8 {
        self.code.bytecode.get(off).copied().unwrap_or(0)
    }

    #[inline]
    pub fn u16_at(&self, off: usize) -> u16 {
        self.byte(off) as u16 | (self.byte(off + 1) as u16) << 8
    }

    #[inline]
    pub fn u32_at(&self, off: usize) -> u32 {
        self.u16_at(off) as u32 | (self.u16_at(off + 2) as u32) << 16
    }

    #[inline]
    pub fn i8_at(&self, off: usize) -> i8 {
        self.byte(off) as i8
    }

    #[inline]
    pub fn i16_at(&self, off: usize) -> i16 {
        self.u16_at(off) as i16
    }

    #[inline]
    pub fn i32_at(&self, off: usize) -> i32 {
        self.u32_at(off) as i32
    }

    #[inline]
    pub fn i64_at(&self, off: usize) -> i64 {
        (self.u32_at(off) as u64 | (self.u32_at(off + 4) as u64) << 32) as i64
    }

    /// Trace line of the instruction at the current PC.
    pub fn line(&self) -> String {
        self.code
            .trace
            .line(self.pc)
            .unwrap_or_default()
            .to_string()
    }

    /// Budgeted warning tied to the current call site.
    pub fn warn(&self, msg: std::fmt::Arguments<'_>) {
        if self.ctx.consume_warning() {
            log::warn!("[{}@{}] {}", self.method, self.pc, msg);
        }
    }

    /// Run from the current PC until finished, end of bytecode, or the
    /// step cap. Reaching the cap halts as if the method returned void.
    pub fn run(&mut self, max_steps: u32) {
        let mut steps = 0u32;
        while self.pc < self.code.bytecode.len() && !self.finished {
            if steps >= max_steps {
                log::debug!("step cap reached in {}", self.method);
                break;
            }
            if !self.silent {
                if let Some(line) = self.code.trace.line(self.pc) {
                    log::trace!("{:>5}: {}", self.pc, line);
                }
            }
            ops::dispatch(self);
            steps += 1;
        }
    }

    /// Execute only the given PCs, in order, stopping before `stop_pc`.
    ///
    /// Instructions outside the slice are skipped entirely; this is what
    /// makes long caller bodies tractable. Handler-level faults degrade
    /// to warnings and execution proceeds at the next slice PC.
    pub fn run_slice(&mut self, pcs: &BTreeSet<usize>, stop_pc: usize) {
        self.slice = Some(Rc::new(pcs.clone()));
        for &pc in pcs {
            if pc >= stop_pc {
                break;
            }
            self.pc = pc;
            ops::dispatch(self);
            if self.finished {
                break;
            }
        }
    }
}
