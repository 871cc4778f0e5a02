//! The analysis context: everything one run needs, passed explicitly.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::path::Path;
use std::rc::Rc;

use ahash::AHashMap;
use regex::Regex;

use crate::config::EmulatorConfig;
use crate::errors::EmuError;
use crate::interp::MethodCode;
use crate::mocks::{HookTable, MockConfig};
use crate::program::Program;
use crate::store::StaticFieldStore;

/// Carries the parsed program, the static-field store, the mock
/// configuration, the execution policy, and the loader caches.
///
/// There are no global singletons: interpreters, the slicer, and the
/// class loader all borrow the context, which keeps nested executions
/// plain recursive calls and tests independent of each other.
pub struct AnalysisContext {
    pub program: Program,
    pub config: EmulatorConfig,
    pub mocks: MockConfig,
    pub hooks: HookTable,

    pub(crate) store: RefCell<StaticFieldStore>,

    /// method record index → cached (bytecode, registers, trace map)
    pub(crate) code_cache: RefCell<AHashMap<usize, Rc<MethodCode>>>,
    /// lookup key → method record index (misses cached too)
    pub(crate) lookup_cache: RefCell<AHashMap<String, Option<usize>>>,

    /// remaining warnings for the current call site
    pub(crate) warn_budget: Cell<u32>,

    /// extracts `LClass;->name(params)ret` tokens from trace lines
    pub(crate) method_token_re: Regex,
}

impl AnalysisContext {
    pub fn new(program: Program, config: EmulatorConfig, mocks: MockConfig) -> AnalysisContext {
        let warn_budget = Cell::new(config.max_warnings_per_site);
        AnalysisContext {
            program,
            config,
            mocks,
            hooks: HookTable::new(),
            store: RefCell::new(StaticFieldStore::new()),
            code_cache: RefCell::new(AHashMap::new()),
            lookup_cache: RefCell::new(AHashMap::new()),
            warn_budget,
            // params may contain spaces, so the token runs to the closing
            // paren and then to the next whitespace
            method_token_re: Regex::new(r"(L[^;]+;->[^\s(]+\([^)]*\)[^\s,]*)")
                .expect("method token pattern"),
        }
    }

    pub fn from_apk(path: &Path) -> Result<AnalysisContext, EmuError> {
        let program = Program::from_apk_path(path)?;
        Ok(AnalysisContext::new(
            program,
            EmulatorConfig::default(),
            MockConfig::default(),
        ))
    }

    pub fn store(&self) -> Ref<'_, StaticFieldStore> {
        self.store.borrow()
    }

    pub fn store_mut(&self) -> RefMut<'_, StaticFieldStore> {
        self.store.borrow_mut()
    }

    /// Clear static fields and the initialization-attempted set.
    pub fn reset_store(&self) {
        self.store.borrow_mut().reset();
    }

    /// Refill the per-site warning budget.
    pub(crate) fn reset_warn_budget(&self) {
        self.warn_budget.set(self.config.max_warnings_per_site);
    }

    /// Take one warning slot; false once the site's budget is spent.
    pub(crate) fn consume_warning(&self) -> bool {
        let left = self.warn_budget.get();
        if left == 0 {
            return false;
        }
        self.warn_budget.set(left - 1);
        if left == 1 {
            log::warn!("suppressing further warnings for this call site");
        }
        true
    }
}
