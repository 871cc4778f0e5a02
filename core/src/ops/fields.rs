//! Instance and static field access (0x52-0x6d).

use crate::interp::Interp;
use crate::mocks::dispatch::framework_static_field;
use crate::value::Value;

/// Resolve a field reference to `(class descriptor, field name)`.
fn field_ref(it: &Interp<'_>, field_idx: usize) -> Option<(String, String)> {
    let dex = it.ctx.program.dexes.get(it.code.dex_index)?;
    let item = dex.field_ids.get(field_idx)?;
    let class = item.get_class(dex)?.into_owned();
    let name = item.get_name(dex)?.into_owned();
    Some((class, name))
}

/// Synthesized reads of framework package metadata, keyed by field name.
fn framework_instance_field(it: &Interp<'_>, class: &str, field: &str) -> Option<Value> {
    let mocks = &it.ctx.mocks;

    if class.contains("PackageInfo") {
        return match field {
            "packageName" => Some(Value::string(mocks.package_name.clone())),
            "versionCode" => Some(Value::Int(mocks.version_code)),
            "versionName" => Some(Value::string(mocks.version_name.clone())),
            "signatures" => {
                let info = crate::mocks::factories::create_mock_package_info(mocks, None);
                let signatures = info.borrow().fields.get("signatures").cloned();
                signatures
            }
            _ => None,
        };
    }

    if class.contains("ApplicationInfo") {
        return match field {
            "packageName" => Some(Value::string(mocks.package_name.clone())),
            "flags" | "targetSdkVersion" | "minSdkVersion" => Some(Value::Int(mocks.sdk_int)),
            "sourceDir" => Some(Value::string(format!("/data/app/{}", mocks.package_name))),
            _ => None,
        };
    }

    None
}

/// iget family vA, vB, field@CCCC (22c)
pub(crate) fn iget(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    let obj_reg = (b >> 4) as usize;
    let field_idx = it.u16_at(it.pc + 2) as usize;

    let mut val = Value::Int(0);

    if let Some((class, field)) = field_ref(it, field_idx) {
        // framework metadata reads come from the mock layer even when the
        // receiver itself never materialized
        if let Some(mock_val) = framework_instance_field(it, &class, &field) {
            val = mock_val;
        } else if let Some(obj) = it.regs.get(obj_reg).as_object() {
            if let Some(stored) = obj.borrow().fields.get(&field) {
                val = stored.clone();
            }
        }
    }

    it.regs.set(dst, val);
    it.pc += 4;
}

/// iget-wide vA, vB, field@CCCC (22c)
pub(crate) fn iget_wide(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let dst = (b & 0xF) as usize;
    iget(it);
    it.regs.set(dst + 1, Value::WideHigh);
}

/// iput family vA, vB, field@CCCC (22c)
pub(crate) fn iput(it: &mut Interp<'_>) {
    let b = it.byte(it.pc + 1);
    let src = (b & 0xF) as usize;
    let obj_reg = (b >> 4) as usize;
    let field_idx = it.u16_at(it.pc + 2) as usize;

    if let Some((_, field)) = field_ref(it, field_idx) {
        if let Some(obj) = it.regs.get(obj_reg).as_object() {
            let val = it.regs.get(src);
            obj.borrow_mut().fields.insert(field, val);
        }
    }

    it.pc += 4;
}

/// sget family vAA, field@BBBB (21c)
pub(crate) fn sget(it: &mut Interp<'_>) {
    let dst = it.byte(it.pc + 1) as usize;
    let field_idx = it.u16_at(it.pc + 2) as usize;

    let mut val = Value::Int(0);

    if let Some((class, field)) = field_ref(it, field_idx) {
        // framework constants (SDK_INT and friends) win over the store
        let sig = format!("{class}->{field}");
        if let Some(mock_val) = framework_static_field(&it.ctx.mocks, &sig) {
            val = mock_val;
        } else {
            val = it.ctx.store().get(&class, &field, Value::Int(0));
        }
    }

    it.regs.set(dst, val);
    it.pc += 4;
}

/// sget-wide vAA, field@BBBB (21c)
pub(crate) fn sget_wide(it: &mut Interp<'_>) {
    let dst = it.byte(it.pc + 1) as usize;
    sget(it);
    it.regs.set(dst + 1, Value::WideHigh);
}

/// sput family vAA, field@BBBB (21c)
pub(crate) fn sput(it: &mut Interp<'_>) {
    let src = it.byte(it.pc + 1) as usize;
    let field_idx = it.u16_at(it.pc + 2) as usize;

    if let Some((class, field)) = field_ref(it, field_idx) {
        let val = it.regs.get(src);
        it.ctx.store_mut().set(&class, &field, val);
    }

    it.pc += 4;
}
