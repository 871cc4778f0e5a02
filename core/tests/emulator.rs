//! End-to-end scenarios over synthetically built dex containers.

mod common;

use common::*;

use dexemu::config::EmulatorConfig;
use dexemu::{driver, loader, AnalysisContext, MockConfig, Program};

fn context(builders: Vec<DexBuilder>) -> AnalysisContext {
    let buffers = builders.iter().map(DexBuilder::build).collect();
    let program = Program::from_containers(buffers).expect("synthetic container parses");
    AnalysisContext::new(program, EmulatorConfig::default(), MockConfig::default())
}

#[test]
fn scenario_arithmetic() {
    let mut b = DexBuilder::new();

    let m_add = b.method("LMath;", "add", "I", &["I", "I"]);
    b.direct_method(
        "LMath;",
        m_add,
        ACC_STATIC,
        3,
        asm(&[add_int(0, 1, 2), return_reg(0)]),
    );

    let m_run = b.method("LMain;", "run", "V", &[]);
    b.direct_method(
        "LMain;",
        m_run,
        ACC_STATIC,
        3,
        asm(&[
            const16(0, 5),
            const16(1, 7),
            invoke_static(&[0, 1], m_add),
            move_result(2),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LMath;->add").unwrap();

    assert_eq!(report.sites.len(), 1);
    let site = &report.sites[0];
    assert_eq!(site.caller, "LMain;->run");
    assert_eq!(site.args, vec!["5", "7"]);
    assert_eq!(site.result, "12");
}

#[test]
fn scenario_string_concatenation() {
    let mut b = DexBuilder::new();

    let sb_init = b.method("Ljava/lang/StringBuilder;", "<init>", "V", &[]);
    let sb_append = b.method(
        "Ljava/lang/StringBuilder;",
        "append",
        "Ljava/lang/StringBuilder;",
        &["Ljava/lang/String;"],
    );
    let sb_to_string = b.method("Ljava/lang/StringBuilder;", "toString", "Ljava/lang/String;", &[]);
    let sb_type = b.type_id("Ljava/lang/StringBuilder;");
    let s_ab = b.string("ab") as u16;
    let s_cd = b.string("cd") as u16;

    let m_build = b.method("LObf;", "build", "Ljava/lang/String;", &[]);
    b.direct_method(
        "LObf;",
        m_build,
        ACC_STATIC,
        2,
        asm(&[
            new_instance(0, sb_type),
            invoke_direct(&[0], sb_init),
            const_string(1, s_ab),
            invoke_virtual(&[0, 1], sb_append),
            move_result_object(0),
            const_string(1, s_cd),
            invoke_virtual(&[0, 1], sb_append),
            move_result_object(0),
            invoke_virtual(&[0], sb_to_string),
            move_result_object(0),
            return_object(0),
        ]),
    );

    let m_go = b.method("LMain2;", "go", "V", &[]);
    b.direct_method(
        "LMain2;",
        m_go,
        ACC_STATIC,
        1,
        asm(&[
            invoke_static(&[], m_build),
            move_result_object(0),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LObf;->build").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].result, "\"abcd\"");
}

#[test]
fn scenario_static_field_decrypt() {
    let mut b = DexBuilder::new();

    let f_data = b.field("LVault;", "F", "[B");
    b.static_field("LVault;", f_data);
    let byte_array = b.type_id("[B");

    // <clinit>: F = new byte[3] filled from a payload
    //   0: const/4 v1, 3
    //   2: new-array v0, v1, [B
    //   6: fill-array-data v0, +7   (payload at 20)
    //  12: sput-object v0, LVault;->F
    //  16: return-void
    //  18: nop (payload alignment)
    //  20: payload, 12 bytes
    let m_clinit = b.method("LVault;", "<clinit>", "V", &[]);
    let mut payload = vec![0x00, 0x03, 0x01, 0x00];
    payload.extend_from_slice(&3u32.to_le_bytes());
    payload.extend_from_slice(&[0x41, 0x42, 0x43, 0x00]);
    b.direct_method(
        "LVault;",
        m_clinit,
        ACC_STATIC | ACC_CONSTRUCTOR,
        2,
        asm(&[
            const4(1, 3),
            new_array(0, 1, byte_array),
            fill_array_data(0, 7),
            sput_object(0, f_data),
            return_void(),
            nop(),
            payload,
        ]),
    );

    // get(): copies F through an xor-with-zero into a fresh array
    //   0: sget-object v0, LVault;->F
    //   4: const/4 v3, 3
    //   6: new-array v1, v3, [B
    //  10: const/4 v2, 0
    //  12: aget-byte v3, v0, v2     <- loop head
    //  16: xor-int/lit8 v3, v3, 0
    //  20: aput-byte v3, v1, v2
    //  24: add-int/lit8 v2, v2, 1
    //  28: const/4 v3, 3
    //  30: if-lt v2, v3 -> 12      (22t, offset -9 units)
    //  34: return-object v1
    let m_get = b.method("LVault;", "get", "[B", &[]);
    let if_lt = {
        let off = (-9i16).to_le_bytes();
        vec![0x34, 0x32, off[0], off[1]]
    };
    b.direct_method(
        "LVault;",
        m_get,
        ACC_STATIC,
        4,
        asm(&[
            sget_object(0, f_data),
            const4(3, 3),
            new_array(1, 3, byte_array),
            const4(2, 0),
            aget_byte(3, 0, 2),
            xor_int_lit8(3, 3, 0),
            aput_byte(3, 1, 2),
            vec![0xd8, 0x02, 0x02, 0x01], // add-int/lit8 v2, v2, 1
            const4(3, 3),
            if_lt,
            return_object(1),
        ]),
    );

    let m_use = b.method("LMain3;", "use", "V", &[]);
    b.direct_method(
        "LMain3;",
        m_use,
        ACC_STATIC,
        1,
        asm(&[
            invoke_static(&[], m_get),
            move_result_object(0),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LVault;->get").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].result, "<[B[3]>");

    // the decoded bytes are the ascii codes of "ABC"
    ctx.reset_store();
    loader::run_clinit(&ctx, "LVault;");
    let target = loader::find_method(&ctx, "LVault;", "get").unwrap();
    let result = loader::execute(&ctx, target, &[], 0).unwrap();
    let arr = result.as_array().expect("byte array result");
    let bytes: Vec<i32> = arr.borrow().data.iter().map(|v| v.as_int()).collect();
    assert_eq!(bytes, vec![0x41, 0x42, 0x43]);
}

#[test]
fn scenario_cross_method_call() {
    let mut b = DexBuilder::new();

    let m_mul = b.method("LHelper;", "mul", "I", &["I", "I"]);
    b.direct_method(
        "LHelper;",
        m_mul,
        ACC_STATIC,
        3,
        asm(&[mul_int(0, 1, 2), return_reg(0)]),
    );

    let m_compute = b.method("LWork;", "compute", "I", &["I", "I"]);
    b.direct_method(
        "LWork;",
        m_compute,
        ACC_STATIC,
        3,
        asm(&[
            invoke_static(&[1, 2], m_mul),
            move_result(0),
            return_reg(0),
        ]),
    );

    let m_run = b.method("LMain4;", "run", "V", &[]);
    b.direct_method(
        "LMain4;",
        m_run,
        ACC_STATIC,
        3,
        asm(&[
            const4(0, 3),
            const4(1, 4),
            invoke_static(&[0, 1], m_compute),
            move_result(2),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LWork;->compute").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].args, vec!["3", "4"]);
    assert_eq!(report.sites[0].result, "12");
}

#[test]
fn scenario_packed_switch_dispatch() {
    let mut b = DexBuilder::new();

    // pick(I)I:
    //   0: packed-switch v1, +14   (payload at 28)
    //   6: const/4 v0, 0
    //   8: return v0
    //  10: const/16 v0, 10 ; 14: return v0
    //  16: const/16 v0, 20 ; 20: return v0
    //  22: const/16 v0, 30 ; 26: return v0
    //  28: payload
    let m_pick = b.method("LSw;", "pick", "I", &["I"]);
    let mut payload = vec![0x00, 0x01, 0x03, 0x00];
    payload.extend_from_slice(&1i32.to_le_bytes());
    payload.extend_from_slice(&5i32.to_le_bytes());
    payload.extend_from_slice(&8i32.to_le_bytes());
    payload.extend_from_slice(&11i32.to_le_bytes());
    b.direct_method(
        "LSw;",
        m_pick,
        ACC_STATIC,
        2,
        asm(&[
            packed_switch(1, 14),
            const4(0, 0),
            return_reg(0),
            const16(0, 10),
            return_reg(0),
            const16(0, 20),
            return_reg(0),
            const16(0, 30),
            return_reg(0),
            payload,
        ]),
    );

    let m_run = b.method("LMain5;", "run", "V", &[]);
    b.direct_method(
        "LMain5;",
        m_run,
        ACC_STATIC,
        2,
        asm(&[
            const4(0, 2),
            invoke_static(&[0], m_pick),
            move_result(1),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LSw;->pick").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].args, vec!["2"]);
    assert_eq!(report.sites[0].result, "20");
}

#[test]
fn scenario_framework_hook() {
    let mut b = DexBuilder::new();

    let m_get_name = b.method(
        "Landroid/content/Context;",
        "getPackageName",
        "Ljava/lang/String;",
        &[],
    );

    let m_name = b.method(
        "LCfg;",
        "name",
        "Ljava/lang/String;",
        &["Landroid/content/Context;"],
    );
    b.direct_method(
        "LCfg;",
        m_name,
        ACC_STATIC,
        2,
        asm(&[
            invoke_virtual(&[1], m_get_name),
            move_result_object(0),
            return_object(0),
        ]),
    );

    let m_run = b.method("LMain6;", "run", "V", &["Landroid/content/Context;"]);
    b.direct_method(
        "LMain6;",
        m_run,
        ACC_STATIC,
        2,
        asm(&[
            invoke_static(&[1], m_name),
            move_result_object(0),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LCfg;->name").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(
        report.sites[0].result,
        format!("\"{}\"", ctx.mocks.package_name)
    );
}

#[test]
fn static_seeding_from_class_definition() {
    let mut b = DexBuilder::new();

    let f_key = b.field("LConst;", "K", "I");
    b.static_field("LConst;", f_key);
    // encoded array: one int (type 0x04, arg 0), value 7
    b.static_values_raw("LConst;", vec![0x01, 0x04, 0x07]);

    let m_k = b.method("LConst;", "k", "I", &[]);
    b.direct_method(
        "LConst;",
        m_k,
        ACC_STATIC,
        1,
        asm(&[sget(0, f_key), return_reg(0)]),
    );

    let m_run = b.method("LMain7;", "run", "V", &[]);
    b.direct_method(
        "LMain7;",
        m_run,
        ACC_STATIC,
        1,
        asm(&[invoke_static(&[], m_k), move_result(0), return_void()]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LConst;->k").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].result, "7");
}

#[test]
fn cross_container_calls_resolve_textually() {
    // container 1 calls into container 2; the raw method index is local
    // to container 1, so resolution has to go through the trace text
    let mut b2 = DexBuilder::new();
    let m_val_def = b2.method("LB;", "val", "I", &[]);
    b2.direct_method(
        "LB;",
        m_val_def,
        ACC_STATIC,
        1,
        asm(&[const16(0, 42), return_reg(0)]),
    );

    let mut b1 = DexBuilder::new();
    let m_val_ref = b1.method("LB;", "val", "I", &[]);
    let m_wrap = b1.method("LA;", "wrap", "I", &[]);
    b1.direct_method(
        "LA;",
        m_wrap,
        ACC_STATIC,
        1,
        asm(&[
            invoke_static(&[], m_val_ref),
            move_result(0),
            return_reg(0),
        ]),
    );
    let m_calls = b1.method("LA;", "calls", "V", &[]);
    b1.direct_method(
        "LA;",
        m_calls,
        ACC_STATIC,
        1,
        asm(&[
            invoke_static(&[], m_wrap),
            move_result(0),
            return_void(),
        ]),
    );

    let ctx = context(vec![b1, b2]);
    let report = driver::analyze(&ctx, "LA;->wrap").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].caller, "LA;->calls");
    assert_eq!(report.sites[0].result, "42");
}

#[test]
fn global_method_index_round_trips() {
    let mut b1 = DexBuilder::new();
    let m1 = b1.method("LA;", "a", "V", &[]);
    b1.direct_method("LA;", m1, ACC_STATIC, 1, asm(&[return_void()]));
    b1.method("LA;", "other", "I", &["I"]);

    let mut b2 = DexBuilder::new();
    let m2 = b2.method("LB;", "b", "V", &[]);
    b2.direct_method("LB;", m2, ACC_STATIC, 1, asm(&[return_void()]));

    let ctx = context(vec![b1, b2]);
    let program = &ctx.program;

    for global in 0..program.global_method_count() {
        let (dex_index, local) = program.resolve_global(global).unwrap();
        assert_eq!(program.global_index(dex_index, local), Some(global));
    }
    assert!(program.resolve_global(program.global_method_count()).is_none());

    // every method yielded by the full-program iterator round-trips too
    for (_, record) in program.iter_code_methods() {
        let global = program
            .global_index(record.dex_index, record.local_index as usize)
            .unwrap();
        let (dex_index, local) = program.resolve_global(global).unwrap();
        assert_eq!(dex_index, record.dex_index);
        assert_eq!(local, record.local_index as usize);
    }
}

#[test]
fn argument_resolved_by_slice_execution() {
    let mut b = DexBuilder::new();

    let m_seed = b.method("LKeys;", "seed", "I", &[]);
    b.direct_method(
        "LKeys;",
        m_seed,
        ACC_STATIC,
        1,
        asm(&[const16(0, 99), return_reg(0)]),
    );

    let m_crunch = b.method("LUse;", "crunch", "I", &["I"]);
    b.direct_method("LUse;", m_crunch, ACC_STATIC, 2, asm(&[return_reg(1)]));

    // the argument is the result of another call, so static analysis
    // cannot fold it and the slice executor has to run
    let m_run = b.method("LMain8;", "run", "V", &[]);
    b.direct_method(
        "LMain8;",
        m_run,
        ACC_STATIC,
        2,
        asm(&[
            invoke_static(&[], m_seed),
            move_result(0),
            invoke_static(&[0], m_crunch),
            move_result(1),
            return_void(),
        ]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LUse;->crunch").unwrap();

    assert_eq!(report.sites.len(), 1);
    assert_eq!(report.sites[0].args, vec!["99"]);
    assert_eq!(report.sites[0].result, "99");
}

#[test]
fn zero_call_sites_is_not_an_error() {
    let mut b = DexBuilder::new();
    let m_alone = b.method("LAlone;", "quiet", "I", &[]);
    b.direct_method(
        "LAlone;",
        m_alone,
        ACC_STATIC,
        1,
        asm(&[const4(0, 1), return_reg(0)]),
    );

    let ctx = context(vec![b]);
    let report = driver::analyze(&ctx, "LAlone;->quiet").unwrap();
    assert!(report.sites.is_empty());
}

#[test]
fn missing_target_is_reported() {
    let mut b = DexBuilder::new();
    let m = b.method("LA;", "a", "V", &[]);
    b.direct_method("LA;", m, ACC_STATIC, 1, asm(&[return_void()]));

    let ctx = context(vec![b]);
    assert!(driver::analyze(&ctx, "LNo;->where").is_err());
    assert!(driver::analyze(&ctx, "garbage").is_err());
}
