use std::path::Path;

use anyhow::{Context, Result};

use dexemu::Program;

pub(crate) fn command_methods(apk: &Path) -> Result<()> {
    let program = Program::from_apk_path(apk)
        .with_context(|| format!("can't parse apk file: {apk:?}"))?;

    let mut count = 0usize;
    for (_, record) in program.iter_code_methods() {
        println!("{}->{}{}", record.class, record.name, record.descriptor);
        count += 1;
    }

    println!("\n[*] {count} method(s) with bytecode across {} container(s)", program.dex_count());

    Ok(())
}
