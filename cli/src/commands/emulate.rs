use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use dexemu::config::EmulatorConfig;
use dexemu::driver;
use dexemu::{AnalysisContext, MockConfig, Program};

pub(crate) struct EmulateOptions {
    pub apk: PathBuf,
    pub target: String,
    pub verbose: bool,
    pub limit: usize,
    pub json: bool,
    pub package_name: Option<String>,
}

pub(crate) fn command_emulate(opts: EmulateOptions) -> Result<()> {
    let program = Program::from_apk_path(&opts.apk)
        .with_context(|| format!("can't parse apk file: {:?}", opts.apk))?;

    let config = EmulatorConfig {
        site_limit: opts.limit,
        ..EmulatorConfig::default()
    };

    let mut mocks = MockConfig::default();
    if let Some(package_name) = opts.package_name {
        mocks.package_name = package_name;
    }

    let ctx = AnalysisContext::new(program, config, mocks);

    println!("[*] loading {} dex container(s)", ctx.program.dex_count());

    let report = driver::analyze(&ctx, &opts.target)?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.sites.is_empty() {
        println!("[!] no call sites found for {}", opts.target);
        return Ok(());
    }

    for (i, site) in report.sites.iter().enumerate() {
        println!(
            "{}",
            format!("[{}] {} @ PC={}", i + 1, site.caller, site.pc).bold()
        );
        println!("    args: ({})", site.args.join(", ").cyan());
        println!("    => {}", site.result.green());

        if opts.verbose {
            let fields = ctx.store();
            for (class, values) in fields.dump() {
                if !values.is_empty() {
                    log::info!("static state {class}: {} field(s)", values.len());
                }
            }
        }
        println!();
    }

    println!("{}", "SUMMARY".bold());
    for (i, site) in report.sites.iter().enumerate() {
        println!("  [{}] {}", i + 1, site.result.green());
    }
    println!(
        "\n[*] done, emulated {} call site(s) of {}",
        report.sites.len(),
        report.target
    );

    Ok(())
}
