//! Build command implementations (build, check)

use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildPlan, Pipeline, TargetAction};
use crate::rules::RuleTable;

/// Run the build command
pub fn run_build(ctx: BuildContext, dry_run: bool) -> ExitCode {
    println!("Building {} ({})...", ctx.config().project.name, ctx.mode());

    let pipeline = match Pipeline::new(ctx) {
        Ok(pipeline) => pipeline.with_dry_run(dry_run),
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if dry_run {
        let ctx = pipeline.context();
        println!("Dry run - would build:");
        println!("  Source: {}", ctx.src_dir().display());
        println!("  Output: {}", ctx.out_dir().display());
        match pipeline.plan() {
            Ok(plan) => print_plan(&plan, pipeline.rules()),
            Err(e) => {
                eprintln!("  Error discovering targets: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
    }

    match pipeline.run() {
        Ok(report) => {
            println!("{}", report.summary());
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the check command: load the config and compile the rule table.
pub fn run_check(ctx: BuildContext) -> ExitCode {
    let pipeline = match Pipeline::new(ctx) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let ctx = pipeline.context();
    let flags = ctx.flags();
    println!("Project: {} ({})", ctx.config().project.name, ctx.mode());
    println!("  Source: {}", ctx.src_dir().display());
    println!("  Output: {}", ctx.out_dir().display());
    println!(
        "  Stages: minify={} source_maps={} hash_names={} clean={}",
        flags.minify, flags.source_maps, flags.hash_names, flags.clean
    );
    print_rules(pipeline.rules());

    if !ctx.src_dir().is_dir() {
        println!("Source directory not found, skipping discovery");
        return ExitCode::from(EXIT_SUCCESS);
    }

    match pipeline.plan() {
        Ok(plan) => {
            print_plan(&plan, pipeline.rules());
            println!("Config OK");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn print_rules(rules: &RuleTable) {
    println!("Rules ({}):", rules.len());
    for rule in rules.iter() {
        let chain = rule.unit_names();
        let chain = if chain.is_empty() { "copy".to_string() } else { chain.join(" -> ") };
        println!("  - {}: {} => {}", rule.name, chain, rule.output);
    }
}

fn print_plan(plan: &BuildPlan, rules: &RuleTable) {
    println!("  Targets: {}", plan.len());
    for target in plan.targets() {
        let handler = match target.action {
            TargetAction::Rule(index) => rules.get(index).map(|r| r.name.as_str()).unwrap_or("?"),
            TargetAction::Passthrough => "passthrough",
        };
        println!("    - {} [{}, {}]", target.id(), handler, target.wave);
    }
    for skipped in plan.skipped() {
        println!("    - {} [skipped]", skipped.display());
    }
}
