use std::env;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use id_audit::{run, AuditOptions, AuditStatus};
use progress::{resolve_app_paths, DEFAULT_LAYOUT_FILE};

fn main() -> ExitCode {
    match run_cli() {
        Ok(AuditStatus::Clean) => ExitCode::SUCCESS,
        Ok(AuditStatus::ProblemsFound) => ExitCode::from(1),
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(2)
        }
    }
}

fn run_cli() -> Result<AuditStatus, String> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.first().is_some_and(|arg| arg == "-h" || arg == "--help") {
        print_usage();
        return Ok(AuditStatus::Clean);
    }

    let mut options = AuditOptions::default();
    for arg in &args {
        match arg.as_str() {
            "--suggest" => options.suggest_ids = true,
            flag if flag.starts_with("--") => {
                return Err(format!("unknown flag '{flag}'\n\n{}", usage_text()));
            }
            path => options.paths.push(PathBuf::from(path)),
        }
    }

    if options.paths.is_empty() {
        let paths = resolve_app_paths().map_err(|error| error.to_string())?;
        options.paths.push(paths.content_dir.join(DEFAULT_LAYOUT_FILE));
    }

    run(&options, &mut io::stdout())
}

fn print_usage() {
    println!("{}", usage_text());
}

fn usage_text() -> String {
    [
        "id_audit - check activatable identifiers in world layouts",
        "",
        "Usage:",
        "  id_audit [--suggest] [<layout.xml | dir>...]",
        "",
        "Without paths, audits assets/base/world.xml under the project root.",
        "Exit codes: 0 clean, 1 problems found, 2 error.",
    ]
    .join("\n")
}
