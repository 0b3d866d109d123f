use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;

use progress::{audit, generate_unique_id, load_layout_dir, load_layout_file, ActivatableDef};

#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Layout files or directories of `.xml` files.
    pub paths: Vec<PathBuf>,
    pub suggest_ids: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Clean,
    ProblemsFound,
}

pub fn load_defs(paths: &[PathBuf]) -> Result<Vec<ActivatableDef>, String> {
    let mut defs = Vec::new();
    for path in paths {
        let loaded = if path.is_dir() {
            load_layout_dir(path)
        } else {
            load_layout_file(path)
        };
        defs.extend(loaded.map_err(|error| error.to_string())?);
    }
    Ok(defs)
}

pub fn run<W: Write>(opts: &AuditOptions, stdout: &mut W) -> Result<AuditStatus, String> {
    if opts.paths.is_empty() {
        return Err("no layout paths given".to_string());
    }
    let defs = load_defs(&opts.paths)?;
    let report = audit(&defs);
    writeln!(stdout, "{}", report.render_human_readable()).map_err(write_error)?;

    if report.is_clean() {
        return Ok(AuditStatus::Clean);
    }
    if opts.suggest_ids {
        let mut existing = defs
            .iter()
            .map(|def| def.config.id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect::<HashSet<_>>();
        writeln!(stdout, "suggested ids:").map_err(write_error)?;

        let needs_id = report.missing_ids.iter().chain(
            report
                .duplicate_ids
                .values()
                .flat_map(|refs| refs.iter().skip(1)),
        );
        for def in needs_id {
            let id = generate_unique_id(&def.label, &existing);
            writeln!(stdout, "  {def} -> {id}").map_err(write_error)?;
            existing.insert(id);
        }
    }
    Ok(AuditStatus::ProblemsFound)
}

fn write_error(error: std::io::Error) -> String {
    format!("failed to write report: {error}")
}
