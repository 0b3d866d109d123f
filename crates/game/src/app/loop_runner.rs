use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use progress::{ActivationState, GameSession, LoadOutcome, SaveOutcome};
use tracing::{error, info};

use super::bootstrap::AppWiring;
use super::console::{CommandRegistry, ConsoleCommand};

pub(crate) const TICKS_PER_SECOND: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Quit,
    EndOfInput,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let mut session = match GameSession::start(app.session) {
        Ok(session) => session,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };
    let registry = CommandRegistry::with_builtins();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let exit = drive(&mut session, &registry, stdin.lock(), stdout.lock());

    let code = match exit {
        Ok(reason) => {
            info!(?reason, "console_closed");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "console_io_failed");
            ExitCode::FAILURE
        }
    };
    if let Err(err) = session.shutdown() {
        error!(error = %err, "shutdown_save_failed");
        return ExitCode::FAILURE;
    }
    code
}

/// Reads commands line by line until `quit` or end of input.
pub(crate) fn drive<R: BufRead, W: Write>(
    session: &mut GameSession,
    registry: &CommandRegistry,
    input: R,
    mut output: W,
) -> io::Result<LoopExit> {
    for line in input.lines() {
        match registry.parse_line(&line?) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => return Ok(LoopExit::Quit),
            Ok(Some(command)) => execute(session, registry, command, &mut output)?,
            Err(message) => writeln!(output, "error: {message}")?,
        }
        output.flush()?;
    }
    Ok(LoopExit::EndOfInput)
}

fn execute<W: Write>(
    session: &mut GameSession,
    registry: &CommandRegistry,
    command: ConsoleCommand,
    output: &mut W,
) -> io::Result<()> {
    match command {
        ConsoleCommand::Help => {
            for line in registry.help_lines() {
                writeln!(output, "{line}")?;
            }
        }
        ConsoleCommand::Visit { zone_id } => {
            let count = session.record_visit(&zone_id);
            writeln!(output, "{zone_id}: {count} visit(s)")?;
        }
        ConsoleCommand::Discover { identifier } => match session.discover(&identifier) {
            Ok(true) => writeln!(output, "discovered {identifier} (new)")?,
            Ok(false) => writeln!(output, "discovered {identifier}")?,
            Err(err) => writeln!(output, "error: {err}")?,
        },
        ConsoleCommand::Tick { seconds } => {
            let ticks = ticks_for(seconds);
            let dt = 1.0 / TICKS_PER_SECOND as f32;
            for _ in 0..ticks {
                session.tick(dt);
            }
            writeln!(output, "advanced {ticks} tick(s)")?;
        }
        ConsoleCommand::Save => match session.save() {
            Ok(SaveOutcome::Written { path, .. }) => {
                writeln!(output, "saved to {}", path.display())?
            }
            Ok(SaveOutcome::Skipped(reason)) => writeln!(output, "save skipped: {reason:?}")?,
            Err(err) => writeln!(output, "error: {err}")?,
        },
        ConsoleCommand::Load => match session.load() {
            LoadOutcome::NoSaveFile => writeln!(output, "no save file")?,
            LoadOutcome::Loaded(report) => writeln!(
                output,
                "loaded {} zone(s), {} discovery(ies), {} activated id(s)",
                report.zone_count, report.discovered_count, report.activated_ids
            )?,
            LoadOutcome::Failed(err) => writeln!(output, "error: {err}")?,
            LoadOutcome::Skipped(reason) => writeln!(output, "load skipped: {reason:?}")?,
        },
        ConsoleCommand::Delete => match session.delete_save() {
            Ok(true) => writeln!(output, "save deleted")?,
            Ok(false) => writeln!(output, "no save file")?,
            Err(err) => writeln!(output, "error: {err}")?,
        },
        ConsoleCommand::NewGame => match session.start_new_game() {
            Ok(()) => writeln!(output, "new game started")?,
            Err(err) => writeln!(output, "new game started; {err}")?,
        },
        ConsoleCommand::Activate { id } => {
            let started = session.activate(&id);
            writeln!(output, "activate {id}: {started} entity(ies) started")?;
        }
        ConsoleCommand::Deactivate { id } => match session.deactivate(&id) {
            Ok(touched) => writeln!(output, "deactivate {id}: {touched} entity(ies)")?,
            Err(err) => writeln!(output, "error: {err}")?,
        },
        ConsoleCommand::Status => write_status(session, output)?,
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn ticks_for(seconds: Option<f32>) -> u32 {
    match seconds {
        None => 1,
        Some(seconds) => ((seconds * TICKS_PER_SECOND as f32).ceil() as u32).max(1),
    }
}

fn write_status<W: Write>(session: &GameSession, output: &mut W) -> io::Result<()> {
    let mut visits = session.ledger().all_visit_data().into_iter().collect::<Vec<_>>();
    visits.sort();
    writeln!(output, "zones visited: {}", visits.len())?;
    for (zone_id, count) in visits {
        writeln!(output, "  {zone_id}: {count}")?;
    }

    let discovered = session.discovery().all();
    writeln!(output, "discovered: {}", discovered.len())?;
    for identifier in discovered {
        writeln!(output, "  {identifier}")?;
    }

    let statuses = session.world().statuses();
    writeln!(output, "entities: {}", statuses.len())?;
    for status in statuses {
        let zone = status.target_zone.as_deref().unwrap_or("-");
        let state = match status.state {
            ActivationState::Dormant => "dormant",
            ActivationState::Animating => "animating",
            ActivationState::Active => "active",
        };
        writeln!(
            output,
            "  #{} {} '{}' zone={} needs={} {} opacity={:.2} scale={:.2}",
            status.entity.0,
            status.id,
            status.label,
            zone,
            status.required_visits,
            state,
            status.visual.opacity,
            status.visual.scale
        )?;
    }
    Ok(())
}
