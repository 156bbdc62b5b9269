//! Human-readable output.

use std::io::{self, Write};

use gantry_engine::PlanSnapshot;

/// One line: state, progress and residuals.
pub fn summary(out: &mut impl Write, snapshot: &PlanSnapshot) -> io::Result<()> {
    write!(
        out,
        "{} {}: {} ({}%, {}/{} completed)",
        snapshot.kind,
        snapshot.operation_id,
        snapshot.state,
        snapshot.progress_percent(),
        snapshot.counts.completed,
        snapshot.counts.total(),
    )?;
    if let Some(report) = &snapshot.rollback {
        write!(
            out,
            ", rollback left {} failed and {} blocked",
            report.failed.len(),
            report.blocked.len()
        )?;
        if report.interrupted {
            write!(out, ", interrupted")?;
        }
    }
    writeln!(out)
}

/// Header plus one row per phase.
pub fn status(out: &mut impl Write, snapshot: &PlanSnapshot) -> io::Result<()> {
    writeln!(out, "operation  {}", snapshot.operation_id)?;
    writeln!(out, "kind       {}", snapshot.kind)?;
    writeln!(out, "state      {} ({}%)", snapshot.state, snapshot.progress_percent())?;
    writeln!(out, "updated    {}", snapshot.updated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    if snapshot.archived {
        writeln!(out, "archived   yes")?;
    }
    if let Some(message) = &snapshot.latest_message {
        writeln!(out, "latest     {message}")?;
    }
    if let Some(report) = &snapshot.rollback {
        for id in &report.failed {
            writeln!(out, "residual   {id} (rollback failed)")?;
        }
        for id in &report.blocked {
            writeln!(out, "residual   {id} (blocked)")?;
        }
    }

    let width = snapshot
        .phases
        .iter()
        .map(|p| p.id.as_str().len())
        .max()
        .unwrap_or(0)
        .max("PHASE".len());
    writeln!(out)?;
    writeln!(out, "{:<width$}  {:<12} {:>8}  ERROR", "PHASE", "STATE", "ATTEMPTS")?;
    for phase in &snapshot.phases {
        let error = phase
            .rollback_error
            .as_deref()
            .or(phase.last_error.as_deref())
            .unwrap_or("");
        writeln!(
            out,
            "{:<width$}  {:<12} {:>8}  {error}",
            phase.id.as_str(),
            phase.state.to_string(),
            phase.attempts + phase.rollback_attempts,
        )?;
    }
    Ok(())
}

/// One row per active plan.
pub fn list(out: &mut impl Write, snapshots: &[PlanSnapshot]) -> io::Result<()> {
    if snapshots.is_empty() {
        return writeln!(out, "no active plans");
    }
    for snapshot in snapshots {
        writeln!(
            out,
            "{}  {:<10} {:<12} {:>3}%",
            snapshot.operation_id,
            snapshot.kind.to_string(),
            snapshot.state.to_string(),
            snapshot.progress_percent(),
        )?;
    }
    Ok(())
}
