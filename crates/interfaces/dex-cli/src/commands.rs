use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use dex_actions::{ActionKind, ActionOutcome};
use dex_app_core::{AppSettings, DexApplication};
use dex_core::{InMemoryModelStore, ModelStore, Severity, Value};
use tracing::{debug, info};

use crate::TASK_TIMEOUT;

fn open(path: &Utf8Path, settings: &AppSettings) -> Result<(Arc<InMemoryModelStore>, DexApplication)> {
    let store = Arc::new(
        dex_app_core::load_model(path.as_std_path(), settings, TASK_TIMEOUT)
            .with_context(|| format!("Failed to load model {path}"))?,
    );
    info!(%path, members = store.members().len(), "model loaded");
    let app = DexApplication::new(store.clone(), settings.clone());
    Ok((store, app))
}

fn settle(app: &DexApplication) -> Result<()> {
    if !app.wait_idle(TASK_TIMEOUT) {
        bail!("Background tasks did not finish within {}s", TASK_TIMEOUT.as_secs());
    }
    Ok(())
}

pub fn cmd_kinds(out: &mut impl Write) -> Result<()> {
    for kind in ActionKind::ALL {
        writeln!(out, "{:<22} {}", kind.key(), kind.label())?;
    }
    Ok(())
}

pub fn cmd_members(path: &Utf8Path, settings: &AppSettings, out: &mut impl Write) -> Result<()> {
    let (_, app) = open(path, settings)?;
    for row in app.rows() {
        let mut flags = Vec::new();
        if !row.editable {
            flags.push("read-only");
        }
        if row.deprecated {
            flags.push("deprecated");
        }
        writeln!(
            out,
            "{:<20} {:<22} {}{}",
            row.library,
            row.kind,
            row.name,
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        )?;
    }
    Ok(())
}

/// Validate the model. Returns the number of errors found.
pub fn cmd_validate(path: &Utf8Path, settings: &AppSettings, out: &mut impl Write) -> Result<usize> {
    let (store, app) = open(path, settings)?;
    app.validate()?;
    settle(&app)?;

    let findings = app.findings();
    for finding in findings.iter() {
        let subject = store
            .member(finding.subject)
            .map(|m| m.name)
            .unwrap_or_else(|| finding.subject.to_string());
        let severity = match finding.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        writeln!(out, "{severity:<8} {subject}: {} [{}]", finding.message, finding.code)?;
    }
    writeln!(
        out,
        ":: {} error(s), {} warning(s)",
        findings.error_count(),
        findings.warning_count()
    )?;
    Ok(findings.error_count())
}

/// Report unresolved type references. Returns how many were found.
pub fn cmd_resolve(path: &Utf8Path, settings: &AppSettings, out: &mut impl Write) -> Result<usize> {
    let (_, app) = open(path, settings)?;
    app.resolve_types()?;
    settle(&app)?;

    let unresolved = app.unresolved_types();
    for u in &unresolved {
        match &u.property {
            Some(property) => writeln!(out, "{}.{}: unknown type '{}'", u.member_name, property, u.type_ref)?,
            None => writeln!(out, "{}: unknown base type '{}'", u.member_name, u.type_ref)?,
        }
    }
    writeln!(out, ":: {} unresolved reference(s)", unresolved.len())?;
    Ok(unresolved.len())
}

pub struct SetRequest<'a> {
    pub member: &'a str,
    pub action: ActionKind,
    pub value: &'a str,
    /// Undo the edit right after applying it.
    pub undo: bool,
    /// Write the model back to its file.
    pub save: bool,
}

/// Apply one edit to a member field, optionally undoing it and saving the model.
pub fn cmd_set(
    path: &Utf8Path,
    settings: &AppSettings,
    request: SetRequest<'_>,
    out: &mut impl Write,
) -> Result<()> {
    let (store, app) = open(path, settings)?;
    let member = app.find_member(request.member)?;
    let kind = request.action;

    let value = if kind.field().is_numeric() && !request.value.trim().is_empty() {
        let n: i64 = request
            .value
            .trim()
            .parse()
            .with_context(|| format!("'{}' is not a number", request.value))?;
        Value::Number(n)
    } else {
        Value::from(request.value)
    };

    match app.apply(member.id, kind, value)? {
        ActionOutcome::Applied(committed) => {
            let shown = committed.map(|v| v.to_string()).unwrap_or_default();
            writeln!(out, ":: {kind} on {}: '{shown}'", member.name)?;
        }
        ActionOutcome::Vetoed(finding) => bail!("Rejected: {} [{}]", finding.message, finding.code),
        ActionOutcome::Disabled => bail!("Cannot {kind} on {}: member is not editable", member.name),
        ActionOutcome::Ignored => bail!("Nothing to change for {}", member.name),
    }

    if request.undo {
        app.undo()?;
        let restored = app
            .actions()
            .store()
            .get_field(member.id, kind.field())?
            .map(|v| v.to_string())
            .unwrap_or_default();
        writeln!(out, ":: undone; {} is '{restored}'", kind.field())?;
    }

    settle(&app)?;
    debug!(undo_depth = app.actions().undo_len(), "edit session settled");
    if request.save {
        store
            .save(path.as_std_path())
            .with_context(|| format!("Failed to save model {path}"))?;
        writeln!(out, ":: saved {path}")?;
    }
    Ok(())
}
