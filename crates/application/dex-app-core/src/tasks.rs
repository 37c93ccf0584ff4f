//! Background work run on behalf of the editor session.

use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use dex_core::validation::{self, Finding, Findings};
use dex_core::{InMemoryModelStore, ModelError, ModelStore};
use dex_tasks::{DexTask, TaskContext, TaskOutcome, TaskRunner};

use crate::domain::{AppSettings, UnresolvedType};

/// Validates every member of the model. Only one validation runs at a time; a new
/// request supersedes the running one.
pub struct ValidateModelTask {
    store: Arc<dyn ModelStore>,
}

impl ValidateModelTask {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }
}

impl DexTask for ValidateModelTask {
    type Input = ();
    type Output = Findings;
    type Error = Infallible;
    const SINGLETON: bool = true;

    fn do_it(&mut self, _: (), ctx: &TaskContext) -> Result<Findings, Infallible> {
        // Iterate a snapshot; edits on the interactive thread may continue meanwhile.
        let members = self.store.members();
        let total = members.len() as u64;
        let mut findings = Findings::new();

        for (done, member) in members.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            findings.extend(validation::validate_member(member));
            ctx.update_progress(done as u64 + 1, total);
            ctx.update_message(format!("Validated {}", member.name));
        }

        let mut seen: HashMap<(dex_core::LibraryId, &str), usize> = HashMap::new();
        for member in &members {
            let count = seen.entry((member.library, member.name.as_str())).or_default();
            *count += 1;
            if *count == 2 {
                findings.push(Finding::error(
                    member.id,
                    "NAME_DUPLICATE",
                    format!("{} is defined more than once in its library", member.name),
                ));
            }
        }

        Ok(findings)
    }
}

/// Reports property and base type references that name no member of the model.
/// Prefixed names such as `xsd:string` refer to external schemas and are accepted.
pub struct ResolveTypesTask {
    store: Arc<dyn ModelStore>,
}

impl ResolveTypesTask {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }
}

impl DexTask for ResolveTypesTask {
    type Input = ();
    type Output = Vec<UnresolvedType>;
    type Error = Infallible;
    const SINGLETON: bool = true;

    fn do_it(&mut self, _: (), ctx: &TaskContext) -> Result<Vec<UnresolvedType>, Infallible> {
        let members = self.store.members();
        let known: HashSet<&str> = members.iter().map(|m| m.name.as_str()).collect();
        let total = members.len() as u64;
        let mut unresolved = Vec::new();

        for (done, member) in members.iter().enumerate() {
            if ctx.is_cancelled() {
                break;
            }
            let properties = member.kind.properties();
            for type_ref in member.kind.type_refs() {
                if type_ref.contains(':') || known.contains(type_ref) {
                    continue;
                }
                let property = properties
                    .iter()
                    .find(|p| p.type_ref.as_deref() == Some(type_ref))
                    .map(|p| p.name.clone());
                unresolved.push(UnresolvedType {
                    member: member.id,
                    member_name: member.name.clone(),
                    property,
                    type_ref: type_ref.to_string(),
                });
            }
            ctx.update_progress(done as u64 + 1, total);
        }
        Ok(unresolved)
    }
}

/// Reads a model file off the interactive thread.
pub struct LoadModelTask;

impl DexTask for LoadModelTask {
    type Input = PathBuf;
    type Output = InMemoryModelStore;
    type Error = ModelError;

    fn do_it(&mut self, path: PathBuf, ctx: &TaskContext) -> Result<InMemoryModelStore, ModelError> {
        ctx.update_message(format!("Loading {}", path.display()));
        let store = InMemoryModelStore::load(&path)?;
        ctx.update_progress(1, 1);
        Ok(store)
    }
}

/// Load a model file with [`LoadModelTask`] and wait for the result.
pub fn load_model(path: &Path, settings: &AppSettings, timeout: Duration) -> Result<InMemoryModelStore> {
    let runner = TaskRunner::new(settings.task_channel_capacity);
    let slot = Arc::new(Mutex::new(None));
    let sink = slot.clone();
    runner
        .task(LoadModelTask)
        .on_complete(move |outcome| {
            *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        })
        .go(Some(path.to_path_buf()))?;

    if !runner.wait_idle(timeout) {
        runner.cancel_all();
        bail!("Loading {} did not finish within {}s", path.display(), timeout.as_secs());
    }

    let outcome = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    match outcome {
        Some(TaskOutcome::Succeeded(Some(store))) => Ok(store),
        Some(TaskOutcome::Failed(diagnostic)) => Err(anyhow!(diagnostic)),
        _ => bail!("Loading {} was cancelled", path.display()),
    }
}
