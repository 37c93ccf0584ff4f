use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use uuid::Uuid;

use crate::validation::{self, Finding, Findings};
use crate::{Field, Library, LibraryId, Member, MemberId, ModelError, ModelSnapshot, Value};

/// Outcome of looking up the editable counterpart of a member in a later version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedMember {
    pub member: MemberId,
    /// `true` when the counterpart did not exist and was created by the lookup.
    pub created: bool,
}

/// Port onto the schema model the editor mutates.
pub trait ModelStore: Send + Sync + 'static {
    fn members(&self) -> Vec<Member>;
    fn member(&self, id: MemberId) -> Option<Member>;
    fn find_member_by_name(&self, name: &str) -> Option<Member>;
    fn libraries(&self) -> Vec<Library>;
    fn library(&self, id: LibraryId) -> Option<Library>;

    fn get_field(&self, id: MemberId, field: Field) -> Result<Option<Value>, ModelError>;
    fn set_field(&self, id: MemberId, field: Field, value: &Value) -> Result<(), ModelError>;

    /// Blocking finding for a prospective edit; `None` when the edit is acceptable.
    fn check_change(&self, id: MemberId, field: Field, value: &Value) -> Option<Finding>;
    fn validate_member(&self, id: MemberId) -> Findings;

    fn is_editable(&self, id: MemberId) -> bool;

    /// Whether a later, editable minor version exists in the member's version chain.
    fn has_editable_successor(&self, id: MemberId) -> bool;

    /// Find or create the counterpart of `id` in the next editable minor version of
    /// its library's version chain. `None` when the chain has no editable successor.
    fn next_editable_version(&self, id: MemberId) -> Result<Option<VersionedMember>, ModelError>;

    fn add_member(&self, member: Member) -> Result<MemberId, ModelError>;
    fn remove_member(&self, id: MemberId) -> Result<Member, ModelError>;
}

#[derive(Debug, Default)]
struct ModelGraph {
    libraries: Vec<Library>,
    members: Vec<Member>,
}

impl ModelGraph {
    fn library(&self, id: LibraryId) -> Option<&Library> {
        self.libraries.iter().find(|l| l.id == id)
    }

    fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    fn editable(&self, member: &Member) -> bool {
        self.library(member.library).is_some_and(|l| l.editable)
    }

    /// Lowest editable version later than `library` within its version chain.
    fn successor_of(&self, library: LibraryId) -> Option<&Library> {
        let library = self.library(library)?;
        self.libraries
            .iter()
            .filter(|l| l.editable && l.same_chain(library) && l.version > library.version)
            .min_by_key(|l| l.version)
    }
}

/// In-process model store. Structural mutations take the write lock; readers get
/// cloned snapshots so iteration never observes a half-applied edit.
#[derive(Clone, Debug, Default)]
pub struct InMemoryModelStore {
    graph: Arc<RwLock<ModelGraph>>,
}

impl InMemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ModelSnapshot) -> Self {
        Self {
            graph: Arc::new(RwLock::new(ModelGraph {
                libraries: snapshot.libraries,
                members: snapshot.members,
            })),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let snapshot: ModelSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        let graph = self.read();
        ModelSnapshot {
            libraries: graph.libraries.clone(),
            members: graph.members.clone(),
        }
    }

    pub fn add_library(&self, library: Library) -> LibraryId {
        let id = library.id;
        self.write().libraries.push(library);
        id
    }

    fn read(&self) -> RwLockReadGuard<'_, ModelGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ModelGraph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ModelStore for InMemoryModelStore {
    fn members(&self) -> Vec<Member> {
        self.read().members.clone()
    }

    fn member(&self, id: MemberId) -> Option<Member> {
        self.read().member(id).cloned()
    }

    fn find_member_by_name(&self, name: &str) -> Option<Member> {
        self.read().members.iter().find(|m| m.name == name).cloned()
    }

    fn libraries(&self) -> Vec<Library> {
        self.read().libraries.clone()
    }

    fn library(&self, id: LibraryId) -> Option<Library> {
        self.read().library(id).cloned()
    }

    fn get_field(&self, id: MemberId, field: Field) -> Result<Option<Value>, ModelError> {
        self.read()
            .member(id)
            .ok_or(ModelError::UnknownMember(id))?
            .field(field)
    }

    fn set_field(&self, id: MemberId, field: Field, value: &Value) -> Result<(), ModelError> {
        let mut graph = self.write();
        let member = graph.member(id).ok_or(ModelError::UnknownMember(id))?;
        if !graph.editable(member) {
            return Err(ModelError::NotEditable(id));
        }
        let member = graph
            .member_mut(id)
            .ok_or(ModelError::UnknownMember(id))?;
        member.set_field(field, value)?;
        debug!(member = %id, %field, %value, "field updated");
        Ok(())
    }

    fn check_change(&self, id: MemberId, field: Field, value: &Value) -> Option<Finding> {
        let graph = self.read();
        let Some(member) = graph.member(id) else {
            return Some(Finding::error(id, "MEMBER_UNKNOWN", "member no longer exists"));
        };
        validation::check_change(member, field, value)
    }

    fn validate_member(&self, id: MemberId) -> Findings {
        match self.member(id) {
            Some(member) => validation::validate_member(&member),
            None => Findings::new(),
        }
    }

    fn is_editable(&self, id: MemberId) -> bool {
        let graph = self.read();
        graph.member(id).is_some_and(|m| graph.editable(m))
    }

    fn has_editable_successor(&self, id: MemberId) -> bool {
        let graph = self.read();
        graph.member(id).is_some_and(|m| graph.successor_of(m.library).is_some())
    }

    fn next_editable_version(&self, id: MemberId) -> Result<Option<VersionedMember>, ModelError> {
        let mut graph = self.write();
        let member = graph.member(id).ok_or(ModelError::UnknownMember(id))?.clone();
        if graph.library(member.library).is_none() {
            return Err(ModelError::UnknownLibrary(member.library));
        }
        let Some(successor) = graph.successor_of(member.library).cloned() else {
            return Ok(None);
        };

        if let Some(existing) = graph
            .members
            .iter()
            .find(|m| m.library == successor.id && m.name == member.name)
        {
            return Ok(Some(VersionedMember {
                member: existing.id,
                created: false,
            }));
        }

        let counterpart = Member {
            id: Uuid::new_v4(),
            library: successor.id,
            deprecation: None,
            ..member
        };
        let new_id = counterpart.id;
        debug!(
            original = %id,
            counterpart = %new_id,
            version = %successor.version,
            "created minor version counterpart"
        );
        graph.members.push(counterpart);
        Ok(Some(VersionedMember {
            member: new_id,
            created: true,
        }))
    }

    fn add_member(&self, member: Member) -> Result<MemberId, ModelError> {
        let mut graph = self.write();
        if graph.member(member.id).is_some() {
            return Err(ModelError::DuplicateMember(member.id));
        }
        let library = graph
            .library(member.library)
            .ok_or(ModelError::UnknownLibrary(member.library))?;
        if !library.editable {
            return Err(ModelError::NotEditable(member.id));
        }
        let id = member.id;
        graph.members.push(member);
        Ok(id)
    }

    fn remove_member(&self, id: MemberId) -> Result<Member, ModelError> {
        let mut graph = self.write();
        let ix = graph
            .members
            .iter()
            .position(|m| m.id == id)
            .ok_or(ModelError::UnknownMember(id))?;
        if !graph.editable(&graph.members[ix]) {
            return Err(ModelError::NotEditable(id));
        }
        Ok(graph.members.remove(ix))
    }
}
