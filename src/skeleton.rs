//! Named entity registry for one tracked skeleton.
//!
//! Joints and bones are kept as two parallel tables. Each table maps stable
//! identifiers to names and to the latest reported pose. Enumeration order
//! and identifier value are decoupled: entities may be registered sparsely,
//! so position-based lookup goes through the table's insertion order while
//! identifiers stay stable for the life of the registry.

use crate::types::{EntityId, EntityKind, Pose, PoseReport, TimeValue};
use crate::{Result, SkelError};
use std::collections::HashMap;

struct Entry {
    id: EntityId,
    name: String,
    state: Option<PoseReport>,
}

/// Lookup table for one entity kind.
///
/// Insertion order defines the dense index range `0..count`. `by_name` only
/// holds non-empty names; entities introduced by a bare pose report carry an
/// empty name until a registration names them.
pub struct EntityTable {
    kind: EntityKind,
    entries: Vec<Entry>,
    by_id: HashMap<EntityId, usize>,
    by_name: HashMap<String, EntityId>,
}

impl EntityTable {
    pub(crate) fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn count(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Resolve a name to its identifier.
    pub fn id_by_name(&self, name: &str) -> Result<EntityId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SkelError::NameNotFound(self.kind, name.to_string()))
    }

    /// Resolve an enumeration position to an identifier.
    pub fn id_by_index(&self, index: u32) -> Result<EntityId> {
        self.entries
            .get(index as usize)
            .map(|e| e.id)
            .ok_or(SkelError::IndexOutOfRange(self.kind, index, self.count()))
    }

    fn entry(&self, id: EntityId) -> Result<&Entry> {
        self.by_id
            .get(&id)
            .map(|&i| &self.entries[i])
            .ok_or(SkelError::IdNotFound(self.kind, id))
    }

    /// Name of an entity. Empty for entities introduced by a bare pose report.
    pub fn name(&self, id: EntityId) -> Result<&str> {
        Ok(self.entry(id)?.name.as_str())
    }

    /// Byte length of the name including terminator, or 0 for an empty name.
    ///
    /// Callers size a buffer from this, then call [`copy_name_to`](Self::copy_name_to).
    pub fn name_len(&self, id: EntityId) -> Result<u32> {
        let name = &self.entry(id)?.name;
        Ok(if name.is_empty() {
            0
        } else {
            name.len() as u32 + 1
        })
    }

    /// Copy the name plus NUL terminator into `out`, returning bytes written.
    ///
    /// Capacity is re-checked here even if the caller sized `out` from
    /// [`name_len`](Self::name_len); a short buffer fails without truncating
    /// or touching `out`. An empty name still needs one byte for the
    /// terminator.
    pub fn copy_name_to(&self, id: EntityId, out: &mut [u8]) -> Result<u32> {
        let name = &self.entry(id)?.name;
        let needed = name.len() as u32 + 1;
        if (out.len() as u32) < needed {
            return Err(SkelError::BufferTooSmall {
                needed,
                capacity: out.len() as u32,
            });
        }
        out[..name.len()].copy_from_slice(name.as_bytes());
        out[name.len()] = 0;
        Ok(needed)
    }

    /// Latest reported pose and its timestamp.
    pub fn pose(&self, id: EntityId) -> Result<PoseReport> {
        self.entry(id)?
            .state
            .ok_or(SkelError::NoPoseYet(self.kind, id))
    }

    /// Register an entity, or rename it if the identifier already exists.
    ///
    /// Non-empty names must stay unique within the kind. The entity starts
    /// with no pose; an existing entity keeps its current pose across a
    /// rename.
    pub(crate) fn register(&mut self, id: EntityId, name: &str) -> Result<()> {
        if !name.is_empty() {
            if let Some(&owner) = self.by_name.get(name) {
                if owner != id {
                    return Err(SkelError::DuplicateName(self.kind, name.to_string()));
                }
            }
        }

        match self.by_id.get(&id).copied() {
            Some(i) => {
                let old = std::mem::replace(&mut self.entries[i].name, name.to_string());
                if !old.is_empty() {
                    self.by_name.remove(&old);
                }
            }
            None => {
                self.by_id.insert(id, self.entries.len());
                self.entries.push(Entry {
                    id,
                    name: name.to_string(),
                    state: None,
                });
            }
        }
        if !name.is_empty() {
            self.by_name.insert(name.to_string(), id);
        }
        Ok(())
    }

    /// Overwrite an entity's pose, last-writer-wins.
    ///
    /// No timestamp ordering check: an out-of-order report becomes the new
    /// current value. An unknown identifier is appended to the enumeration
    /// with an empty name; existing identifiers are never renumbered.
    pub(crate) fn set_pose(&mut self, id: EntityId, pose: Pose, timestamp: TimeValue) {
        let i = match self.by_id.get(&id).copied() {
            Some(i) => i,
            None => {
                let i = self.entries.len();
                self.by_id.insert(id, i);
                self.entries.push(Entry {
                    id,
                    name: String::new(),
                    state: None,
                });
                i
            }
        };
        self.entries[i].state = Some(PoseReport { pose, timestamp });
    }
}

struct StagedPose {
    kind: EntityKind,
    id: EntityId,
    pose: Pose,
    timestamp: TimeValue,
}

/// Registry for one skeleton sensor: a joint table, a bone table, and the
/// staging buffer for the reporting cycle currently in flight.
///
/// Pose reports accumulate in the staging buffer and only become visible to
/// readers when [`commit`](Self::commit) runs at the cycle's completion
/// marker, so a partially reported cycle is never observable.
pub struct Skeleton {
    joints: EntityTable,
    bones: EntityTable,
    staged: Vec<StagedPose>,
}

impl Skeleton {
    pub(crate) fn new() -> Self {
        Self {
            joints: EntityTable::new(EntityKind::Joint),
            bones: EntityTable::new(EntityKind::Bone),
            staged: Vec::new(),
        }
    }

    pub fn table(&self, kind: EntityKind) -> &EntityTable {
        match kind {
            EntityKind::Joint => &self.joints,
            EntityKind::Bone => &self.bones,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut EntityTable {
        match kind {
            EntityKind::Joint => &mut self.joints,
            EntityKind::Bone => &mut self.bones,
        }
    }

    pub fn count(&self, kind: EntityKind) -> u32 {
        self.table(kind).count()
    }

    pub fn id_by_name(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        self.table(kind).id_by_name(name)
    }

    pub fn id_by_index(&self, kind: EntityKind, index: u32) -> Result<EntityId> {
        self.table(kind).id_by_index(index)
    }

    pub fn name(&self, kind: EntityKind, id: EntityId) -> Result<&str> {
        self.table(kind).name(id)
    }

    pub fn name_len(&self, kind: EntityKind, id: EntityId) -> Result<u32> {
        self.table(kind).name_len(id)
    }

    pub fn copy_name_to(&self, kind: EntityKind, id: EntityId, out: &mut [u8]) -> Result<u32> {
        self.table(kind).copy_name_to(id, out)
    }

    pub fn pose(&self, kind: EntityKind, id: EntityId) -> Result<PoseReport> {
        self.table(kind).pose(id)
    }

    pub(crate) fn register(&mut self, kind: EntityKind, id: EntityId, name: &str) -> Result<()> {
        self.table_mut(kind).register(id, name)
    }

    /// Buffer a pose report for the in-flight cycle.
    pub(crate) fn stage_pose(
        &mut self,
        kind: EntityKind,
        id: EntityId,
        pose: Pose,
        timestamp: TimeValue,
    ) {
        self.staged.push(StagedPose {
            kind,
            id,
            pose,
            timestamp,
        });
    }

    /// Apply all staged reports in arrival order. Returns the number applied.
    pub(crate) fn commit(&mut self) -> usize {
        let staged = std::mem::take(&mut self.staged);
        let applied = staged.len();
        for s in staged {
            self.table_mut(s.kind).set_pose(s.id, s.pose, s.timestamp);
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(seconds: i64) -> TimeValue {
        TimeValue {
            seconds,
            microseconds: 0,
        }
    }

    fn pose_at(x: f64) -> Pose {
        Pose {
            translation: [x, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    #[test]
    fn empty_registry_has_no_entities() {
        let skel = Skeleton::new();
        assert_eq!(skel.count(EntityKind::Joint), 0);
        assert_eq!(skel.count(EntityKind::Bone), 0);
        assert!(matches!(
            skel.id_by_index(EntityKind::Joint, 0),
            Err(SkelError::IndexOutOfRange(EntityKind::Joint, 0, 0))
        ));
        assert!(matches!(
            skel.id_by_name(EntityKind::Joint, "l_wrist"),
            Err(SkelError::NameNotFound(..))
        ));
    }

    #[test]
    fn index_and_id_are_decoupled() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 42, "l_wrist").unwrap();
        skel.register(EntityKind::Joint, 7, "l_elbow").unwrap();

        assert_eq!(skel.count(EntityKind::Joint), 2);
        assert_eq!(skel.id_by_index(EntityKind::Joint, 0).unwrap(), 42);
        assert_eq!(skel.id_by_index(EntityKind::Joint, 1).unwrap(), 7);
        assert_eq!(skel.id_by_name(EntityKind::Joint, "l_elbow").unwrap(), 7);

        // Every enumerable index resolves to an id with a retrievable name.
        for index in 0..skel.count(EntityKind::Joint) {
            let id = skel.id_by_index(EntityKind::Joint, index).unwrap();
            assert!(!skel.name(EntityKind::Joint, id).unwrap().is_empty());
        }

        // Boundary: index == count fails.
        assert!(matches!(
            skel.id_by_index(EntityKind::Joint, 2),
            Err(SkelError::IndexOutOfRange(EntityKind::Joint, 2, 2))
        ));
    }

    #[test]
    fn kinds_do_not_share_namespaces() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 3, "l_wrist").unwrap();
        skel.register(EntityKind::Bone, 3, "l_forearm").unwrap();

        assert_eq!(skel.name(EntityKind::Joint, 3).unwrap(), "l_wrist");
        assert_eq!(skel.name(EntityKind::Bone, 3).unwrap(), "l_forearm");
        // Same name is allowed across kinds, not within one.
        skel.register(EntityKind::Bone, 9, "l_wrist").unwrap();
        assert!(matches!(
            skel.register(EntityKind::Joint, 8, "l_wrist"),
            Err(SkelError::DuplicateName(EntityKind::Joint, _))
        ));
    }

    #[test]
    fn name_length_and_copy_round_trip() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Bone, 5, "r_femur").unwrap();

        let len = skel.name_len(EntityKind::Bone, 5).unwrap();
        assert_eq!(len, "r_femur".len() as u32 + 1);

        let mut buf = vec![0xAAu8; len as usize];
        let written = skel.copy_name_to(EntityKind::Bone, 5, &mut buf).unwrap();
        assert_eq!(written, len);
        assert_eq!(&buf[..7], b"r_femur");
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn short_buffer_fails_without_writing() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 1, "l_wrist").unwrap();

        let len = skel.name_len(EntityKind::Joint, 1).unwrap();
        let mut buf = vec![0xAAu8; len as usize - 1];
        let err = skel
            .copy_name_to(EntityKind::Joint, 1, &mut buf)
            .unwrap_err();
        assert_eq!(
            err,
            SkelError::BufferTooSmall {
                needed: len,
                capacity: len - 1,
            }
        );
        assert!(buf.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn empty_name_reports_zero_length_but_copy_needs_terminator() {
        let mut skel = Skeleton::new();
        skel.stage_pose(EntityKind::Joint, 11, pose_at(0.0), ts(1));
        skel.commit();

        assert_eq!(skel.name_len(EntityKind::Joint, 11).unwrap(), 0);
        let mut empty: [u8; 0] = [];
        assert!(matches!(
            skel.copy_name_to(EntityKind::Joint, 11, &mut empty),
            Err(SkelError::BufferTooSmall {
                needed: 1,
                capacity: 0,
            })
        ));
        let mut buf = [0xAAu8; 1];
        assert_eq!(skel.copy_name_to(EntityKind::Joint, 11, &mut buf).unwrap(), 1);
        assert_eq!(buf[0], 0);
    }

    #[test]
    fn pose_is_tri_state() {
        let mut skel = Skeleton::new();
        // Unknown id.
        assert!(matches!(
            skel.pose(EntityKind::Joint, 42),
            Err(SkelError::IdNotFound(EntityKind::Joint, 42))
        ));

        // Known but unreported: a distinguishable failure, not a zero pose.
        skel.register(EntityKind::Joint, 42, "l_wrist").unwrap();
        assert!(matches!(
            skel.pose(EntityKind::Joint, 42),
            Err(SkelError::NoPoseYet(EntityKind::Joint, 42))
        ));

        skel.stage_pose(EntityKind::Joint, 42, pose_at(0.0), ts(1));
        skel.commit();
        let report = skel.pose(EntityKind::Joint, 42).unwrap();
        assert_eq!(report.pose, pose_at(0.0));
        assert_eq!(report.timestamp, ts(1));
    }

    #[test]
    fn staged_reports_are_invisible_until_commit() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Bone, 2, "spine").unwrap();

        skel.stage_pose(EntityKind::Bone, 2, pose_at(1.0), ts(1));
        assert!(matches!(
            skel.pose(EntityKind::Bone, 2),
            Err(SkelError::NoPoseYet(..))
        ));

        assert_eq!(skel.commit(), 1);
        assert_eq!(skel.pose(EntityKind::Bone, 2).unwrap().pose, pose_at(1.0));
        // Staging buffer drains on commit.
        assert_eq!(skel.commit(), 0);
    }

    #[test]
    fn last_writer_wins_even_out_of_order() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 1, "head").unwrap();

        skel.stage_pose(EntityKind::Joint, 1, pose_at(1.0), ts(10));
        skel.commit();
        skel.stage_pose(EntityKind::Joint, 1, pose_at(2.0), ts(20));
        skel.commit();
        let report = skel.pose(EntityKind::Joint, 1).unwrap();
        assert_eq!(report.pose, pose_at(2.0));
        assert_eq!(report.timestamp, ts(20));

        // An older timestamp still overwrites.
        skel.stage_pose(EntityKind::Joint, 1, pose_at(3.0), ts(5));
        skel.commit();
        let report = skel.pose(EntityKind::Joint, 1).unwrap();
        assert_eq!(report.pose, pose_at(3.0));
        assert_eq!(report.timestamp, ts(5));
    }

    #[test]
    fn unknown_id_in_report_joins_enumeration_without_renumbering() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 42, "l_wrist").unwrap();

        skel.stage_pose(EntityKind::Joint, 99, pose_at(4.0), ts(1));
        skel.commit();

        assert_eq!(skel.count(EntityKind::Joint), 2);
        assert_eq!(skel.id_by_index(EntityKind::Joint, 0).unwrap(), 42);
        assert_eq!(skel.id_by_index(EntityKind::Joint, 1).unwrap(), 99);
        assert_eq!(skel.name(EntityKind::Joint, 99).unwrap(), "");
        // A later registration can name it without disturbing the pose.
        skel.register(EntityKind::Joint, 99, "l_thumb").unwrap();
        assert_eq!(skel.id_by_name(EntityKind::Joint, "l_thumb").unwrap(), 99);
        assert_eq!(skel.pose(EntityKind::Joint, 99).unwrap().pose, pose_at(4.0));
    }

    #[test]
    fn rename_moves_the_name_mapping() {
        let mut skel = Skeleton::new();
        skel.register(EntityKind::Joint, 1, "l_wrist").unwrap();
        skel.register(EntityKind::Joint, 1, "left_wrist").unwrap();

        assert_eq!(skel.id_by_name(EntityKind::Joint, "left_wrist").unwrap(), 1);
        assert!(skel.id_by_name(EntityKind::Joint, "l_wrist").is_err());
        assert_eq!(skel.count(EntityKind::Joint), 1);
    }

    #[test]
    fn fresh_registry_scenario() {
        // Registry starts empty; one report introduces joint 42 "l_wrist".
        let mut skel = Skeleton::new();
        assert_eq!(skel.count(EntityKind::Joint), 0);

        skel.register(EntityKind::Joint, 42, "l_wrist").unwrap();
        skel.stage_pose(EntityKind::Joint, 42, Pose::IDENTITY, ts(1));
        skel.commit();

        assert_eq!(skel.count(EntityKind::Joint), 1);
        assert_eq!(skel.id_by_index(EntityKind::Joint, 0).unwrap(), 42);
        assert_eq!(skel.id_by_name(EntityKind::Joint, "l_wrist").unwrap(), 42);
        assert_eq!(skel.pose(EntityKind::Joint, 42).unwrap().pose, Pose::IDENTITY);

        // A later report updates the pose in place; the count stays 1.
        skel.stage_pose(EntityKind::Joint, 42, pose_at(1.0), ts(2));
        skel.commit();
        let report = skel.pose(EntityKind::Joint, 42).unwrap();
        assert_eq!(report.pose, pose_at(1.0));
        assert_eq!(report.timestamp, ts(2));
        assert_eq!(skel.count(EntityKind::Joint), 1);
    }
}
