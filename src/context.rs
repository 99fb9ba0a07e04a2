//! Client context: owns the skeleton registries and drains device reports.
//!
//! Consumers drive the context from their own loop by calling
//! [`Context::update`]; there is no background scheduler. One update pass
//! applies every report pending at that instant, committing staged poses at
//! each sensor's completion marker and invoking callbacks registered for
//! that sensor. Callbacks therefore observe registry state consistent with
//! "all reports processed so far", never a partially applied cycle.

use crate::device::{DeviceConfig, DeviceToken};
use crate::skeleton::Skeleton;
use crate::store::{SkeletonStore, SlotHandle};
use crate::types::{
    EntityId, EntityKind, FrameMetadata, PoseReport, Report, SensorId, TimeValue,
};
use crate::{Result, SkelError};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type SkeletonCallback = Box<dyn FnMut(&TimeValue, &SkeletonView)>;
type FrameCallback = Box<dyn FnMut(&TimeValue, &FrameMetadata, &[u8])>;

/// Read access to one skeleton, validated on every call.
///
/// Views stay cheap to clone and independent of the context borrow, so a
/// caller may keep one across update cycles; each accessor re-checks the
/// handle against the arena and locks for the duration of the lookup only.
#[derive(Clone)]
pub struct SkeletonView {
    store: Arc<SkeletonStore>,
    sensor: SensorId,
    handle: SlotHandle,
}

impl SkeletonView {
    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    /// Number of entities of `kind`.
    pub fn count(&self, kind: EntityKind) -> Result<u32> {
        self.store.with(self.handle, |s| Ok(s.count(kind)))
    }

    /// Resolve a name to its identifier.
    pub fn id_by_name(&self, kind: EntityKind, name: &str) -> Result<EntityId> {
        self.store.with(self.handle, |s| s.id_by_name(kind, name))
    }

    /// Resolve an enumeration position to an identifier.
    pub fn id_by_index(&self, kind: EntityKind, index: u32) -> Result<EntityId> {
        self.store.with(self.handle, |s| s.id_by_index(kind, index))
    }

    /// Name of an entity, owned since the registry lock ends with the call.
    pub fn name(&self, kind: EntityKind, id: EntityId) -> Result<String> {
        self.store
            .with(self.handle, |s| s.name(kind, id).map(str::to_string))
    }

    /// Byte length of the name including terminator, 0 for an empty name.
    pub fn name_len(&self, kind: EntityKind, id: EntityId) -> Result<u32> {
        self.store.with(self.handle, |s| s.name_len(kind, id))
    }

    /// Copy the NUL-terminated name into `out`; fails rather than truncates.
    pub fn copy_name_to(&self, kind: EntityKind, id: EntityId, out: &mut [u8]) -> Result<u32> {
        self.store.with(self.handle, |s| s.copy_name_to(kind, id, out))
    }

    /// Latest committed pose and its report timestamp.
    pub fn pose(&self, kind: EntityKind, id: EntityId) -> Result<PoseReport> {
        self.store.with(self.handle, |s| s.pose(kind, id))
    }

    pub(crate) fn raw_parts(&self) -> (*const SkeletonStore, SlotHandle) {
        (Arc::as_ptr(&self.store), self.handle)
    }

    pub(crate) fn from_parts(store: Arc<SkeletonStore>, sensor: SensorId, handle: SlotHandle) -> Self {
        Self {
            store,
            sensor,
            handle,
        }
    }
}

/// Owns the registries, the report channel, and registered callbacks.
pub struct Context {
    app_id: String,
    sender: Sender<Report>,
    receiver: Receiver<Report>,
    connected: Arc<AtomicBool>,
    store: Arc<SkeletonStore>,
    sensors: HashMap<SensorId, SlotHandle>,
    skeleton_callbacks: HashMap<SensorId, Vec<SkeletonCallback>>,
    frame_callbacks: HashMap<SensorId, Vec<FrameCallback>>,
}

impl Context {
    /// Create a client context identified by an application id string.
    pub fn new(app_id: impl Into<String>) -> Context {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let app_id = app_id.into();
        log::info!("Client context '{}' created", app_id);
        Context {
            app_id,
            sender,
            receiver,
            connected: Arc::new(AtomicBool::new(true)),
            store: Arc::new(SkeletonStore::new()),
            sensors: HashMap::new(),
            skeleton_callbacks: HashMap::new(),
            frame_callbacks: HashMap::new(),
        }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Attach a reporting device to this context.
    pub fn create_device(&self, config: DeviceConfig) -> Result<DeviceToken> {
        DeviceToken::new(config, self.sender.clone(), Arc::clone(&self.connected))
    }

    /// Register a callback fired at each completion marker for `sensor`.
    pub fn on_skeleton(
        &mut self,
        sensor: SensorId,
        callback: impl FnMut(&TimeValue, &SkeletonView) + 'static,
    ) {
        self.skeleton_callbacks
            .entry(sensor)
            .or_default()
            .push(Box::new(callback));
    }

    /// Register a callback fired for each imaging frame from `sensor`.
    pub fn on_frame(
        &mut self,
        sensor: SensorId,
        callback: impl FnMut(&TimeValue, &FrameMetadata, &[u8]) + 'static,
    ) {
        self.frame_callbacks
            .entry(sensor)
            .or_default()
            .push(Box::new(callback));
    }

    /// Read access to the skeleton attached for `sensor`.
    pub fn skeleton(&self, sensor: SensorId) -> Result<SkeletonView> {
        let handle = *self
            .sensors
            .get(&sensor)
            .ok_or(SkelError::UnknownSensor(sensor))?;
        Ok(SkeletonView::from_parts(
            Arc::clone(&self.store),
            sensor,
            handle,
        ))
    }

    /// Drain and apply every report pending right now.
    ///
    /// Never blocks waiting for more data. Returns the number of reports
    /// processed; callbacks fire from inside this call.
    pub fn update(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(report) = self.receiver.try_recv() {
            processed += 1;
            self.apply(report);
        }
        processed
    }

    fn apply(&mut self, report: Report) {
        match report {
            Report::Descriptor { device, descriptor } => {
                let count = descriptor.sensors.len();
                for (sensor, desc) in descriptor.sensors.into_iter().enumerate() {
                    let sensor = sensor as SensorId;
                    let mut skeleton = Skeleton::new();
                    for joint in &desc.joints {
                        if let Err(e) = skeleton.register(EntityKind::Joint, joint.id, &joint.name)
                        {
                            log::warn!("Descriptor from '{}' rejected: {}", device, e);
                        }
                    }
                    for bone in &desc.bones {
                        if let Err(e) = skeleton.register(EntityKind::Bone, bone.id, &bone.name) {
                            log::warn!("Descriptor from '{}' rejected: {}", device, e);
                        }
                    }
                    let handle = self.store.insert(skeleton);
                    if let Some(old) = self.sensors.insert(sensor, handle) {
                        self.store.remove(old);
                        log::warn!("Sensor {} re-attached by '{}'", sensor, device);
                    }
                }
                log::info!("Attached {} skeleton sensor(s) from '{}'", count, device);
            }
            Report::Announce {
                sensor,
                kind,
                id,
                name,
            } => match self.sensors.get(&sensor) {
                Some(&handle) => {
                    let result = self
                        .store
                        .with_mut(handle, |s| s.register(kind, id, &name));
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) | Err(e) => {
                            log::warn!("Announce of {} {} '{}' rejected: {}", kind, id, name, e)
                        }
                    }
                }
                None => log::warn!("Announce for unattached sensor {}", sensor),
            },
            Report::Pose {
                sensor,
                kind,
                id,
                pose,
                timestamp,
            } => match self.sensors.get(&sensor) {
                Some(&handle) => {
                    let _ = self
                        .store
                        .with_mut(handle, |s| s.stage_pose(kind, id, pose, timestamp));
                }
                None => log::warn!("Pose report for unattached sensor {}", sensor),
            },
            Report::Complete { sensor, timestamp } => {
                let handle = match self.sensors.get(&sensor) {
                    Some(&h) => h,
                    None => {
                        log::warn!("Completion marker for unattached sensor {}", sensor);
                        return;
                    }
                };
                match self.store.with_mut(handle, |s| s.commit()) {
                    Ok(applied) => {
                        log::trace!("Sensor {}: committed {} pose report(s)", sensor, applied)
                    }
                    Err(e) => {
                        log::warn!("Commit for sensor {} failed: {}", sensor, e);
                        return;
                    }
                }
                if let Some(callbacks) = self.skeleton_callbacks.get_mut(&sensor) {
                    let view =
                        SkeletonView::from_parts(Arc::clone(&self.store), sensor, handle);
                    for callback in callbacks.iter_mut() {
                        callback(&timestamp, &view);
                    }
                }
            }
            Report::Frame {
                sensor,
                metadata,
                data,
                timestamp,
            } => match self.frame_callbacks.get_mut(&sensor) {
                Some(callbacks) => {
                    for callback in callbacks.iter_mut() {
                        callback(&timestamp, &metadata, &data);
                    }
                }
                None => log::trace!("Dropping frame for sensor {} (no callback)", sensor),
            },
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Relaxed);
        log::info!("Client context '{}' shut down", self.app_id);
    }
}
