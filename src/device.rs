//! Device-side reporting pipeline.
//!
//! A hardware plugin configures its interfaces up front, then drives the
//! client registry through a [`DeviceToken`]: announce entities, send pose
//! reports, and mark each reporting cycle complete per sensor. Every send
//! goes through a guard that is only grantable while the owning client
//! context is still alive.

use crate::types::{
    Capabilities, EntityId, EntityKind, FrameMetadata, Pose, Report, SensorId,
    SkeletonDescriptor, TimeValue,
};
use crate::{Result, SkelError};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Declares a device's name and the interfaces it will report through.
///
/// Interfaces must be configured before the device is created; sends over an
/// unconfigured interface fail.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    name: String,
    capabilities: Capabilities,
    descriptor: SkeletonDescriptor,
    imaging_sensors: u32,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: Capabilities::empty(),
            descriptor: SkeletonDescriptor::default(),
            imaging_sensors: 0,
        }
    }

    /// Configure the skeleton interface with the device's articulation layout.
    pub fn with_skeleton(mut self, descriptor: SkeletonDescriptor) -> Self {
        self.capabilities |= Capabilities::SKELETON;
        self.descriptor = descriptor;
        self
    }

    /// Configure the imaging interface for `sensors` frame sources.
    pub fn with_imaging(mut self, sensors: u32) -> Self {
        self.capabilities |= Capabilities::IMAGING;
        self.imaging_sensors = sensors;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }
}

/// Scoped permission to send reports, granted while the connection is up.
pub struct SendGuard<'a> {
    token: &'a DeviceToken,
}

impl SendGuard<'_> {
    fn send(&self, report: Report) -> Result<()> {
        self.token.sender.send(report).map_err(|_| {
            self.token.connected.store(false, Ordering::Relaxed);
            SkelError::ConnectionClosed
        })
    }
}

/// Handle a plugin uses to report into a client context.
///
/// Cloneable and `Send`, so a reader thread may own one while the client
/// polls from its own loop; the channel serializes delivery.
#[derive(Clone)]
pub struct DeviceToken {
    name: String,
    capabilities: Capabilities,
    skeleton_sensors: u32,
    imaging_sensors: u32,
    sender: Sender<Report>,
    connected: Arc<AtomicBool>,
}

impl DeviceToken {
    pub(crate) fn new(
        config: DeviceConfig,
        sender: Sender<Report>,
        connected: Arc<AtomicBool>,
    ) -> Result<DeviceToken> {
        let token = DeviceToken {
            name: config.name,
            capabilities: config.capabilities,
            skeleton_sensors: config.descriptor.sensors.len() as u32,
            imaging_sensors: config.imaging_sensors,
            sender,
            connected,
        };
        if token.capabilities.contains(Capabilities::SKELETON) {
            token.send_guard()?.send(Report::Descriptor {
                device: token.name.clone(),
                descriptor: config.descriptor,
            })?;
        }
        log::info!(
            "Device '{}' attached: capabilities={:?}",
            token.name,
            token.capabilities
        );
        Ok(token)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Acquire the send guard. Fails once the client context is gone.
    pub fn send_guard(&self) -> Result<SendGuard<'_>> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(SkelError::ConnectionClosed);
        }
        Ok(SendGuard { token: self })
    }

    fn check_skeleton(&self, sensor: SensorId) -> Result<()> {
        if !self.capabilities.contains(Capabilities::SKELETON) {
            return Err(SkelError::NotConfigured("skeleton"));
        }
        if sensor >= self.skeleton_sensors {
            return Err(SkelError::UnknownSensor(sensor));
        }
        Ok(())
    }

    fn announce(
        &self,
        sensor: SensorId,
        kind: EntityKind,
        id: EntityId,
        name: &str,
    ) -> Result<()> {
        self.check_skeleton(sensor)?;
        self.send_guard()?.send(Report::Announce {
            sensor,
            kind,
            id,
            name: name.to_string(),
        })
    }

    /// Register a joint discovered after configure time.
    pub fn announce_joint(&self, sensor: SensorId, id: EntityId, name: &str) -> Result<()> {
        self.announce(sensor, EntityKind::Joint, id, name)
    }

    /// Register a bone discovered after configure time.
    pub fn announce_bone(&self, sensor: SensorId, id: EntityId, name: &str) -> Result<()> {
        self.announce(sensor, EntityKind::Bone, id, name)
    }

    fn send_pose(
        &self,
        sensor: SensorId,
        kind: EntityKind,
        id: EntityId,
        pose: Pose,
        timestamp: TimeValue,
    ) -> Result<()> {
        self.check_skeleton(sensor)?;
        self.send_guard()?.send(Report::Pose {
            sensor,
            kind,
            id,
            pose,
            timestamp,
        })
    }

    /// Report the latest pose for one joint.
    pub fn send_joint_pose(
        &self,
        sensor: SensorId,
        id: EntityId,
        pose: Pose,
        timestamp: TimeValue,
    ) -> Result<()> {
        self.send_pose(sensor, EntityKind::Joint, id, pose, timestamp)
    }

    /// Report the latest pose for one bone.
    pub fn send_bone_pose(
        &self,
        sensor: SensorId,
        id: EntityId,
        pose: Pose,
        timestamp: TimeValue,
    ) -> Result<()> {
        self.send_pose(sensor, EntityKind::Bone, id, pose, timestamp)
    }

    /// Mark the end of one reporting cycle for `sensor`.
    ///
    /// All pose reports sent since the previous marker become visible to
    /// readers together when the client processes this.
    pub fn complete(&self, sensor: SensorId, timestamp: TimeValue) -> Result<()> {
        self.check_skeleton(sensor)?;
        self.send_guard()?.send(Report::Complete { sensor, timestamp })
    }

    /// Report one imaging frame for `sensor`.
    pub fn send_frame(
        &self,
        sensor: SensorId,
        metadata: FrameMetadata,
        data: &[u8],
        timestamp: TimeValue,
    ) -> Result<()> {
        if !self.capabilities.contains(Capabilities::IMAGING) {
            return Err(SkelError::NotConfigured("imaging"));
        }
        if sensor >= self.imaging_sensors {
            return Err(SkelError::UnknownSensor(sensor));
        }
        if data.len() != metadata.buffer_len() {
            return Err(SkelError::InvalidArgument("frame buffer length"));
        }
        self.send_guard()?.send(Report::Frame {
            sensor,
            metadata,
            data: data.to_vec(),
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArticulationDesc, SensorDesc};

    fn one_sensor_descriptor() -> SkeletonDescriptor {
        SkeletonDescriptor {
            sensors: vec![SensorDesc {
                joints: vec![ArticulationDesc::new(0, "head")],
                bones: vec![],
            }],
        }
    }

    fn token(config: DeviceConfig) -> (DeviceToken, crossbeam_channel::Receiver<Report>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let connected = Arc::new(AtomicBool::new(true));
        let token = DeviceToken::new(config, tx, connected).unwrap();
        (token, rx)
    }

    #[test]
    fn skeleton_device_sends_descriptor_first() {
        let (_token, rx) = token(DeviceConfig::new("hand").with_skeleton(one_sensor_descriptor()));
        assert!(matches!(rx.try_recv().unwrap(), Report::Descriptor { .. }));
    }

    #[test]
    fn unconfigured_interfaces_reject_sends() {
        let (tok, _rx) = token(DeviceConfig::new("camera").with_imaging(1));
        assert_eq!(
            tok.send_joint_pose(0, 0, Pose::IDENTITY, TimeValue::ZERO),
            Err(SkelError::NotConfigured("skeleton"))
        );

        let (tok, _rx) = token(DeviceConfig::new("hand").with_skeleton(one_sensor_descriptor()));
        let meta = FrameMetadata {
            width: 2,
            height: 2,
            channels: 1,
            depth: 1,
        };
        assert_eq!(
            tok.send_frame(0, meta, &[0u8; 4], TimeValue::ZERO),
            Err(SkelError::NotConfigured("imaging"))
        );
    }

    #[test]
    fn sensor_out_of_declared_range_is_rejected() {
        let (tok, _rx) = token(DeviceConfig::new("hand").with_skeleton(one_sensor_descriptor()));
        assert_eq!(
            tok.complete(1, TimeValue::ZERO),
            Err(SkelError::UnknownSensor(1))
        );
    }

    #[test]
    fn frame_buffer_length_is_validated() {
        let (tok, _rx) = token(DeviceConfig::new("camera").with_imaging(1));
        let meta = FrameMetadata {
            width: 4,
            height: 4,
            channels: 1,
            depth: 1,
        };
        assert_eq!(
            tok.send_frame(0, meta, &[0u8; 3], TimeValue::ZERO),
            Err(SkelError::InvalidArgument("frame buffer length"))
        );
        assert!(tok.send_frame(0, meta, &[0u8; 16], TimeValue::ZERO).is_ok());
    }

    #[test]
    fn guard_denied_after_receiver_drops() {
        let (tok, rx) = token(DeviceConfig::new("hand").with_skeleton(one_sensor_descriptor()));
        drop(rx);

        // First send discovers the closed channel and latches the flag.
        assert_eq!(
            tok.complete(0, TimeValue::ZERO),
            Err(SkelError::ConnectionClosed)
        );
        assert!(matches!(
            tok.send_guard(),
            Err(SkelError::ConnectionClosed)
        ));
    }
}
