/// Identifier of a tracked entity within one kind's namespace.
///
/// Identifiers are engine-chosen, stable for the life of the registry, and
/// decoupled from enumeration order: `id_by_index(0)` is not necessarily `0`.
pub type EntityId = u32;

/// Sensor index within a device. Each sensor carries one skeleton.
pub type SensorId = u32;

/// The two parallel kinds of tracked entities in a skeleton.
///
/// A joint and a bone may share a numeric identifier value without collision.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Joint = 0,
    Bone = 1,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Joint => f.write_str("joint"),
            EntityKind::Bone => f.write_str("bone"),
        }
    }
}

/// Rigid transform describing an entity's spatial state.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation in meters [x, y, z].
    pub translation: [f64; 3],
    /// Rotation quaternion [qx, qy, qz, qw].
    pub rotation: [f64; 4],
}

impl Pose {
    /// Identity transform: zero translation, unit quaternion.
    pub const IDENTITY: Pose = Pose {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };
}

/// Wall-clock timestamp attached to reports, split like a C timeval.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeValue {
    pub seconds: i64,
    pub microseconds: i32,
}

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue {
        seconds: 0,
        microseconds: 0,
    };

    /// Current wall-clock time.
    pub fn now() -> TimeValue {
        match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(d) => TimeValue {
                seconds: d.as_secs() as i64,
                microseconds: d.subsec_micros() as i32,
            },
            Err(_) => TimeValue::ZERO,
        }
    }
}

/// A pose together with the timestamp of the report that produced it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseReport {
    pub pose: Pose,
    pub timestamp: TimeValue,
}

/// Metadata describing one imaging frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Channels per pixel (1 = grayscale, 3 = RGB, ...).
    pub channels: u8,
    /// Bytes per channel element.
    pub depth: u8,
}

impl FrameMetadata {
    /// Expected buffer size for a frame with this metadata.
    pub fn buffer_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize * self.depth as usize
    }
}

bitflags::bitflags! {
    /// Interfaces a device has configured before init.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const SKELETON = 1 << 0;
        const IMAGING  = 1 << 1;
    }
}

/// One named articulation (joint or bone) in a skeleton descriptor.
#[derive(Debug, Clone)]
pub struct ArticulationDesc {
    pub id: EntityId,
    pub name: String,
}

impl ArticulationDesc {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Articulation layout of one skeleton sensor.
#[derive(Debug, Clone, Default)]
pub struct SensorDesc {
    pub joints: Vec<ArticulationDesc>,
    pub bones: Vec<ArticulationDesc>,
}

/// Articulation layout a skeleton device announces at configure time.
///
/// Plain data, assembled in code. Sensors are indexed by position.
#[derive(Debug, Clone, Default)]
pub struct SkeletonDescriptor {
    pub sensors: Vec<SensorDesc>,
}

/// One report delivered from a device to the owning client context.
///
/// Pose reports are staged per sensor and become visible to readers at the
/// next `Complete` marker for that sensor.
#[derive(Debug, Clone)]
pub(crate) enum Report {
    /// Articulation layout, sent once when the device is created.
    Descriptor {
        device: String,
        descriptor: SkeletonDescriptor,
    },
    /// Incremental registration of a named entity.
    Announce {
        sensor: SensorId,
        kind: EntityKind,
        id: EntityId,
        name: String,
    },
    /// Latest pose for one identifier.
    Pose {
        sensor: SensorId,
        kind: EntityKind,
        id: EntityId,
        pose: Pose,
        timestamp: TimeValue,
    },
    /// Batch-boundary marker: all updates for this sensor's cycle are in.
    Complete {
        sensor: SensorId,
        timestamp: TimeValue,
    },
    /// One imaging frame.
    Frame {
        sensor: SensorId,
        metadata: FrameMetadata,
        data: Vec<u8>,
        timestamp: TimeValue,
    },
}
