//! C FFI layer for skelkit.
//!
//! Provides a handle-based API for C/C++ consumers: opaque pointers for the
//! context and device objects, and a by-value generation-checked handle for
//! skeletons. All functions return 0 on success and -1 on failure; the
//! specific failure kind is available via `skel_last_error()`. The generated
//! C header is written to `include/skelkit.h` by cbindgen.

use crate::context::Context;
use crate::device::{DeviceConfig, DeviceToken};
use crate::error::LastError;
use crate::skeleton::Skeleton;
use crate::store::{SkeletonStore, SlotHandle};
use crate::types::{
    ArticulationDesc, EntityId, EntityKind, FrameMetadata, Pose, SensorDesc, SkeletonDescriptor,
    TimeValue,
};
use crate::{Result, SkelError};
use std::ffi::{c_char, c_int, c_void, CStr};

/// Thread-safe last error message for C consumers.
static LAST_ERROR: LastError = LastError::new();

/// Opaque client context handle for C consumers.
pub struct SkelContext(Context);

/// Opaque device handle for C consumers.
pub struct SkelDevice(DeviceToken);

/// Opaque device configuration being assembled before `skel_device_create`.
pub struct SkelDeviceConfig {
    name: String,
    skeleton: Option<SkeletonDescriptor>,
    imaging_sensors: u32,
}

/// Generation-checked skeleton handle, passed by value.
///
/// Valid until the owning context is destroyed; a handle whose skeleton was
/// detached in the meantime is rejected by every accessor.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SkelSkeleton {
    store: *const SkeletonStore,
    slot: u32,
    generation: u32,
}

/// Joint pose state returned by `skel_skeleton_joint_state`.
#[repr(C)]
pub struct SkelJointState {
    pub joint_id: u32,
    pub pose: Pose,
    pub timestamp: TimeValue,
}

/// Bone pose state returned by `skel_skeleton_bone_state`.
#[repr(C)]
pub struct SkelBoneState {
    pub bone_id: u32,
    pub pose: Pose,
    pub timestamp: TimeValue,
}

/// Skeleton report passed to skeleton callbacks at each completion marker.
#[repr(C)]
pub struct SkelSkeletonReport {
    pub sensor: u32,
    pub skeleton: SkelSkeleton,
}

/// Imaging report passed to frame callbacks. `data` is only valid for the
/// duration of the callback.
#[repr(C)]
pub struct SkelFrameReport {
    pub sensor: u32,
    pub metadata: FrameMetadata,
    pub data: *const u8,
    pub data_len: usize,
}

pub type SkelSkeletonCallback = Option<
    extern "C" fn(userdata: *mut c_void, timestamp: *const TimeValue, report: *const SkelSkeletonReport),
>;

pub type SkelFrameCallback = Option<
    extern "C" fn(userdata: *mut c_void, timestamp: *const TimeValue, report: *const SkelFrameReport),
>;

fn failure(err: SkelError) -> c_int {
    LAST_ERROR.set(&err);
    -1
}

unsafe fn name_arg(name: *const c_char) -> Result<&'static str> {
    if name.is_null() {
        return Err(SkelError::InvalidArgument("name"));
    }
    CStr::from_ptr(name)
        .to_str()
        .map_err(|_| SkelError::InvalidArgument("name"))
}

/// Run a read against the skeleton behind a C handle.
unsafe fn with_skeleton<R>(
    handle: SkelSkeleton,
    f: impl FnOnce(&Skeleton) -> Result<R>,
) -> Result<R> {
    if handle.store.is_null() {
        return Err(SkelError::InvalidHandle);
    }
    let store = &*handle.store;
    store.with(
        SlotHandle {
            slot: handle.slot,
            generation: handle.generation,
        },
        f,
    )
}

// -- Context lifecycle --

/// Create a client context. Returns NULL on error (check skel_last_error()).
///
/// # Safety
/// `app_id` must be a null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_context_create(app_id: *const c_char) -> *mut SkelContext {
    if app_id.is_null() {
        failure(SkelError::InvalidArgument("app_id"));
        return std::ptr::null_mut();
    }
    let app_id = CStr::from_ptr(app_id).to_string_lossy().into_owned();
    Box::into_raw(Box::new(SkelContext(Context::new(app_id))))
}

/// Destroy a context and free its resources. Outstanding skeleton handles
/// become invalid.
///
/// # Safety
/// `ctx` must be a pointer returned by `skel_context_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_context_destroy(ctx: *mut SkelContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Drain and apply all pending device reports, firing registered callbacks.
/// Returns the number of reports processed, or -1 on error.
///
/// # Safety
/// `ctx` must be a valid context pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_context_update(ctx: *mut SkelContext) -> c_int {
    if ctx.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let ctx = &mut *ctx;
    ctx.0.update() as c_int
}

/// Get a skeleton handle for an attached sensor.
///
/// # Safety
/// `ctx` must be a valid context pointer or null; `skeleton` must point to a
/// `SkelSkeleton`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_context_skeleton(
    ctx: *const SkelContext,
    sensor: u32,
    skeleton: *mut SkelSkeleton,
) -> c_int {
    if ctx.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if skeleton.is_null() {
        return failure(SkelError::InvalidArgument("skeleton"));
    }
    let ctx = &*ctx;
    match ctx.0.skeleton(sensor) {
        Ok(view) => {
            let (store, handle) = view.raw_parts();
            skeleton.write(SkelSkeleton {
                store,
                slot: handle.slot,
                generation: handle.generation,
            });
            0
        }
        Err(e) => failure(e),
    }
}

/// Register a callback fired at each completion marker for `sensor`.
///
/// # Safety
/// `ctx` must be a valid context pointer or null. `userdata` is passed back
/// verbatim and must stay valid as long as the callback can fire.
#[no_mangle]
pub unsafe extern "C" fn skel_register_skeleton_callback(
    ctx: *mut SkelContext,
    sensor: u32,
    callback: SkelSkeletonCallback,
    userdata: *mut c_void,
) -> c_int {
    if ctx.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let callback = match callback {
        Some(cb) => cb,
        None => return failure(SkelError::InvalidArgument("callback")),
    };
    let ctx = &mut *ctx;
    let userdata = userdata as usize;
    ctx.0.on_skeleton(sensor, move |timestamp, view| {
        let (store, handle) = view.raw_parts();
        let report = SkelSkeletonReport {
            sensor: view.sensor(),
            skeleton: SkelSkeleton {
                store,
                slot: handle.slot,
                generation: handle.generation,
            },
        };
        callback(userdata as *mut c_void, timestamp, &report);
    });
    0
}

/// Register a callback fired for each imaging frame from `sensor`.
///
/// # Safety
/// `ctx` must be a valid context pointer or null. `userdata` is passed back
/// verbatim and must stay valid as long as the callback can fire.
#[no_mangle]
pub unsafe extern "C" fn skel_register_frame_callback(
    ctx: *mut SkelContext,
    sensor: u32,
    callback: SkelFrameCallback,
    userdata: *mut c_void,
) -> c_int {
    if ctx.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let callback = match callback {
        Some(cb) => cb,
        None => return failure(SkelError::InvalidArgument("callback")),
    };
    let ctx = &mut *ctx;
    let userdata = userdata as usize;
    ctx.0.on_frame(sensor, move |timestamp, metadata, data| {
        let report = SkelFrameReport {
            sensor,
            metadata: *metadata,
            data: data.as_ptr(),
            data_len: data.len(),
        };
        callback(userdata as *mut c_void, timestamp, &report);
    });
    0
}

// -- Skeleton read API --

unsafe fn entity_count(skel: SkelSkeleton, kind: EntityKind, out: *mut u32) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if out.is_null() {
        return failure(SkelError::InvalidArgument("count"));
    }
    match with_skeleton(skel, |s| Ok(s.count(kind))) {
        Ok(count) => {
            out.write(count);
            0
        }
        Err(e) => failure(e),
    }
}

unsafe fn entity_id_by_name(
    skel: SkelSkeleton,
    kind: EntityKind,
    name: *const c_char,
    out: *mut u32,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if out.is_null() {
        return failure(SkelError::InvalidArgument("id"));
    }
    let name = match name_arg(name) {
        Ok(n) => n,
        Err(e) => return failure(e),
    };
    match with_skeleton(skel, |s| s.id_by_name(kind, name)) {
        Ok(id) => {
            out.write(id);
            0
        }
        Err(e) => failure(e),
    }
}

unsafe fn entity_id_by_index(
    skel: SkelSkeleton,
    kind: EntityKind,
    index: u32,
    out: *mut u32,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if out.is_null() {
        return failure(SkelError::InvalidArgument("id"));
    }
    match with_skeleton(skel, |s| s.id_by_index(kind, index)) {
        Ok(id) => {
            out.write(id);
            0
        }
        Err(e) => failure(e),
    }
}

unsafe fn entity_name_len(
    skel: SkelSkeleton,
    kind: EntityKind,
    id: EntityId,
    out: *mut u32,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if out.is_null() {
        return failure(SkelError::InvalidArgument("len"));
    }
    match with_skeleton(skel, |s| s.name_len(kind, id)) {
        Ok(len) => {
            out.write(len);
            0
        }
        Err(e) => failure(e),
    }
}

unsafe fn entity_name(
    skel: SkelSkeleton,
    kind: EntityKind,
    id: EntityId,
    name: *mut c_char,
    len: u32,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if name.is_null() {
        return failure(SkelError::InvalidArgument("name"));
    }
    let out = std::slice::from_raw_parts_mut(name as *mut u8, len as usize);
    match with_skeleton(skel, |s| s.copy_name_to(kind, id, out)) {
        Ok(_) => 0,
        Err(e) => failure(e),
    }
}

unsafe fn entity_state(
    skel: SkelSkeleton,
    kind: EntityKind,
    id: EntityId,
) -> Result<crate::types::PoseReport> {
    if skel.store.is_null() {
        return Err(SkelError::InvalidHandle);
    }
    with_skeleton(skel, |s| s.pose(kind, id))
}

/// Get the number of joints in the skeleton.
///
/// # Safety
/// `num_joints` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_num_joints(
    skel: SkelSkeleton,
    num_joints: *mut u32,
) -> c_int {
    entity_count(skel, EntityKind::Joint, num_joints)
}

/// Get the number of bones in the skeleton.
///
/// # Safety
/// `num_bones` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_num_bones(skel: SkelSkeleton, num_bones: *mut u32) -> c_int {
    entity_count(skel, EntityKind::Bone, num_bones)
}

/// Resolve a joint name to its identifier.
///
/// # Safety
/// `name` must be a null-terminated string or null; `joint_id` must point to
/// a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_joint_id(
    skel: SkelSkeleton,
    name: *const c_char,
    joint_id: *mut u32,
) -> c_int {
    entity_id_by_name(skel, EntityKind::Joint, name, joint_id)
}

/// Resolve a bone name to its identifier.
///
/// # Safety
/// `name` must be a null-terminated string or null; `bone_id` must point to
/// a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_bone_id(
    skel: SkelSkeleton,
    name: *const c_char,
    bone_id: *mut u32,
) -> c_int {
    entity_id_by_name(skel, EntityKind::Bone, name, bone_id)
}

/// Get the joint identifier at enumeration position `index`
/// (`0 <= index < skel_skeleton_num_joints`).
///
/// # Safety
/// `joint_id` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_available_joint_id(
    skel: SkelSkeleton,
    index: u32,
    joint_id: *mut u32,
) -> c_int {
    entity_id_by_index(skel, EntityKind::Joint, index, joint_id)
}

/// Get the bone identifier at enumeration position `index`
/// (`0 <= index < skel_skeleton_num_bones`).
///
/// # Safety
/// `bone_id` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_available_bone_id(
    skel: SkelSkeleton,
    index: u32,
    bone_id: *mut u32,
) -> c_int {
    entity_id_by_index(skel, EntityKind::Bone, index, bone_id)
}

/// Get the buffer length needed for a joint name, terminator included.
/// Writes 0 for an unnamed joint.
///
/// # Safety
/// `len` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_joint_name_len(
    skel: SkelSkeleton,
    joint_id: u32,
    len: *mut u32,
) -> c_int {
    entity_name_len(skel, EntityKind::Joint, joint_id, len)
}

/// Get the buffer length needed for a bone name, terminator included.
/// Writes 0 for an unnamed bone.
///
/// # Safety
/// `len` must point to a `uint32_t`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_bone_name_len(
    skel: SkelSkeleton,
    bone_id: u32,
    len: *mut u32,
) -> c_int {
    entity_name_len(skel, EntityKind::Bone, bone_id, len)
}

/// Copy a joint's null-terminated name into a caller buffer of `len` bytes.
/// Fails without writing if the buffer is too small.
///
/// # Safety
/// `name` must point to at least `len` writable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_joint_name(
    skel: SkelSkeleton,
    joint_id: u32,
    name: *mut c_char,
    len: u32,
) -> c_int {
    entity_name(skel, EntityKind::Joint, joint_id, name, len)
}

/// Copy a bone's null-terminated name into a caller buffer of `len` bytes.
/// Fails without writing if the buffer is too small.
///
/// # Safety
/// `name` must point to at least `len` writable bytes, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_bone_name(
    skel: SkelSkeleton,
    bone_id: u32,
    name: *mut c_char,
    len: u32,
) -> c_int {
    entity_name(skel, EntityKind::Bone, bone_id, name, len)
}

/// Get a joint's latest committed pose. Fails if the joint is unknown or no
/// report has been committed yet; `state` is untouched on failure.
///
/// # Safety
/// `state` must point to a `SkelJointState`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_joint_state(
    skel: SkelSkeleton,
    joint_id: u32,
    state: *mut SkelJointState,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if state.is_null() {
        return failure(SkelError::InvalidArgument("state"));
    }
    match entity_state(skel, EntityKind::Joint, joint_id) {
        Ok(report) => {
            state.write(SkelJointState {
                joint_id,
                pose: report.pose,
                timestamp: report.timestamp,
            });
            0
        }
        Err(e) => failure(e),
    }
}

/// Get a bone's latest committed pose. Fails if the bone is unknown or no
/// report has been committed yet; `state` is untouched on failure.
///
/// # Safety
/// `state` must point to a `SkelBoneState`, or be null.
#[no_mangle]
pub unsafe extern "C" fn skel_skeleton_bone_state(
    skel: SkelSkeleton,
    bone_id: u32,
    state: *mut SkelBoneState,
) -> c_int {
    if skel.store.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if state.is_null() {
        return failure(SkelError::InvalidArgument("state"));
    }
    match entity_state(skel, EntityKind::Bone, bone_id) {
        Ok(report) => {
            state.write(SkelBoneState {
                bone_id,
                pose: report.pose,
                timestamp: report.timestamp,
            });
            0
        }
        Err(e) => failure(e),
    }
}

// -- Device API --

/// Start assembling a device configuration. Returns NULL on error.
///
/// # Safety
/// `name` must be a null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_create(name: *const c_char) -> *mut SkelDeviceConfig {
    let name = match name_arg(name) {
        Ok(n) => n.to_string(),
        Err(e) => {
            failure(e);
            return std::ptr::null_mut();
        }
    };
    Box::into_raw(Box::new(SkelDeviceConfig {
        name,
        skeleton: None,
        imaging_sensors: 0,
    }))
}

/// Free a device configuration without creating a device.
///
/// # Safety
/// `config` must be a pointer returned by `skel_device_config_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_destroy(config: *mut SkelDeviceConfig) {
    if !config.is_null() {
        drop(Box::from_raw(config));
    }
}

/// Configure the skeleton interface with `sensors` skeleton sensors.
///
/// # Safety
/// `config` must be a valid configuration pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_skeleton(
    config: *mut SkelDeviceConfig,
    sensors: u32,
) -> c_int {
    if config.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let config = &mut *config;
    config.skeleton = Some(SkeletonDescriptor {
        sensors: (0..sensors).map(|_| SensorDesc::default()).collect(),
    });
    0
}

unsafe fn config_add_entity(
    config: *mut SkelDeviceConfig,
    sensor: u32,
    kind: EntityKind,
    id: u32,
    name: *const c_char,
) -> c_int {
    if config.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let name = match name_arg(name) {
        Ok(n) => n,
        Err(e) => return failure(e),
    };
    let config = &mut *config;
    let descriptor = match config.skeleton.as_mut() {
        Some(d) => d,
        None => return failure(SkelError::NotConfigured("skeleton")),
    };
    let desc = match descriptor.sensors.get_mut(sensor as usize) {
        Some(d) => d,
        None => return failure(SkelError::UnknownSensor(sensor)),
    };
    let list = match kind {
        EntityKind::Joint => &mut desc.joints,
        EntityKind::Bone => &mut desc.bones,
    };
    list.push(ArticulationDesc::new(id, name));
    0
}

/// Add a named joint to a sensor of the skeleton descriptor.
///
/// # Safety
/// `config` must be a valid configuration pointer or null; `name` must be a
/// null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_add_joint(
    config: *mut SkelDeviceConfig,
    sensor: u32,
    joint_id: u32,
    name: *const c_char,
) -> c_int {
    config_add_entity(config, sensor, EntityKind::Joint, joint_id, name)
}

/// Add a named bone to a sensor of the skeleton descriptor.
///
/// # Safety
/// `config` must be a valid configuration pointer or null; `name` must be a
/// null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_add_bone(
    config: *mut SkelDeviceConfig,
    sensor: u32,
    bone_id: u32,
    name: *const c_char,
) -> c_int {
    config_add_entity(config, sensor, EntityKind::Bone, bone_id, name)
}

/// Configure the imaging interface for `sensors` frame sources.
///
/// # Safety
/// `config` must be a valid configuration pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_config_imaging(
    config: *mut SkelDeviceConfig,
    sensors: u32,
) -> c_int {
    if config.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let config = &mut *config;
    config.imaging_sensors = sensors;
    0
}

/// Attach a device to the context. The configuration is consumed regardless
/// of outcome. Returns NULL on error.
///
/// # Safety
/// `ctx` must be a valid context pointer or null; `config` must be a pointer
/// returned by `skel_device_config_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_create(
    ctx: *const SkelContext,
    config: *mut SkelDeviceConfig,
) -> *mut SkelDevice {
    if ctx.is_null() {
        failure(SkelError::InvalidHandle);
        return std::ptr::null_mut();
    }
    if config.is_null() {
        failure(SkelError::InvalidArgument("config"));
        return std::ptr::null_mut();
    }
    let ctx = &*ctx;
    let config = *Box::from_raw(config);

    let mut device_config = DeviceConfig::new(config.name);
    if let Some(descriptor) = config.skeleton {
        device_config = device_config.with_skeleton(descriptor);
    }
    if config.imaging_sensors > 0 {
        device_config = device_config.with_imaging(config.imaging_sensors);
    }

    match ctx.0.create_device(device_config) {
        Ok(token) => Box::into_raw(Box::new(SkelDevice(token))),
        Err(e) => {
            failure(e);
            std::ptr::null_mut()
        }
    }
}

/// Detach a device and free its resources.
///
/// # Safety
/// `dev` must be a pointer returned by `skel_device_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_destroy(dev: *mut SkelDevice) {
    if !dev.is_null() {
        drop(Box::from_raw(dev));
    }
}

/// Register a joint discovered after configure time.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `name` must be a
/// null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_announce_joint(
    dev: *const SkelDevice,
    sensor: u32,
    joint_id: u32,
    name: *const c_char,
) -> c_int {
    if dev.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let name = match name_arg(name) {
        Ok(n) => n,
        Err(e) => return failure(e),
    };
    let dev = &*dev;
    match dev.0.announce_joint(sensor, joint_id, name) {
        Ok(()) => 0,
        Err(e) => failure(e),
    }
}

/// Register a bone discovered after configure time.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `name` must be a
/// null-terminated string, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_announce_bone(
    dev: *const SkelDevice,
    sensor: u32,
    bone_id: u32,
    name: *const c_char,
) -> c_int {
    if dev.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    let name = match name_arg(name) {
        Ok(n) => n,
        Err(e) => return failure(e),
    };
    let dev = &*dev;
    match dev.0.announce_bone(sensor, bone_id, name) {
        Ok(()) => 0,
        Err(e) => failure(e),
    }
}

unsafe fn device_send_pose(
    dev: *const SkelDevice,
    sensor: u32,
    kind: EntityKind,
    id: u32,
    pose: *const Pose,
    timestamp: *const TimeValue,
) -> c_int {
    if dev.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if pose.is_null() {
        return failure(SkelError::InvalidArgument("pose"));
    }
    if timestamp.is_null() {
        return failure(SkelError::InvalidArgument("timestamp"));
    }
    let dev = &*dev;
    let result = match kind {
        EntityKind::Joint => dev.0.send_joint_pose(sensor, id, *pose, *timestamp),
        EntityKind::Bone => dev.0.send_bone_pose(sensor, id, *pose, *timestamp),
    };
    match result {
        Ok(()) => 0,
        Err(e) => failure(e),
    }
}

/// Report the latest pose for one joint.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `pose` and `timestamp` must
/// be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_send_joint_pose(
    dev: *const SkelDevice,
    sensor: u32,
    joint_id: u32,
    pose: *const Pose,
    timestamp: *const TimeValue,
) -> c_int {
    device_send_pose(dev, sensor, EntityKind::Joint, joint_id, pose, timestamp)
}

/// Report the latest pose for one bone.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `pose` and `timestamp` must
/// be valid pointers, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_send_bone_pose(
    dev: *const SkelDevice,
    sensor: u32,
    bone_id: u32,
    pose: *const Pose,
    timestamp: *const TimeValue,
) -> c_int {
    device_send_pose(dev, sensor, EntityKind::Bone, bone_id, pose, timestamp)
}

/// Mark the end of one reporting cycle for `sensor`. All pose reports sent
/// since the previous marker become visible to clients together.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `timestamp` must be a valid
/// pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn skel_device_skeleton_complete(
    dev: *const SkelDevice,
    sensor: u32,
    timestamp: *const TimeValue,
) -> c_int {
    if dev.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if timestamp.is_null() {
        return failure(SkelError::InvalidArgument("timestamp"));
    }
    let dev = &*dev;
    match dev.0.complete(sensor, *timestamp) {
        Ok(()) => 0,
        Err(e) => failure(e),
    }
}

/// Report one imaging frame. `data` must hold exactly
/// `width * height * channels * depth` bytes.
///
/// # Safety
/// `dev` must be a valid device pointer or null; `metadata`, `data`, and
/// `timestamp` must be valid pointers, or null; `data` must point to at
/// least `data_len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn skel_device_send_frame(
    dev: *const SkelDevice,
    sensor: u32,
    metadata: *const FrameMetadata,
    data: *const u8,
    data_len: usize,
    timestamp: *const TimeValue,
) -> c_int {
    if dev.is_null() {
        return failure(SkelError::InvalidHandle);
    }
    if metadata.is_null() {
        return failure(SkelError::InvalidArgument("metadata"));
    }
    if data.is_null() {
        return failure(SkelError::InvalidArgument("data"));
    }
    if timestamp.is_null() {
        return failure(SkelError::InvalidArgument("timestamp"));
    }
    let dev = &*dev;
    let data = std::slice::from_raw_parts(data, data_len);
    match dev.0.send_frame(sensor, *metadata, data, *timestamp) {
        Ok(()) => 0,
        Err(e) => failure(e),
    }
}

/// Get the last error message. Returns NULL if no error.
/// The returned pointer is valid until the next skelkit API call.
#[no_mangle]
pub extern "C" fn skel_last_error() -> *const c_char {
    LAST_ERROR.as_ptr()
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

    /// Context with one attached skeleton: joint 42 "l_wrist" posed, joint 7
    /// "l_elbow" announced but never reported.
    fn fixture() -> (Context, SkelSkeleton) {
        let mut ctx = Context::new("test.ffi");
        let device = ctx
            .create_device(DeviceConfig::new("hand").with_skeleton(SkeletonDescriptor {
                sensors: vec![SensorDesc {
                    joints: vec![
                        ArticulationDesc::new(42, "l_wrist"),
                        ArticulationDesc::new(7, "l_elbow"),
                    ],
                    bones: vec![ArticulationDesc::new(3, "l_forearm")],
                }],
            }))
            .unwrap();
        device
            .send_joint_pose(0, 42, Pose::IDENTITY, ts(1))
            .unwrap();
        device.complete(0, ts(1)).unwrap();
        ctx.update();

        let view = ctx.skeleton(0).unwrap();
        let (store, handle) = view.raw_parts();
        let skel = SkelSkeleton {
            store,
            slot: handle.slot,
            generation: handle.generation,
        };
        (ctx, skel)
    }

    fn null_handle() -> SkelSkeleton {
        SkelSkeleton {
            store: std::ptr::null(),
            slot: 0,
            generation: 0,
        }
    }

    #[test]
    fn counts_and_ids_resolve() {
        let (_ctx, skel) = fixture();
        unsafe {
            let mut n = 0u32;
            assert_eq!(skel_skeleton_num_joints(skel, &mut n), 0);
            assert_eq!(n, 2);
            assert_eq!(skel_skeleton_num_bones(skel, &mut n), 0);
            assert_eq!(n, 1);

            let mut id = 0u32;
            let name = CStr::from_bytes_with_nul(b"l_wrist\0").unwrap();
            assert_eq!(skel_skeleton_joint_id(skel, name.as_ptr(), &mut id), 0);
            assert_eq!(id, 42);

            assert_eq!(skel_skeleton_available_joint_id(skel, 1, &mut id), 0);
            assert_eq!(id, 7);
            // Boundary: index == count fails.
            assert_eq!(skel_skeleton_available_joint_id(skel, 2, &mut id), -1);
        }
    }

    #[test]
    fn name_length_then_copy_round_trips() {
        let (_ctx, skel) = fixture();
        unsafe {
            let mut len = 0u32;
            assert_eq!(skel_skeleton_joint_name_len(skel, 42, &mut len), 0);
            assert_eq!(len, 8); // "l_wrist" + NUL

            let mut buf = [0x7Fi8 as c_char; 8];
            assert_eq!(
                skel_skeleton_joint_name(skel, 42, buf.as_mut_ptr(), len),
                0
            );
            let name = CStr::from_ptr(buf.as_ptr());
            assert_eq!(name.to_str().unwrap(), "l_wrist");
        }
    }

    #[test]
    fn short_buffer_fails_and_leaves_buffer_alone() {
        let (_ctx, skel) = fixture();
        unsafe {
            let mut len = 0u32;
            assert_eq!(skel_skeleton_joint_name_len(skel, 42, &mut len), 0);

            let mut buf = vec![0x55i8 as c_char; (len - 1) as usize];
            assert_eq!(
                skel_skeleton_joint_name(skel, 42, buf.as_mut_ptr(), len - 1),
                -1
            );
            assert!(buf.iter().all(|&c| c == 0x55));

            // Exactly the required capacity succeeds.
            let mut buf = vec![0i8 as c_char; len as usize];
            assert_eq!(
                skel_skeleton_joint_name(skel, 42, buf.as_mut_ptr(), len),
                0
            );
        }
    }

    #[test]
    fn pose_state_is_tri_state_across_the_boundary() {
        let (_ctx, skel) = fixture();
        unsafe {
            let mut state = SkelJointState {
                joint_id: 0,
                pose: Pose::IDENTITY,
                timestamp: ts(0),
            };
            assert_eq!(skel_skeleton_joint_state(skel, 42, &mut state), 0);
            assert_eq!(state.joint_id, 42);
            assert_eq!(state.timestamp, ts(1));

            // Announced but never reported: failure, state untouched.
            state.joint_id = 1234;
            assert_eq!(skel_skeleton_joint_state(skel, 7, &mut state), -1);
            assert_eq!(state.joint_id, 1234);

            // Unknown id: failure.
            assert_eq!(skel_skeleton_joint_state(skel, 1000, &mut state), -1);
        }
    }

    #[test]
    fn handle_is_checked_before_output_arguments() {
        unsafe {
            // Null handle beats null output pointer.
            assert_eq!(
                skel_skeleton_num_joints(null_handle(), std::ptr::null_mut()),
                -1
            );
            assert!(!skel_last_error().is_null());
            assert_eq!(
                with_skeleton(null_handle(), |_| Ok(())),
                Err(SkelError::InvalidHandle)
            );
            // Valid-shape handle with a null output pointer also fails.
            let (_ctx, skel) = fixture();
            assert_eq!(skel_skeleton_num_joints(skel, std::ptr::null_mut()), -1);
        }
    }

    #[test]
    fn stale_handles_are_rejected() {
        let (ctx, skel) = fixture();
        // Re-attaching the device replaces the sensor's skeleton; the old
        // handle's generation no longer matches.
        let device = ctx
            .create_device(DeviceConfig::new("hand").with_skeleton(SkeletonDescriptor {
                sensors: vec![SensorDesc::default()],
            }))
            .unwrap();
        drop(device);
        let mut ctx = ctx;
        ctx.update();

        unsafe {
            let mut n = 0u32;
            assert_eq!(skel_skeleton_num_joints(skel, &mut n), -1);

            // A freshly fetched handle for the same sensor works.
            let view = ctx.skeleton(0).unwrap();
            let (store, handle) = view.raw_parts();
            let fresh = SkelSkeleton {
                store,
                slot: handle.slot,
                generation: handle.generation,
            };
            assert_eq!(skel_skeleton_num_joints(fresh, &mut n), 0);
            assert_eq!(n, 0);
        }
    }

    #[test]
    fn full_c_lifecycle_with_callback() {
        extern "C" fn on_skeleton(
            userdata: *mut c_void,
            _timestamp: *const TimeValue,
            report: *const SkelSkeletonReport,
        ) {
            unsafe {
                let hits = &mut *(userdata as *mut u32);
                *hits += 1;
                let report = &*report;
                let mut id = 0u32;
                let name = CStr::from_bytes_with_nul(b"head\0").unwrap();
                assert_eq!(
                    skel_skeleton_joint_id(report.skeleton, name.as_ptr(), &mut id),
                    0
                );
                assert_eq!(id, 5);
            }
        }

        unsafe {
            let app = CStr::from_bytes_with_nul(b"test.c.lifecycle\0").unwrap();
            let ctx = skel_context_create(app.as_ptr());
            assert!(!ctx.is_null());

            let dev_name = CStr::from_bytes_with_nul(b"tracker\0").unwrap();
            let config = skel_device_config_create(dev_name.as_ptr());
            assert!(!config.is_null());
            assert_eq!(skel_device_config_skeleton(config, 1), 0);
            let joint = CStr::from_bytes_with_nul(b"head\0").unwrap();
            assert_eq!(skel_device_config_add_joint(config, 0, 5, joint.as_ptr()), 0);

            let dev = skel_device_create(ctx, config);
            assert!(!dev.is_null());

            let mut hits = 0u32;
            assert_eq!(
                skel_register_skeleton_callback(
                    ctx,
                    0,
                    Some(on_skeleton),
                    &mut hits as *mut u32 as *mut c_void,
                ),
                0
            );

            let pose = Pose::IDENTITY;
            let timestamp = ts(1);
            assert_eq!(skel_device_send_joint_pose(dev, 0, 5, &pose, &timestamp), 0);
            assert_eq!(skel_device_skeleton_complete(dev, 0, &timestamp), 0);

            // Descriptor + pose + completion marker.
            assert_eq!(skel_context_update(ctx), 3);
            assert_eq!(hits, 1);

            skel_device_destroy(dev);
            skel_context_destroy(ctx);
        }
    }
}
