//! # skelkit - Client/plugin abstraction layer for VR skeleton tracking
//!
//! In-process device abstraction for tracked skeletons. Provides:
//! - A named-entity registry per skeleton sensor: stable joint/bone
//!   identifiers resolved to names and latest reported poses
//! - A pull-based client context that drains device reports and fires
//!   per-sensor callbacks at each reporting-cycle boundary
//! - A device-side reporting pipeline for synthetic or hardware plugins
//! - C FFI for integration with C/C++/Unity engines
//!
//! ## Quick Start
//! ```no_run
//! use skelkit::{
//!     ArticulationDesc, Context, DeviceConfig, EntityKind, Pose, SensorDesc,
//!     SkeletonDescriptor, TimeValue,
//! };
//!
//! let mut ctx = Context::new("com.example.skeleton-client");
//! let device = ctx
//!     .create_device(DeviceConfig::new("hand-tracker").with_skeleton(SkeletonDescriptor {
//!         sensors: vec![SensorDesc {
//!             joints: vec![ArticulationDesc::new(42, "l_wrist")],
//!             bones: vec![],
//!         }],
//!     }))
//!     .unwrap();
//!
//! ctx.on_skeleton(0, |timestamp, skeleton| {
//!     let id = skeleton.id_by_name(EntityKind::Joint, "l_wrist").unwrap();
//!     let report = skeleton.pose(EntityKind::Joint, id).unwrap();
//!     println!("{}s: wrist at {:?}", timestamp.seconds, report.pose.translation);
//! });
//!
//! device.send_joint_pose(0, 42, Pose::IDENTITY, TimeValue::now()).unwrap();
//! device.complete(0, TimeValue::now()).unwrap();
//! ctx.update();
//! ```

pub mod error;
pub mod types;
pub mod skeleton;
pub mod store;
pub mod context;
pub mod device;
pub mod ffi;

pub use context::{Context, SkeletonView};
pub use device::{DeviceConfig, DeviceToken, SendGuard};
pub use error::SkelError;
pub use skeleton::{EntityTable, Skeleton};
pub use store::{SkeletonStore, SlotHandle};
pub use types::*;

/// Result type alias for skelkit operations.
pub type Result<T> = std::result::Result<T, SkelError>;
