//! Consume skeleton reports from a synthetic two-hand tracking device.
//!
//! A producer thread plays the device: it announces two skeleton sensors
//! (left and right hand), then reports a slowly waving pose for every joint
//! and closes each cycle with a completion marker. The main loop polls the
//! client context and prints whatever the registry holds at each cycle.
//!
//! Usage: cargo run --example skeleton_callback

use skelkit::{
    ArticulationDesc, Context, DeviceConfig, EntityKind, Pose, SensorDesc, SkeletonDescriptor,
    TimeValue,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const CYCLES_TO_REPORT: u32 = 10;

fn hand(prefix: &str) -> SensorDesc {
    let joints = ["wrist", "thumb", "index", "middle", "ring", "pinky"];
    SensorDesc {
        joints: joints
            .iter()
            .enumerate()
            .map(|(i, j)| ArticulationDesc::new(i as u32 * 10, format!("{}_{}", prefix, j)))
            .collect(),
        bones: vec![
            ArticulationDesc::new(0, format!("{}_palm", prefix)),
            ArticulationDesc::new(1, format!("{}_forearm", prefix)),
        ],
    }
}

fn main() {
    env_logger::init();

    let mut ctx = Context::new("com.example.skeleton-callback");
    let device = ctx
        .create_device(
            DeviceConfig::new("synthetic-hands").with_skeleton(SkeletonDescriptor {
                sensors: vec![hand("l"), hand("r")],
            }),
        )
        .expect("attach device");

    let cycles = Arc::new(AtomicU32::new(0));
    for sensor in 0..2 {
        let cycles = Arc::clone(&cycles);
        ctx.on_skeleton(sensor, move |timestamp, skeleton| {
            cycles.fetch_add(1, Ordering::Relaxed);
            println!("-----------");
            println!(
                "sensor {} at {}:{:06}",
                skeleton.sensor(),
                timestamp.seconds,
                timestamp.microseconds
            );

            for kind in [EntityKind::Joint, EntityKind::Bone] {
                let count = skeleton.count(kind).expect("count");
                println!("  {} {}(s):", count, kind);
                for index in 0..count {
                    let id = skeleton.id_by_index(kind, index).expect("id by index");
                    let name = skeleton.name(kind, id).expect("name");
                    match skeleton.pose(kind, id) {
                        Ok(report) => println!(
                            "    {:<10} id={:<3} pos=[{:+.3}, {:+.3}, {:+.3}]",
                            name,
                            id,
                            report.pose.translation[0],
                            report.pose.translation[1],
                            report.pose.translation[2],
                        ),
                        Err(e) => println!("    {:<10} id={:<3} ({})", name, id, e),
                    }
                }
            }

            // Name-based resolution works without enumerating first.
            if let Ok(id) = skeleton.id_by_name(EntityKind::Joint, "l_wrist") {
                println!("  'l_wrist' resolves to id {}", id);
            }
        });
    }

    // Producer thread: one pose cycle per sensor every 50ms.
    let producer = std::thread::spawn(move || {
        let mut val: f64 = 1.0;
        loop {
            let wave = val.sin() * 0.25;
            let timestamp = TimeValue::now();
            for sensor in 0..2 {
                for joint in 0..6u32 {
                    let pose = Pose {
                        translation: [joint as f64 * 0.05, wave, 0.0],
                        rotation: [0.0, 0.0, 0.0, 1.0],
                    };
                    if device.send_joint_pose(sensor, joint * 10, pose, timestamp).is_err() {
                        return; // client context gone
                    }
                }
                for bone in 0..2u32 {
                    let pose = Pose {
                        translation: [0.0, wave * 0.5, bone as f64 * 0.1],
                        rotation: [0.0, 0.0, 0.0, 1.0],
                    };
                    if device.send_bone_pose(sensor, bone, pose, timestamp).is_err() {
                        return;
                    }
                }
                if device.complete(sensor, timestamp).is_err() {
                    return;
                }
            }
            val += 0.01;
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    // Application main loop: poll until enough cycles were observed.
    while cycles.load(Ordering::Relaxed) < CYCLES_TO_REPORT {
        ctx.update();
        std::thread::sleep(Duration::from_millis(10));
    }

    drop(ctx); // closes the connection; the producer sees it and stops
    let _ = producer.join();
    println!("Client context shut down, exiting.");
}
