//! Receive imaging frames from a synthetic camera device.
//!
//! The device reports a small grayscale test pattern at ~20 fps; the client
//! polls and prints per-frame statistics.
//!
//! Usage: cargo run --example imaging

use skelkit::{Context, DeviceConfig, FrameMetadata, TimeValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FRAMES_TO_REPORT: u32 = 20;
const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

fn main() {
    env_logger::init();

    let mut ctx = Context::new("com.example.imaging-client");
    let device = ctx
        .create_device(DeviceConfig::new("synthetic-camera").with_imaging(1))
        .expect("attach device");

    let frames = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&frames);
    ctx.on_frame(0, move |timestamp, metadata, data| {
        let n = seen.fetch_add(1, Ordering::Relaxed) + 1;
        let mean = data.iter().map(|&b| b as u64).sum::<u64>() / data.len() as u64;
        println!(
            "frame {:<3} {}x{} ({} bytes) mean={:<3} at {}:{:06}",
            n,
            metadata.width,
            metadata.height,
            data.len(),
            mean,
            timestamp.seconds,
            timestamp.microseconds,
        );
    });

    let producer = std::thread::spawn(move || {
        let metadata = FrameMetadata {
            width: WIDTH,
            height: HEIGHT,
            channels: 1,
            depth: 1,
        };
        let mut phase: u32 = 0;
        loop {
            // Moving vertical gradient so the per-frame mean visibly changes.
            let mut data = vec![0u8; metadata.buffer_len()];
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    data[(y * WIDTH + x) as usize] = ((x + phase) % 256) as u8;
                }
            }
            if device
                .send_frame(0, metadata, &data, TimeValue::now())
                .is_err()
            {
                return;
            }
            phase = phase.wrapping_add(8);
            std::thread::sleep(Duration::from_millis(50));
        }
    });

    while frames.load(Ordering::Relaxed) < FRAMES_TO_REPORT {
        ctx.update();
        std::thread::sleep(Duration::from_millis(10));
    }

    drop(ctx);
    let _ = producer.join();
    println!("Client context shut down, exiting.");
}
