#![no_main]

use bucketscope_core::RateLimiterModel;
use bucketscope_core::profile::{InitialLevel, LEAKY_BUCKET, TOKEN_BUCKET};
use libfuzzer_sys::fuzz_target;

fn f64_from(bytes: &[u8]) -> f64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    f64::from_le_bytes(buf)
}

fn u64_from(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = bytes.len().min(8);
    buf[..n].copy_from_slice(&bytes[..n]);
    u64::from_le_bytes(buf)
}

fn assert_in_range(model: &RateLimiterModel) {
    let level = model.level();
    assert!(
        (0.0..=model.capacity()).contains(&level),
        "level {level} outside [0, {}]",
        model.capacity()
    );
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let profile = if data[0] & 1 == 0 {
        &TOKEN_BUCKET
    } else {
        &LEAKY_BUCKET
    };
    // Small positive capacity/rate so evolution actually moves.
    let capacity = f64::from(data[1].max(1));
    let rate = f64::from(data[2]) / 4.0;
    let Ok(mut model) = RateLimiterModel::new(profile, capacity, rate, 0) else {
        return;
    };
    assert_in_range(&model);

    let mut now = 0u64;
    for chunk in data[3..].chunks(9) {
        let op = chunk[0];
        let arg = &chunk[1..];
        match op % 4 {
            0 => {
                now = now.saturating_add(u64_from(arg) % 10_000);
                model.evolve(now);
            }
            1 => {
                // Arbitrary, possibly backward, timestamp.
                let before = model.level();
                model.evolve(u64_from(arg) % now.max(1));
                assert_eq!(model.level(), before);
            }
            2 => model.overwrite_level(f64_from(arg), now),
            _ => {
                let initial = if op & 0x80 == 0 {
                    InitialLevel::Full
                } else {
                    InitialLevel::Empty
                };
                let snapshot = model.clone();
                if model.reconfigure(f64_from(arg), rate, initial, now).is_err() {
                    assert_eq!(model, snapshot);
                }
            }
        }
        assert_in_range(&model);
        now = now.max(model.last_sync_ms());
    }
});
