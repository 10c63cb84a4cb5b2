#![no_main]

use bucketscope_core::profile::AlgorithmProfile;
use bucketscope_core::{ConfigureRequest, RemoteReply};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&status_byte, body)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(body) else {
        return;
    };
    let status = 100 + u16::from(status_byte) * 2;

    let Ok(reply) = RemoteReply::from_body(status, text) else {
        return;
    };
    // Parsed replies always came from a JSON object.
    assert!(serde_json::from_str::<serde_json::Value>(text).is_ok_and(|v| v.is_object()));
    let _ = reply.message();
    let _ = reply.is_success();

    for profile in AlgorithmProfile::all() {
        let _ = reply.number(profile.current_field_name);
        if let (Some(capacity), Some(rate)) = (
            reply.number("capacity"),
            reply.number(profile.rate_parameter_name),
        ) {
            if capacity.is_finite() && capacity >= 1.0 && capacity < 1e15 && rate.is_finite() {
                let encoded = ConfigureRequest::new(profile, capacity as u64, rate.abs()).encode();
                assert!(encoded.starts_with("capacity="));
            }
        }
    }
});
