#![no_main]
use libfuzzer_sys::fuzz_target;
use ptcal_core::{FrameLayout, decode};

fuzz_target!(|input: (u8, bool, &[u8])| {
    let (count, with_stop, frame) = input;
    let sensors = usize::from(count % 65).max(1);
    let layout = if with_stop {
        FrameLayout::new(sensors, b"\r\n")
    } else {
        FrameLayout::new(sensors, b"\n")
    };
    if let Ok(values) = decode(frame, &layout) {
        assert_eq!(values.len(), sensors);
    }
});
