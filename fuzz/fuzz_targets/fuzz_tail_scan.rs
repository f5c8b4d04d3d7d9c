#![no_main]
use libfuzzer_sys::fuzz_target;
use ptcal_core::store::read_tail_lines;
use std::io::Cursor;

fuzz_target!(|input: (u8, u16, &[u8])| {
    let (n, window, log) = input;
    let mut cur = Cursor::new(log);
    if let Ok(lines) = read_tail_lines(&mut cur, usize::from(n % 8), u64::from(window)) {
        assert!(lines.len() <= usize::from(n % 8));
        assert!(lines.iter().all(|l| !l.contains('\n')));
    }
});
