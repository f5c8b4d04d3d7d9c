#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = ptcal_config::load_toml(data) {
        let _ = cfg.validate();
        for bank in &cfg.banks {
            let _ = bank.id();
            let _ = bank.payload_len();
        }
    }
});
