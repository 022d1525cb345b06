#![no_main]

use libfuzzer_sys::fuzz_target;
use tune_core::{ParameterStore, ValidationErrors};
use tune_sync::wire::{decode_error_message, decode_metadata, decode_push, decode_version};

const MAX_BODY_BYTES: usize = 8192;

fuzz_target!(|data: &[u8]| {
    let body = &data[..data.len().min(MAX_BODY_BYTES)];

    let _ = decode_version(body);
    let _ = decode_error_message(body);
    let _ = decode_push(&String::from_utf8_lossy(body));

    // Whatever decodes must load into a store and validate without panicking.
    let Ok(metadata) = decode_metadata(body) else {
        return;
    };
    let mut store = ParameterStore::new();
    store.replace_all(metadata);
    let mut errors = ValidationErrors::new();
    errors.recompute(&store);
    for row in store.view() {
        assert!(store.value(&row.key).is_some());
    }
});
