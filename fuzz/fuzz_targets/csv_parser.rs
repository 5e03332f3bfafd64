#![no_main]
use gtfs_atlas_core::read_csv_from_bytes;
use gtfs_model::{Stop, StopTime};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = read_csv_from_bytes::<Stop>(data, "stops.txt");
    let _ = read_csv_from_bytes::<StopTime>(data, "stop_times.txt");
});
