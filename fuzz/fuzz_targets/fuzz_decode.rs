#![no_main]

use arbitrary::Arbitrary;
use ems_modbus_master::{decode, decode_values, DataType, Encoding, NamedEnum, Scaling};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    words: Vec<u16>,
    type_index: u8,
    number: u8,
    encoding_index: u8,
    offset: Option<i32>,
    accuracy: Option<f64>,
}

fuzz_target!(|input: Input| {
    let types: Vec<DataType> = DataType::all().collect();
    let data_type = types[usize::from(input.type_index) % types.len()];
    let encoding = Encoding::all()[usize::from(input.encoding_index) % 4];
    let scaling = Scaling::new(input.offset, input.accuracy);

    // Arbitrary words must yield a value or an error, never a panic.
    let _ = decode(&input.words, data_type, encoding, scaling);
    let _ = decode_values(&input.words, data_type, usize::from(input.number), encoding, scaling);
});
