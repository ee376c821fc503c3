#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::fuzz_target;
use restbind::marshal::{decode_text, encode_text};
use restbind::{FieldShape, JsonMarshaller, Marshaller, Shape};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    shape: u8,
    raw: Vec<u8>,
}

fn shape(selector: u8) -> Shape {
    match selector % 6 {
        0 => Shape::String,
        1 => Shape::Integer,
        2 => Shape::optional(Shape::Bool),
        3 => Shape::list(Shape::Number),
        4 => Shape::object(
            "Aggregate",
            vec![
                FieldShape::new("count", Shape::Integer),
                FieldShape::new("label", Shape::optional(Shape::String)),
            ],
        ),
        _ => Shape::Any,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    if let Ok(input) = FuzzInput::arbitrary(&mut u) {
        let shape = shape(input.shape);
        let marshaller = JsonMarshaller;

        if let Ok(value) = marshaller.decode(&input.raw, &shape) {
            // anything that decodes must encode again under the same shape
            let encoded = marshaller.encode(&value, &shape);
            assert!(encoded.is_ok());
        }

        if let Ok(text) = std::str::from_utf8(&input.raw)
            && let Ok(value) = decode_text(&marshaller, text, &shape)
        {
            assert!(encode_text(&marshaller, &value, &shape).is_ok());
        }
    }
});
