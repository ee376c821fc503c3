#![no_main]

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::fuzz_target;
use restbind::*;
use std::sync::OnceLock;

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    verb: u8,
    path: String,
}

fn table() -> &'static RouteTable {
    static TABLE: OnceLock<RouteTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let descriptor = InterfaceDescriptor::builder("Svc")
            .method(
                MethodBuilder::new("getItem")
                    .path("items/:id")
                    .param(ParameterBuilder::new("_id", Shape::String)),
            )
            .method(
                MethodBuilder::new("postData")
                    .path(":param/:another_param/data")
                    .param(ParameterBuilder::new("_param", Shape::String))
                    .param(ParameterBuilder::new("_another_param", Shape::String)),
            )
            .method(MethodBuilder::new("getSomeInfo"))
            .nested(
                "nestedModule",
                InterfaceBuilder::new("Nested").method(MethodBuilder::new("getData")),
            )
            .build();
        match RouteTable::build(&descriptor, &BindingConfig::default()) {
            Ok(table) => table,
            Err(e) => panic!("fixture table failed to build: {}", e),
        }
    })
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    if let Ok(input) = FuzzInput::arbitrary(&mut u) {
        let verb = Verb::ALL[input.verb as usize % Verb::ALL.len()];
        if let Some(matched) = table().lookup(verb, &input.path) {
            assert_eq!(matched.route.verb, verb);
            assert_eq!(
                matched.captures.len() + matched.malformed.len(),
                matched.route.pattern.captures().count()
            );
        }
    }
});
