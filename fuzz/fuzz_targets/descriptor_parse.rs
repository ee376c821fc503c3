#![no_main]

use libfuzzer_sys::fuzz_target;
use restbind::{BindingConfig, InterfaceDescriptor, NamingStyle, RouteTable};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(descriptor) = InterfaceDescriptor::from_json(json) else {
        return;
    };

    for style in [NamingStyle::LowerSnake, NamingStyle::UpperUnderscore] {
        let config = BindingConfig::new().naming_style(style);
        if let Ok(table) = RouteTable::build(&descriptor, &config) {
            for route in table.routes() {
                assert!(table.route(&route.qualified_name).is_some());
            }
            let _ = table.describe();
            let _ = table.openapi("fuzz", "0").to_json_pretty();
        }
    }
});
