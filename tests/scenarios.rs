//! End-to-end behaviour over the in-process loopback transport

use dashmap::DashMap;
use restbind::*;
use serde_json::json;
use std::sync::Arc;

fn aggregate() -> Shape {
    Shape::object(
        "Aggregate",
        vec![
            FieldShape::new("count", Shape::Integer),
            FieldShape::new("label", Shape::String),
        ],
    )
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn serve(table: &Arc<RouteTable>, registry: MethodRegistry, hooks: HookRegistry) -> Proxy {
    init_tracing();
    let dispatcher = Dispatcher::builder(table.clone())
        .registry(registry)
        .hooks(hooks)
        .build()
        .unwrap();
    Proxy::new(table.clone(), Arc::new(dispatcher))
}

#[tokio::test]
async fn scenario_getter_under_lower_snake() {
    let descriptor = InterfaceDescriptor::builder("InfoService")
        .method(MethodBuilder::new("getSomeInfo").returns(Shape::String))
        .build();
    let config = BindingConfig::new()
        .naming_style(NamingStyle::LowerSnake)
        .root("info");
    let table = Arc::new(RouteTable::build(&descriptor, &config).unwrap());

    let route = table.route("getSomeInfo").unwrap();
    assert_eq!(route.verb, Verb::Get);
    assert_eq!(route.pattern.to_string(), "/info/some_info");

    let registry = MethodRegistry::empty().register_fn("getSomeInfo", |_| Ok(json!("some info")));
    let proxy = serve(&table, registry, HookRegistry::new());
    let outcome = proxy.call("getSomeInfo", call_args!()).await.unwrap();
    assert_eq!(outcome.status, 200);
    assert_eq!(outcome.value_as::<String>().unwrap(), "some info");
}

#[tokio::test]
async fn scenario_aggregate_list_in_one_query_value() {
    let descriptor = InterfaceDescriptor::builder("Accumulator")
        .method(
            MethodBuilder::new("queryAccumulateAll")
                .param(ParameterBuilder::new("input", Shape::list(aggregate())))
                .returns(aggregate()),
        )
        .build();
    let config = BindingConfig::new().naming_style(NamingStyle::UpperUnderscore);
    let table = Arc::new(RouteTable::build(&descriptor, &config).unwrap());

    let route = table.route("queryAccumulateAll").unwrap();
    assert_eq!(route.verb, Verb::Get);
    assert_eq!(route.pattern.to_string(), "/ACCUMULATOR/ACCUMULATE_ALL");
    assert_eq!(
        route.binding("input").unwrap().location,
        Location::Query {
            key: "input".to_string()
        }
    );

    let registry = MethodRegistry::empty().register_fn("queryAccumulateAll", |args| {
        let input: Vec<Value> = args.get_as("input")?;
        let count: i64 = input.iter().filter_map(|a| a["count"].as_i64()).sum();
        let label = input
            .iter()
            .filter_map(|a| a["label"].as_str())
            .collect::<Vec<_>>()
            .join("+");
        Ok(json!({"count": count, "label": label}))
    });
    let proxy = serve(&table, registry, HookRegistry::new());

    let input = json!([{"count": 2, "label": "a"}, {"count": 3, "label": "b"}]);
    let args = call_args! { "input" => input.clone() };

    let request = proxy.request("queryAccumulateAll", &args).unwrap();
    assert_eq!(request.query.len(), 1);
    let encoded: Value = serde_json::from_str(request.query_value("input").unwrap()).unwrap();
    assert_eq!(encoded, input);
    assert!(request.body.is_empty());

    let outcome = proxy.call("queryAccumulateAll", args).await.unwrap();
    assert_eq!(outcome.value, json!({"count": 5, "label": "a+b"}));
}

#[tokio::test]
async fn scenario_nested_interface_mounts_under_accessor() {
    let descriptor = InterfaceDescriptor::builder("Root")
        .method(MethodBuilder::new("getVersion").returns(Shape::String))
        .nested(
            "nestedModule",
            InterfaceBuilder::new("NestedIface")
                .method(MethodBuilder::new("getData").returns(Shape::Integer))
                .method(MethodBuilder::new("putValue").param(ParameterBuilder::new("value", Shape::Integer))),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("root").build().unwrap());

    assert_eq!(table.len(), 3);
    assert!(table.route("nestedModule").is_none());
    for route in table.routes().iter().filter(|r| r.qualified_name.starts_with("nestedModule.")) {
        assert!(
            route.pattern.to_string().starts_with("/root/nested_module/"),
            "{} mounted at {}",
            route.qualified_name,
            route.pattern
        );
    }
    for verb in Verb::ALL {
        assert!(table.lookup(verb, "/root/nested_module").is_none());
    }

    let stored: Arc<DashMap<&str, i64>> = Arc::new(DashMap::new());
    let writes = stored.clone();
    let reads = stored.clone();
    let registry = MethodRegistry::empty()
        .register_fn("getVersion", |_| Ok(json!("1.0")))
        .register_fn("nestedModule.putValue", move |args| {
            writes.insert("value", args.get_as::<i64>("value")?);
            Ok(Value::Null)
        })
        .register_fn("nestedModule.getData", move |_| {
            Ok(json!(reads.get("value").map(|v| *v).unwrap_or_default()))
        });
    let proxy = serve(&table, registry, HookRegistry::new());
    let nested = proxy.nested("nestedModule").unwrap();

    let written = nested.call("putValue", call_args! { "value" => 41 }).await.unwrap();
    assert_eq!(written.status, 204);
    let read = nested.call("getData", call_args!()).await.unwrap();
    assert_eq!(read.value, json!(41));
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn scenario_output_only_header() {
    let descriptor = InterfaceDescriptor::builder("Auth")
        .method(
            MethodBuilder::new("postLogin")
                .param(ParameterBuilder::new("user", Shape::String))
                .param(
                    ParameterBuilder::new("challenge", Shape::String)
                        .header("WWW-Authenticate")
                        .output(),
                )
                .returns(Shape::Bool),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("auth").build().unwrap());

    let registry = MethodRegistry::empty().register_fn("postLogin", |args| {
        let user: String = args.get_as("user")?;
        args.set("challenge", format!("Basic realm=\"{}\"", user));
        if user == "mallory" {
            return Err(HandlerError::declared(401, "unknown user"));
        }
        Ok(json!(true))
    });
    let proxy = serve(&table, registry, HookRegistry::new());

    let request = proxy
        .request("postLogin", &call_args! { "user" => "alice" })
        .unwrap();
    assert!(!request.headers.contains("www-authenticate"));

    let outcome = proxy
        .call("postLogin", call_args! { "user" => "alice" })
        .await
        .unwrap();
    assert_eq!(outcome.value, json!(true));
    assert_eq!(
        outcome.output_as::<String>("challenge").as_deref(),
        Some("Basic realm=\"alice\"")
    );

    // written on the failure path too
    let dispatcher = Dispatcher::builder(table.clone())
        .registry(MethodRegistry::empty().register_fn("postLogin", |args| {
            args.set("challenge", "Basic realm=\"x\"");
            Err(HandlerError::declared(401, "unknown user"))
        }))
        .build()
        .unwrap();
    let response = dispatcher
        .dispatch(WireRequest::new(Verb::Post, "/auth/login").with_body(r#"{"user": "mallory"}"#))
        .await;
    assert_eq!(response.status, 401);
    assert_eq!(response.headers.get("WWW-Authenticate"), Some("Basic realm=\"x\""));

    let denied = proxy
        .call("postLogin", call_args! { "user" => "mallory" })
        .await
        .unwrap_err();
    assert_eq!(denied.status(), Some(401));
    assert_eq!(denied.body().unwrap().message, "unknown user");
}

#[tokio::test]
async fn scenario_bidirectional_header() {
    let descriptor = InterfaceDescriptor::builder("Session")
        .method(
            MethodBuilder::new("postRefresh")
                .param(
                    ParameterBuilder::new("tok", Shape::String)
                        .header("X-Session")
                        .in_out(),
                )
                .returns(Shape::Bool),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("session").build().unwrap());

    fn registry() -> MethodRegistry {
        MethodRegistry::empty().register_fn("postRefresh", |args| {
            let tok: String = args.get_as("tok")?;
            if tok == "expired" {
                args.set("tok", "reissued");
                return Err(HandlerError::declared(401, "session expired"));
            }
            args.set("tok", format!("{}-renewed", tok));
            Ok(json!(true))
        })
    }
    let proxy = serve(&table, registry(), HookRegistry::new());

    let request = proxy
        .request("postRefresh", &call_args! { "tok" => "abc" })
        .unwrap();
    assert_eq!(request.headers.get("x-session"), Some("abc"));
    assert!(request.body.is_empty());

    let outcome = proxy
        .call("postRefresh", call_args! { "tok" => "abc" })
        .await
        .unwrap();
    assert_eq!(outcome.value, json!(true));
    assert_eq!(outcome.output_as::<String>("tok").as_deref(), Some("abc-renewed"));

    let missing = proxy.call("postRefresh", call_args!()).await.unwrap_err();
    assert!(matches!(missing, CallError::MissingArgument { parameter, .. } if parameter == "tok"));

    // the handler's write survives its failure
    let dispatcher = Dispatcher::builder(table.clone())
        .registry(registry())
        .build()
        .unwrap();
    let response = dispatcher
        .dispatch(WireRequest::new(Verb::Post, "/session/refresh").with_header("X-Session", "expired"))
        .await;
    assert_eq!(response.status, 401);
    assert_eq!(response.headers.get("X-Session"), Some("reissued"));

    let denied = proxy
        .call("postRefresh", call_args! { "tok" => "expired" })
        .await
        .unwrap_err();
    assert_eq!(denied.status(), Some(401));
}

#[tokio::test]
async fn scenario_explicit_path_captures_in_order() {
    let descriptor = InterfaceDescriptor::builder("Data")
        .method(
            MethodBuilder::new("postData")
                .path(":param/:another_param/data")
                .param(ParameterBuilder::new("_param", Shape::String))
                .param(ParameterBuilder::new("_another_param", Shape::Integer))
                .returns(Shape::String),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("svc").build().unwrap());

    let route = table.route("postData").unwrap();
    assert_eq!(route.verb, Verb::Post);
    assert_eq!(route.pattern.to_string(), "/svc/:param/:another_param/data");
    let locations: Vec<_> = route.bindings.iter().map(|b| b.location.clone()).collect();
    assert_eq!(
        locations,
        vec![
            Location::Path {
                capture: "param".to_string()
            },
            Location::Path {
                capture: "another_param".to_string()
            },
        ]
    );

    let registry = MethodRegistry::empty().register_fn("postData", |args| {
        let names: Vec<&str> = args.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["_param", "_another_param"]);
        Ok(json!(format!(
            "{}:{}",
            args.get_as::<String>("_param")?,
            args.get_as::<i64>("_another_param")?
        )))
    });
    let proxy = serve(&table, registry, HookRegistry::new());

    let args = call_args! { "_param" => "x y", "_another_param" => 9 };
    let request = proxy.request("postData", &args).unwrap();
    assert_eq!(request.path, "/svc/x%20y/9/data");
    assert!(request.body.is_empty());

    let outcome = proxy.call("postData", args).await.unwrap();
    assert_eq!(outcome.value, json!("x y:9"));
}

#[tokio::test]
async fn proxy_requests_bind_to_the_call_site_values() {
    let descriptor = InterfaceDescriptor::builder("Echo")
        .method(
            MethodBuilder::new("getItem")
                .path("items/:id")
                .param(ParameterBuilder::new("_id", Shape::Integer))
                .param(ParameterBuilder::new("filter", Shape::list(Shape::String)))
                .param(ParameterBuilder::new("trace", Shape::String).header("X-Trace"))
                .param(ParameterBuilder::new("user", Shape::String))
                .pre_hook("auth", "user")
                .returns(Shape::Any),
        )
        .method(
            MethodBuilder::new("postItem")
                .param(ParameterBuilder::new("item", aggregate()))
                .param(ParameterBuilder::new("note", Shape::optional(Shape::String)))
                .param(ParameterBuilder::new("page", Shape::Integer).query())
                .returns(Shape::Any),
        )
        .method(
            MethodBuilder::new("putDocument")
                .param(ParameterBuilder::new("doc", Shape::Any).whole_body())
                .param(ParameterBuilder::new("version", Shape::Integer).header("If-Match"))
                .returns(Shape::Any),
        )
        .method(
            MethodBuilder::new("patchItem")
                .param(ParameterBuilder::new("delta", Shape::Number).body_field_key("d"))
                .returns(Shape::Any),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("echo").build().unwrap());

    let seen: Arc<DashMap<String, Arguments>> = Arc::new(DashMap::new());
    let mut registry = MethodRegistry::empty();
    for route in table.routes() {
        let seen = seen.clone();
        let name = route.qualified_name.clone();
        registry = registry.register_fn(name.clone(), move |args| {
            seen.insert(name.clone(), args.clone());
            Ok(Value::Null)
        });
    }
    let hooks = HookRegistry::new().pre_fn("auth", |_| Ok(json!("injected")));
    let proxy = serve(&table, registry, hooks);

    let calls = vec![
        (
            "getItem",
            call_args! { "_id" => 12, "filter" => ["a", "b c"], "trace" => "t-1" },
        ),
        (
            "postItem",
            call_args! { "item" => json!({"count": 1, "label": "l"}), "note" => "n", "page" => 3 },
        ),
        (
            "putDocument",
            call_args! { "doc" => json!({"nested": [1, 2, {"deep": null}]}), "version" => 5 },
        ),
        ("patchItem", call_args! { "delta" => 0.5 }),
    ];

    for (method, args) in calls {
        proxy.call(method, args.clone()).await.unwrap();
        let bound = seen.get(method).unwrap();
        let route = table.route(method).unwrap();
        for binding in route.visible_parameters() {
            assert_eq!(
                bound.get(&binding.parameter),
                args.get(&binding.parameter),
                "{}.{}",
                method,
                binding.parameter
            );
        }
    }

    assert_eq!(seen.get("getItem").unwrap().get("user"), Some(&json!("injected")));
}

#[tokio::test]
async fn not_found_and_bad_request_surface_to_the_caller() {
    let descriptor = InterfaceDescriptor::builder("Svc")
        .method(
            MethodBuilder::new("getItem")
                .path("items/:id")
                .param(ParameterBuilder::new("_id", Shape::Integer))
                .returns(Shape::Integer),
        )
        .build();
    let table = Arc::new(RouteTable::builder(&descriptor).root("svc").build().unwrap());
    let dispatcher = Dispatcher::builder(table.clone())
        .registry(MethodRegistry::empty().register_fn("getItem", |args| Ok(json!(args.get_as::<i64>("_id")?))))
        .build()
        .unwrap();

    let missing = dispatcher.dispatch(WireRequest::new(Verb::Get, "/svc/items")).await;
    assert_eq!(missing.status, 404);

    let malformed = dispatcher.dispatch(WireRequest::new(Verb::Get, "/svc/items/seven")).await;
    assert_eq!(malformed.status, 400);

    let proxy = Proxy::new(table, Arc::new(dispatcher));
    let error = proxy
        .call("getItem", call_args! { "_id" => "seven" })
        .await
        .unwrap_err();
    assert!(matches!(error, CallError::Encode { .. }));
}

#[tokio::test]
async fn concurrent_calls_share_only_the_table() {
    let descriptor = InterfaceDescriptor::builder("Counter")
        .method(
            MethodBuilder::new("postIncrement")
                .param(ParameterBuilder::new("key", Shape::String))
                .returns(Shape::Integer),
        )
        .build();
    let table = Arc::new(RouteTable::build(&descriptor, &BindingConfig::default()).unwrap());
    let counters: Arc<DashMap<String, i64>> = Arc::new(DashMap::new());
    let state = counters.clone();
    let registry = MethodRegistry::empty().register_fn("postIncrement", move |args| {
        let key: String = args.get_as("key")?;
        let mut entry = state.entry(key).or_insert(0);
        *entry += 1;
        let count = *entry;
        Ok(json!(count))
    });
    let proxy = serve(&table, registry, HookRegistry::new());

    let mut tasks = Vec::new();
    for i in 0..32 {
        let proxy = proxy.clone();
        tasks.push(tokio::spawn(async move {
            let key = if i % 2 == 0 { "even" } else { "odd" };
            proxy.call("postIncrement", call_args! { "key" => key }).await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().status, 200);
    }
    assert_eq!(*counters.get("even").unwrap(), 16);
    assert_eq!(*counters.get("odd").unwrap(), 16);
}

#[test]
fn colliding_methods_fail_the_build() {
    let descriptor = InterfaceDescriptor::builder("Svc")
        .method(MethodBuilder::new("getItem").returns(Shape::String))
        .method(MethodBuilder::new("queryItem").returns(Shape::String))
        .build();
    let error = RouteTable::builder(&descriptor).root("svc").build().unwrap_err();
    assert!(matches!(
        error,
        BuildError::RouteCollision { verb: Verb::Get, first, second, .. }
            if first == "getItem" && second == "queryItem"
    ));
}

#[test]
fn unbound_capture_fails_the_build() {
    let descriptor = InterfaceDescriptor::builder("Svc")
        .method(
            MethodBuilder::new("getItem")
                .path("items/:id")
                .param(ParameterBuilder::new("id", Shape::Integer)),
        )
        .build();
    let error = RouteTable::build(&descriptor, &BindingConfig::default()).unwrap_err();
    assert!(matches!(error, BuildError::MissingCapture { capture, .. } if capture == "id"));
}

#[test]
fn output_only_query_parameter_fails_the_build() {
    let descriptor = InterfaceDescriptor::builder("Svc")
        .method(
            MethodBuilder::new("getItem")
                .param(ParameterBuilder::new("etag", Shape::String).output()),
        )
        .build();
    let error = RouteTable::build(&descriptor, &BindingConfig::default()).unwrap_err();
    assert!(matches!(
        error,
        BuildError::IllegalDirectionality { parameter, .. } if parameter == "etag"
    ));
}

#[test]
fn convention_is_deterministic() {
    let descriptor = InterfaceDescriptor::builder("Svc")
        .method(MethodBuilder::new("getSomeInfo"))
        .method(MethodBuilder::new("deleteUserRecord"))
        .method(MethodBuilder::new("recompute"))
        .build();
    let first = RouteTable::build(&descriptor, &BindingConfig::default()).unwrap();
    let second = RouteTable::build(&descriptor, &BindingConfig::default()).unwrap();
    let summary = |table: &RouteTable| {
        table
            .routes()
            .iter()
            .map(|r| (r.verb, r.pattern.to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&first), summary(&second));
    assert_eq!(
        summary(&first),
        vec![
            (Verb::Get, "/svc/some_info".to_string()),
            (Verb::Delete, "/svc/user_record".to_string()),
            (Verb::Post, "/svc/recompute".to_string()),
        ]
    );
}
