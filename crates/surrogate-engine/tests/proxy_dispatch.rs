mod common;

use std::sync::Arc;

use common::{calculator, calculator_builder, recording, Counter, Recorder};
use parking_lot::Mutex;
use surrogate_engine::{
    EventDef, HookFactory, IndexerDef, MethodDef, PropertyDef, Prototype, ProxyError, ProxyRegistry, TypeInfo, Value,
    Visibility,
};

// ============================================================================
// Handler routing
// ============================================================================

#[test]
fn test_handler_sees_every_call() {
    let counter = Arc::new(Counter::default());
    let seen = counter.clone();
    let proto = Prototype::interface("IService")
        .method(MethodDef::new("Get").returns(TypeInfo::i32()))
        .method(MethodDef::new("Put").param("item", TypeInfo::string()))
        .handler(move |call| {
            seen.bump();
            match call.method().name.as_str() {
                "Get" => Ok(Value::I32(7)),
                _ => Ok(Value::Null),
            }
        })
        .build();

    let service = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    for _ in 0..3 {
        assert_eq!(service.call::<i32>("Get", &mut []).unwrap(), 7);
    }
    for _ in 0..2 {
        assert_eq!(service.invoke("Put", &mut [Value::from("x")]).unwrap(), Value::Null);
    }
    assert_eq!(counter.get(), 5);
}

#[test]
fn test_transparent_handler_matches_base() {
    let plain = Prototype::class("Adder")
        .method(
            MethodDef::new("Add")
                .param("a", TypeInfo::i32())
                .param("b", TypeInfo::i32())
                .returns(TypeInfo::i32())
                .virtual_()
                .body(|frame| Ok(Value::I32(frame.arg::<i32>(0)? + frame.arg::<i32>(1)?))),
        )
        .build();
    let transparent = Prototype::class("TransparentAdder")
        .extends(&plain)
        .handler(|call| call.proceed_base())
        .build();

    let registry = ProxyRegistry::new();
    let direct = registry.get_or_build(&plain).unwrap().instantiate(&mut []).unwrap();
    let proxied = registry
        .get_or_build(&transparent)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    for (a, b) in [(1, 2), (-5, 5), (40, 2)] {
        let expected = direct.invoke("Add", &mut [Value::I32(a), Value::I32(b)]).unwrap();
        let actual = proxied.invoke("Add", &mut [Value::I32(a), Value::I32(b)]).unwrap();
        assert_eq!(actual, expected);
    }
}

#[test]
fn test_constructor_forwarding_and_non_virtual_members() {
    let counter = Arc::new(Counter::default());
    let seen = counter.clone();
    let proto = calculator_builder()
        .handler(move |call| {
            seen.bump();
            call.proceed_base()
        })
        .build();

    let ty = ProxyRegistry::new().get_or_build(&proto).unwrap();
    assert_eq!(ty.constructors().len(), 2);

    let calc = ty.instantiate(&mut [Value::I32(10)]).unwrap();
    assert_eq!(calc.call::<i32>("Add", &mut [Value::I32(1), Value::I32(2)]).unwrap(), 13);
    assert_eq!(calc.call::<String>("Describe", &mut []).unwrap(), "calculator");
    assert_eq!(counter.get(), 1);

    calc.set("Total", 5).unwrap();
    assert_eq!(calc.get("Total").unwrap(), Value::I32(5));
    assert_eq!(counter.get(), 3);
}

#[test]
fn test_handler_rewrites_arguments() {
    let proto = Prototype::class("Clamped")
        .extends(&calculator())
        .handler(|call| {
            if call.method().name == "Add" {
                let a: i32 = call.arg(0)?;
                call.set_arg(0, a.min(100))?;
            }
            call.proceed_base()
        })
        .build();
    let calc = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    assert_eq!(calc.call::<i32>("Add", &mut [Value::I32(500), Value::I32(2)]).unwrap(), 102);
}

#[test]
fn test_handler_errors_propagate() {
    let proto = Prototype::interface("IFailing")
        .method(MethodDef::new("Run"))
        .handler(|_call| Err(ProxyError::Invocation("boom".to_string())))
        .build();
    let obj = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    let err = obj.invoke("Run", &mut []).unwrap_err();
    assert!(matches!(err, ProxyError::Invocation(ref msg) if msg == "boom"));
}

#[test]
fn test_handler_result_type_checked() {
    let proto = Prototype::interface("IWrong")
        .method(MethodDef::new("Count").returns(TypeInfo::i32()))
        .handler(|_call| Ok(Value::from("not a number")))
        .build();
    let obj = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    assert!(obj.invoke("Count", &mut []).is_err());
}

#[test]
fn test_events_and_indexers_intercepted() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let proto = Prototype::interface("IBus")
        .event(EventDef::abstract_("Message"))
        .indexer(IndexerDef::new(TypeInfo::string(), "slot", TypeInfo::i32()).abstract_())
        .handler(move |call| {
            let method = call.method();
            record.lock().push((method.name.clone(), method.is_special_name()));
            match method.name.as_str() {
                "get_Item" => Ok(Value::from(format!("slot{}", call.arg::<i32>(0)?))),
                _ => Ok(Value::Null),
            }
        })
        .build();
    let bus = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    bus.subscribe("Message", Value::from("listener")).unwrap();
    bus.unsubscribe("Message", Value::from("listener")).unwrap();
    assert_eq!(bus.index_get(&[Value::I32(3)]).unwrap(), Value::from("slot3"));
    bus.index_set(&[Value::I32(3)], "x").unwrap();

    let names: Vec<(String, bool)> = seen.lock().clone();
    assert_eq!(
        names,
        vec![
            ("add_Message".to_string(), true),
            ("remove_Message".to_string(), true),
            ("get_Item".to_string(), true),
            ("set_Item".to_string(), true),
        ]
    );
}

// ============================================================================
// Abstract members
// ============================================================================

#[test]
fn test_abstract_member_served_by_handler() {
    let base_seen = Arc::new(Mutex::new(Vec::new()));
    let record = base_seen.clone();
    let proto = Prototype::class("Shape")
        .method(MethodDef::new("Area").returns(TypeInfo::f64()).abstract_())
        .handler(move |call| {
            record.lock().push(call.has_base());
            Ok(Value::F64(2.5))
        })
        .build();
    let shape = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    assert_eq!(shape.call::<f64>("Area", &mut []).unwrap(), 2.5);
    assert_eq!(shape.call::<f64>("Area", &mut []).unwrap(), 2.5);
    assert_eq!(*base_seen.lock(), vec![false, false]);
}

#[test]
fn test_proceed_base_on_abstract_member_fails() {
    let proto = Prototype::interface("IEcho")
        .method(MethodDef::new("Echo").param("s", TypeInfo::string()).returns(TypeInfo::string()))
        .handler(|call| call.proceed_base())
        .build();
    let obj = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    let err = obj.invoke("Echo", &mut [Value::from("hi")]).unwrap_err();
    assert!(matches!(err, ProxyError::Invocation(_)));
}

// ============================================================================
// Hooks
// ============================================================================

#[test]
fn test_hooks_wrap_handler_outermost_first() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (type_log, method_log, handler_log) = (order.clone(), order.clone(), order.clone());

    let proto = Prototype::interface("IOrdered")
        .hook(HookFactory::from_fn("TypeHook", move |call, next| {
            type_log.lock().push("type");
            next.proceed(call)
        }))
        .method(
            MethodDef::new("Run").hook(HookFactory::from_fn("MethodHook", move |call, next| {
                method_log.lock().push("method");
                next.proceed(call)
            })),
        )
        .handler(move |_call| {
            handler_log.lock().push("handler");
            Ok(Value::Null)
        })
        .build();

    let ty = ProxyRegistry::new().get_or_build(&proto).unwrap();
    assert_eq!(ty.hooks().len(), 2);
    assert_eq!(ty.overrides()[0].composed_invoker().unwrap().depth(), 3);

    ty.instantiate(&mut []).unwrap().invoke("Run", &mut []).unwrap();
    assert_eq!(*order.lock(), vec!["type", "method", "handler"]);
}

#[test]
fn test_hook_short_circuits_chain() {
    let counter = Arc::new(Counter::default());
    let seen = counter.clone();
    let proto = Prototype::interface("ICached")
        .method(
            MethodDef::new("Lookup")
                .param("key", TypeInfo::string())
                .returns(TypeInfo::string())
                .hook(HookFactory::from_fn("Cache", |call, next| {
                    if call.arg::<String>(0)? == "hit" {
                        return Ok(Value::from("cached"));
                    }
                    next.proceed(call)
                })),
        )
        .handler(move |_call| {
            seen.bump();
            Ok(Value::from("computed"))
        })
        .build();
    let obj = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    assert_eq!(obj.call::<String>("Lookup", &mut [Value::from("hit")]).unwrap(), "cached");
    assert_eq!(obj.call::<String>("Lookup", &mut [Value::from("miss")]).unwrap(), "computed");
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_property_hook_sees_both_accessors() {
    let recorder = Arc::new(Recorder::default());
    let proto = Prototype::class("Settings")
        .property(PropertyDef::auto("Theme", TypeInfo::string()).hook(recording(&recorder)))
        .build();
    let settings = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    settings.set("Theme", "dark").unwrap();
    assert_eq!(settings.get("Theme").unwrap(), Value::from("dark"));
    assert_eq!(
        *recorder.seen.lock(),
        vec!["set_Theme".to_string(), "get_Theme".to_string()]
    );
}

#[test]
fn test_derived_prototype_inherits_base_hooks() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let (type_log, method_log, own_log) = (order.clone(), order.clone(), order.clone());

    let animal = Prototype::class("Animal")
        .hook(HookFactory::from_fn("Tracked", move |call, next| {
            type_log.lock().push("animal-type");
            next.proceed(call)
        }))
        .method(
            MethodDef::new("Legs")
                .returns(TypeInfo::i32())
                .virtual_()
                .hook(HookFactory::from_fn("Counted", move |call, next| {
                    method_log.lock().push("animal-legs");
                    next.proceed(call)
                }))
                .body(|_| Ok(Value::I32(4))),
        )
        .build();
    let bird = Prototype::class("Bird")
        .extends(&animal)
        .method(
            MethodDef::new("Legs")
                .returns(TypeInfo::i32())
                .virtual_()
                .hook(HookFactory::from_fn("Audited", move |call, next| {
                    own_log.lock().push("bird-legs");
                    next.proceed(call)
                }))
                .body(|_| Ok(Value::I32(2))),
        )
        .build();

    let ty = ProxyRegistry::new().get_or_build(&bird).unwrap();
    assert_eq!(ty.hooks().len(), 3);

    let obj = ty.instantiate(&mut []).unwrap();
    assert_eq!(obj.call::<i32>("Legs", &mut []).unwrap(), 2);
    assert_eq!(*order.lock(), vec!["animal-type", "animal-legs", "bird-legs"]);
}

#[test]
fn test_failing_hook_aborts_build() {
    let proto = Prototype::interface("IBroken")
        .hook(HookFactory::fallible("Broken", || {
            Err(ProxyError::Invocation("no hook today".to_string()))
        }))
        .method(MethodDef::new("Run"))
        .build();
    let registry = ProxyRegistry::new();

    assert!(registry.get_or_build(&proto).is_err());
    assert!(registry.is_empty());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_internal_prototype_rejected() {
    let registry = ProxyRegistry::new();
    let proto = Prototype::interface("IInternal")
        .visibility(Visibility::Internal)
        .method(MethodDef::new("Run"))
        .build();

    let err = registry.get_or_build(&proto).unwrap_err();
    assert!(matches!(err, ProxyError::PrototypeShape(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_non_public_members_not_callable_from_outside() {
    let proto = Prototype::class("Vault")
        .method(
            MethodDef::new("Secret")
                .returns(TypeInfo::string())
                .virtual_()
                .visibility(Visibility::Protected)
                .body(|_| Ok(Value::from("protected-data"))),
        )
        .method(
            MethodDef::new("Helper")
                .returns(TypeInfo::string())
                .visibility(Visibility::Private)
                .body(|_| Ok(Value::from("private-data"))),
        )
        .method(
            MethodDef::new("Inner")
                .returns(TypeInfo::string())
                .visibility(Visibility::Internal)
                .body(|_| Ok(Value::from("internal-data"))),
        )
        .method(
            MethodDef::new("Reveal")
                .returns(TypeInfo::string())
                .virtual_()
                .body(|frame| frame.invoke("Secret", &mut [])),
        )
        .handler(|call| {
            if call.method().name == "Secret" {
                return Ok(Value::from("intercepted"));
            }
            call.proceed_base()
        })
        .build();
    let vault = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    for name in ["Secret", "Helper", "Inner"] {
        let err = vault.invoke(name, &mut []).unwrap_err();
        assert!(matches!(err, ProxyError::MemberNotFound(_)), "{} was reachable", name);
    }
    assert_eq!(vault.call::<String>("Reveal", &mut []).unwrap(), "intercepted");
}

#[test]
fn test_sealed_class_rejected() {
    let proto = Prototype::class("Final").sealed().build();
    let err = ProxyRegistry::new().get_or_build(&proto).unwrap_err();
    assert!(matches!(err, ProxyError::PrototypeShape(_)));
}

#[test]
fn test_instance_of_prototype() {
    let base = calculator();
    let derived = Prototype::class("LoggedCalculator").extends(&base).build();
    let obj = ProxyRegistry::new()
        .get_or_build(&derived)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    assert!(obj.is_instance_of(&derived));
    assert!(obj.is_instance_of(&base));
}
