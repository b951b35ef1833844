use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use surrogate_engine::{
    hook_fn, HookFactory, MethodDef, Prototype, ProxyError, ProxyFamily, ProxyRegistry,
    SynthesisOptions, TypeInfo, Value,
};

const THREADS: usize = 8;

fn clock() -> Prototype {
    Prototype::interface("IClock")
        .method(MethodDef::new("Now").returns(TypeInfo::i64()))
        .handler(|_call| Ok(Value::I64(1_700_000_000)))
        .build()
}

#[test]
fn test_concurrent_requests_share_one_type() {
    let registry = ProxyRegistry::new();
    let proto = clock();
    let barrier = Barrier::new(THREADS);

    let types: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    registry.get_or_build(&proto).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for ty in &types[1..] {
        assert!(Arc::ptr_eq(&types[0], ty));
    }
    assert_eq!(registry.build_count(), 1);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unrelated_prototypes_build_independently() {
    let registry = ProxyRegistry::new();
    let protos: Vec<Prototype> = (0..THREADS)
        .map(|i| {
            Prototype::interface(&format!("IService{}", i))
                .method(MethodDef::new("Run"))
                .build()
        })
        .collect();

    thread::scope(|s| {
        for proto in &protos {
            let registry = &registry;
            s.spawn(move || {
                for _ in 0..10 {
                    registry.get_or_build(proto).unwrap();
                }
            });
        }
    });

    assert_eq!(registry.len(), THREADS);
    assert_eq!(registry.build_count(), THREADS);
}

#[test]
fn test_concurrent_invocation_of_shared_instance() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let proto = Prototype::interface("ITicker")
        .method(MethodDef::new("Tick").returns(TypeInfo::i32()))
        .handler(move |_call| Ok(Value::I32(counted.fetch_add(1, Ordering::SeqCst) as i32)))
        .build();
    let ticker = ProxyRegistry::new()
        .get_or_build(&proto)
        .unwrap()
        .instantiate(&mut [])
        .unwrap();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..100 {
                    ticker.invoke("Tick", &mut []).unwrap();
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), THREADS * 100);
}

#[test]
fn test_failed_build_can_be_retried() {
    let ready = Arc::new(AtomicBool::new(false));
    let gate = ready.clone();
    let proto = Prototype::interface("IFlaky")
        .hook(HookFactory::fallible("Flaky", move || {
            if gate.load(Ordering::SeqCst) {
                Ok(hook_fn(|call, next| next.proceed(call)))
            } else {
                Err(ProxyError::Invocation("hook environment not ready".to_string()))
            }
        }))
        .method(MethodDef::new("Run"))
        .handler(|_call| Ok(Value::Null))
        .build();

    let registry = ProxyRegistry::new();
    assert!(registry.get_or_build(&proto).is_err());
    assert!(!registry.contains(&proto, ProxyFamily::Interception));

    ready.store(true, Ordering::SeqCst);
    let ty = registry.get_or_build(&proto).unwrap();
    assert_eq!(ty.hooks().len(), 1);
    assert_eq!(registry.build_count(), 2);
    assert!(Arc::ptr_eq(&ty, &registry.get_or_build(&proto).unwrap()));
}

#[test]
fn test_registry_options_apply_to_every_build() {
    let options = SynthesisOptions::from_toml_str("type_name_suffix = \"Shim\"").unwrap();
    let registry = ProxyRegistry::with_options(options);

    let ty = registry.get_or_build(&clock()).unwrap();
    assert!(ty.name().starts_with("IClock$Shim"));
    assert_eq!(registry.options().type_name_suffix, "Shim");
}

#[test]
fn test_global_helpers_use_global_registry() {
    let proto = clock();
    let a = surrogate_engine::proxy_type(&proto).unwrap();
    let b = ProxyRegistry::global().get_or_build(&proto).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
