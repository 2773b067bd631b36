// Tests for the dependency injection container and resolver

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use strut_core::{
    ComponentDescriptor, Constructor, Container, CoreConfig, CycleStatus, Error, Instance, TypeKey,
};

struct GreetingService;
static GREETING_BUILDS: AtomicUsize = AtomicUsize::new(0);

fn greeting_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::provider::<GreetingService>().constructor(Constructor::new(|_| {
        GREETING_BUILDS.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(GreetingService) as Instance)
    }))
}

#[test]
fn singleton_instances_are_shared() {
    let container = Container::new();
    container.register_descriptor(greeting_descriptor());

    let first = container.get::<GreetingService>().unwrap();
    let second = container.get::<GreetingService>().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

struct SlowService;
static SLOW_BUILDS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn concurrent_gets_construct_exactly_once() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<SlowService>().constructor(Constructor::new(|_| {
            SLOW_BUILDS.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(SlowService) as Instance)
        })),
    );

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                container.get::<SlowService>().unwrap()
            })
        })
        .collect();

    let instances: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(SLOW_BUILDS.load(Ordering::SeqCst), 1);
    for window in instances.windows(2) {
        assert!(Arc::ptr_eq(&window[0], &window[1]));
    }
}

struct StampedJob {
    id: usize,
}
static STAMP: AtomicUsize = AtomicUsize::new(0);

#[test]
fn transient_components_are_fresh_per_get() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<StampedJob>()
            .transient()
            .constructor(Constructor::new(|_| {
                Ok(Arc::new(StampedJob {
                    id: STAMP.fetch_add(1, Ordering::SeqCst),
                }) as Instance)
            })),
    );

    let first = container.get::<StampedJob>().unwrap();
    let second = container.get::<StampedJob>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.id, second.id);
}

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

struct EmailNotifier;

impl Notifier for EmailNotifier {
    fn channel(&self) -> &'static str {
        "email"
    }
}

fn email_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::provider::<EmailNotifier>()
        .constructor(Constructor::new(|_| Ok(Arc::new(EmailNotifier) as Instance)))
}

#[test]
fn binding_redirects_abstract_token_to_implementation() {
    let container = Container::new();
    container.register_descriptor(email_descriptor());
    container.bind::<dyn Notifier, EmailNotifier>();

    // The abstract token was never registered directly, only bound.
    assert!(container.is_registered::<dyn Notifier>());

    let erased = container.get_key(TypeKey::of::<dyn Notifier>()).unwrap();
    let bound = erased
        .downcast::<EmailNotifier>()
        .ok()
        .expect("bound token should resolve to EmailNotifier");
    assert_eq!(bound.channel(), "email");

    // The bound token and the concrete type share the singleton.
    let direct = container.get::<EmailNotifier>().unwrap();
    assert!(Arc::ptr_eq(&direct, &bound));
}

#[derive(Debug)]
struct CycleA;
struct CycleB;

fn cyclic_container() -> Container {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<CycleA>().constructor(
            Constructor::new(|args| {
                let _b: Arc<CycleB> = args.take()?;
                Ok(Arc::new(CycleA) as Instance)
            })
            .with_arg::<CycleB>(),
        ),
    );
    container.register_descriptor(
        ComponentDescriptor::provider::<CycleB>().constructor(
            Constructor::new(|args| {
                let _a: Arc<CycleA> = args.take()?;
                Ok(Arc::new(CycleB) as Instance)
            })
            .with_arg::<CycleA>(),
        ),
    );
    container
}

#[test]
fn cycle_detection_reports_the_path() {
    let container = cyclic_container();
    let resolver = container.resolver();

    assert!(resolver.has_circular_dependency(TypeKey::of::<CycleA>()));
    match resolver.check_cycles(TypeKey::of::<CycleA>()) {
        CycleStatus::Cyclic(path) => {
            assert_eq!(path.first(), path.last());
            assert!(path.len() >= 3);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn constructing_a_cycle_fails_instead_of_recursing() {
    let container = cyclic_container();
    let error = container.get::<CycleA>().unwrap_err();
    assert!(matches!(
        error.root_cause(),
        Error::CircularDependency { .. }
    ));
}

struct Ghost;
#[derive(Debug)]
struct NeedsGhost;

#[test]
fn unresolvable_dependency_is_a_resolution_error() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<NeedsGhost>().constructor(
            Constructor::new(|args| {
                let _ghost: Arc<Ghost> = args.take()?;
                Ok(Arc::new(NeedsGhost) as Instance)
            })
            .with_arg::<Ghost>(),
        ),
    );

    let error = container.get::<NeedsGhost>().unwrap_err();
    match error.root_cause() {
        Error::DependencyResolution { type_name, reason } => {
            assert!(type_name.contains("Ghost"));
            assert!(reason.contains("not registered and not auto-registrable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Nothing is cached for the failed construction.
    assert!(container.get::<NeedsGhost>().is_err());
}

#[test]
fn unanalyzable_dependency_is_distinct_from_acyclic() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<NeedsGhost>().constructor(
            Constructor::new(|args| {
                let _ghost: Arc<Ghost> = args.take()?;
                Ok(Arc::new(NeedsGhost) as Instance)
            })
            .with_arg::<Ghost>(),
        ),
    );

    match container.resolver().check_cycles(TypeKey::of::<NeedsGhost>()) {
        CycleStatus::Unanalyzable(key) => assert_eq!(key, TypeKey::of::<Ghost>()),
        other => panic!("expected unanalyzable, got {other:?}"),
    }
}

#[derive(Default)]
struct MetricsSink;

strut_core::component_registration! {
    strut_core::ComponentDescriptor::provider::<MetricsSink>().constructor(
        strut_core::Constructor::new(|_| {
            Ok(std::sync::Arc::new(MetricsSink) as strut_core::Instance)
        }),
    )
}

struct Dashboard {
    _sink: Arc<MetricsSink>,
}

#[test]
fn dependencies_with_registrations_are_auto_registered() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<Dashboard>().constructor(
            Constructor::new(|args| {
                let sink: Arc<MetricsSink> = args.take()?;
                Ok(Arc::new(Dashboard { _sink: sink }) as Instance)
            })
            .with_arg::<MetricsSink>(),
        ),
    );

    // MetricsSink was never registered explicitly.
    assert!(!container.is_registered::<MetricsSink>());
    assert!(container.get::<Dashboard>().is_ok());
    assert!(container.is_registered::<MetricsSink>());
}

#[test]
fn register_is_a_noop_for_unmarked_types() {
    let container = Container::new();
    assert!(container.register::<MetricsSink>());
    assert!(!container.register::<Ghost>());
    assert!(!container.is_registered::<Ghost>());
}

#[derive(Debug)]
struct PickyService;
struct DepOne;
static FIRST_CTOR_RUNS: AtomicUsize = AtomicUsize::new(0);

fn ambiguous_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::provider::<PickyService>()
        .constructor(
            Constructor::new(|args| {
                let _dep: Arc<DepOne> = args.take()?;
                FIRST_CTOR_RUNS.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(PickyService) as Instance)
            })
            .with_arg::<DepOne>(),
        )
        .constructor(
            Constructor::new(|args| {
                let _dep: Arc<DepOne> = args.take()?;
                Ok(Arc::new(PickyService) as Instance)
            })
            .with_arg::<DepOne>(),
        )
}

fn dep_one_descriptor() -> ComponentDescriptor {
    ComponentDescriptor::provider::<DepOne>()
        .constructor(Constructor::new(|_| Ok(Arc::new(DepOne) as Instance)))
}

#[test]
fn ambiguous_selection_falls_back_to_first_declared_by_default() {
    let container = Container::new();
    container.register_descriptor(dep_one_descriptor());
    container.register_descriptor(ambiguous_descriptor());

    assert!(container.get::<PickyService>().is_ok());
    assert_eq!(FIRST_CTOR_RUNS.load(Ordering::SeqCst), 1);
}

#[test]
fn ambiguous_selection_fails_under_strict_config() {
    let container =
        Container::with_config(CoreConfig::new().with_strict_constructor_selection(true));
    container.register_descriptor(dep_one_descriptor());
    container.register_descriptor(ambiguous_descriptor());

    let error = container.get::<PickyService>().unwrap_err();
    assert!(matches!(
        error.root_cause(),
        Error::AmbiguousConstructor(_)
    ));
}

struct FlaggedService;
static INJECT_CTOR_RAN: AtomicBool = AtomicBool::new(false);

#[test]
fn inject_marked_constructor_is_preferred() {
    let container = Container::new();
    container.register_descriptor(dep_one_descriptor());
    container.register_descriptor(
        ComponentDescriptor::provider::<FlaggedService>()
            .constructor(
                Constructor::new(|args| {
                    let _dep: Arc<DepOne> = args.take()?;
                    Ok(Arc::new(FlaggedService) as Instance)
                })
                .with_arg::<DepOne>(),
            )
            .constructor(
                Constructor::new(|_| {
                    INJECT_CTOR_RAN.store(true, Ordering::SeqCst);
                    Ok(Arc::new(FlaggedService) as Instance)
                })
                .inject(),
            ),
    );

    assert!(container.get::<FlaggedService>().is_ok());
    assert!(INJECT_CTOR_RAN.load(Ordering::SeqCst));
}

struct ChainTop;
struct ChainMid;
struct ChainLeaf;

#[test]
fn dependency_chain_flattens_the_graph() {
    let container = Container::new();
    container.register_descriptor(
        ComponentDescriptor::provider::<ChainLeaf>()
            .constructor(Constructor::new(|_| Ok(Arc::new(ChainLeaf) as Instance))),
    );
    container.register_descriptor(
        ComponentDescriptor::provider::<ChainMid>().constructor(
            Constructor::new(|args| {
                let _leaf: Arc<ChainLeaf> = args.take()?;
                Ok(Arc::new(ChainMid) as Instance)
            })
            .with_arg::<ChainLeaf>(),
        ),
    );
    container.register_descriptor(
        ComponentDescriptor::provider::<ChainTop>().constructor(
            Constructor::new(|args| {
                let _mid: Arc<ChainMid> = args.take()?;
                Ok(Arc::new(ChainTop) as Instance)
            })
            .with_arg::<ChainMid>(),
        ),
    );

    let chain = container.resolver().dependency_chain(TypeKey::of::<ChainTop>());
    assert_eq!(
        chain,
        vec![
            TypeKey::of::<ChainTop>(),
            TypeKey::of::<ChainMid>(),
            TypeKey::of::<ChainLeaf>(),
        ]
    );
}
