use std::sync::Arc;

use wiring_manifest::{
    Action, Catalog, ComponentDeclaration, ComponentSchema, Document, Domain, Ident, Literal,
    LiteralKind, OptionKind, OptionName, OptionSchema, OptionValue, Presence, Stage,
};
use wiring_scenario::IdentifierTable;

use crate::{
    Arg, Compiler, Error, ResolveError, Resolver, Unresolved, WireOptions, WireOrder,
    WiringPlan, WiringState,
    backend::{Call, CppEmitter, RecordingEmitter},
};

static WIDGET: ComponentSchema = ComponentSchema {
    domain: "widget",
    namespace: "test",
    class: "Widget",
    bases: &["Component"],
    header: "test/widget.h",
    dependencies: &[],
    codeowners: &[],
    platforms: &[],
    multi: true,
    options: &[
        OptionSchema {
            name: "parent",
            kind: OptionKind::Reference {
                class: "test::Widget",
            },
            presence: Presence::Optional,
            stage: Stage::Constructor,
        },
        OptionSchema {
            name: "a",
            kind: OptionKind::Literal {
                literal: LiteralKind::Int,
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_a"),
        },
        OptionSchema {
            name: "b",
            kind: OptionKind::Reference {
                class: "test::Widget",
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_b"),
        },
        OptionSchema {
            name: "c",
            kind: OptionKind::Literal {
                literal: LiteralKind::Int,
            },
            presence: Presence::Optional,
            stage: Stage::Setter("set_c"),
        },
    ],
};

fn catalog() -> Catalog {
    Catalog::builtin().with(&WIDGET)
}

fn ident(name: &str) -> Ident {
    Ident::new(name).unwrap()
}

fn opt(name: &str) -> OptionName {
    OptionName::new(name).unwrap()
}

fn widget(id: &str) -> ComponentDeclaration {
    ComponentDeclaration::new(ident(id), Domain::new("widget").unwrap())
}

fn document(decls: Vec<ComponentDeclaration>) -> Document {
    Document::new("test.yaml", decls)
}

fn wire(
    decls: Vec<ComponentDeclaration>,
    order: WireOrder,
) -> (Result<crate::WiredScenario, Error>, Vec<Call>) {
    let compiler = Compiler::new(catalog());
    let opts = WireOptions::builder().order(order).build();
    let mut recorder = RecordingEmitter::new();
    let result = compiler.wire(&document(decls), &opts, &mut recorder);
    (result, recorder.into_calls())
}

fn handle_arg(id: &str, class: &str) -> Arg {
    Arg::Handle(wiring_scenario::Handle::new(ident(id), class))
}

const SAMPLE: &str = r#"
display_tools:
  id: tools
  clock_time: sntp_time
  setup_priority: 600
  on_play_sound:
    - logger.log: "play"
    - lambda: |-
        ESP_LOGI("tools", "sound %d", x);
dfplayer_pro:
  id: player
time:
  - platform: sntp
    id: sntp_time
    timezone: Europe/Kyiv
uart:
  - id: uart_bus
    tx_pin: 17
    rx_pin: 16
    baud_rate: 9600
"#;

fn sample() -> Document {
    Document::parse_named("sample.yaml", Arc::from(SAMPLE), &Catalog::builtin()).unwrap()
}

#[test]
fn options_apply_in_declared_order() {
    let decls = vec![
        widget("x"),
        widget("w")
            .with_option(opt("a"), Literal::Int(1))
            .with_option(opt("b"), ident("x"))
            .with_option(opt("c"), Literal::Int(2)),
    ];

    let (result, calls) = wire(decls, WireOrder::Dependency);
    result.unwrap();

    let setters: Vec<(&str, &str)> = calls
        .iter()
        .filter_map(|call| match call {
            Call::CallSetter { id, setter, .. } => Some((id.as_str(), setter.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(setters, [("w", "set_a"), ("w", "set_b"), ("w", "set_c")]);
}

#[test]
fn plan_separates_constructor_and_sorts_applications() {
    let decl = widget("w")
        .with_option(opt("c"), Literal::Int(2))
        .with_option(opt("parent"), ident("x"))
        .with_option(opt("a"), Literal::Int(1));
    let catalog = catalog();

    let plan = WiringPlan::build(&catalog, &decl).unwrap();
    assert_eq!(plan.constructor.len(), 1);
    assert_eq!(plan.constructor[0].0.as_str(), "parent");
    let applied: Vec<(usize, &str)> = plan
        .applications
        .iter()
        .map(|a| (a.seq, a.name.as_str()))
        .collect();
    assert_eq!(applied, [(0, "c"), (2, "a")]);

    let refs: Vec<(&str, &str, bool)> = plan
        .references()
        .map(|(option, target, constructor)| (option.as_str(), target.as_str(), constructor))
        .collect();
    assert_eq!(refs, [("parent", "x", true)]);
}

#[test]
fn a_then_b_end_to_end() {
    let decls = vec![
        widget("a"),
        widget("b")
            .with_option(opt("parent"), ident("a"))
            .with_option(opt("b"), ident("a")),
    ];

    let (result, calls) = wire(decls, WireOrder::Declared);
    let scenario = result.unwrap();

    let a = handle_arg("a", "test::Widget");
    assert_eq!(
        calls,
        [
            Call::Construct {
                id: ident("a"),
                class: "test::Widget".to_string(),
                args: Vec::new(),
            },
            Call::RegisterLifecycle { id: ident("a") },
            Call::Construct {
                id: ident("b"),
                class: "test::Widget".to_string(),
                args: vec![a.clone()],
            },
            Call::RegisterLifecycle { id: ident("b") },
            Call::CallSetter {
                id: ident("b"),
                setter: "set_b".to_string(),
                value: a,
            },
        ]
    );

    let order: Vec<&str> = scenario.components().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, ["a", "b"]);

    let b = scenario.get("b").unwrap();
    let deps: Vec<(&str, bool)> = b
        .dependencies
        .iter()
        .map(|d| (d.option.as_str(), d.constructor))
        .collect();
    assert_eq!(deps, [("parent", true), ("b", false)]);
    assert_eq!(b.constructor_dependencies().count(), 1);
}

#[test]
fn registration_order_is_topological() {
    let decls = vec![
        widget("c").with_option(opt("parent"), ident("b")),
        widget("b").with_option(opt("b"), ident("a")),
        widget("a"),
        widget("d"),
    ];

    let (result, _) = wire(decls, WireOrder::Dependency);
    let scenario = result.unwrap();
    let registry = scenario.components();

    for component in registry.iter() {
        let me = registry.position(component.id.as_str()).unwrap();
        for dep in &component.dependencies {
            let provider = registry.position(dep.target.as_str()).unwrap();
            assert!(provider < me, "{} registered after {}", dep.target, component.id);
        }
    }
    let order: Vec<&str> = registry.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, ["a", "b", "c", "d"]);
}

#[test]
fn missing_reference_registers_nothing_for_that_declaration() {
    let decls = vec![
        widget("a"),
        widget("b")
            .with_option(opt("a"), Literal::Int(1))
            .with_option(opt("b"), ident("ghost")),
    ];

    let (result, calls) = wire(decls, WireOrder::Dependency);
    let Err(Error::Resolve(ResolveError::UnresolvedDependency {
        id,
        option,
        target,
        reason,
    })) = &result
    else {
        panic!("expected an unresolved dependency, got {result:?}");
    };
    assert_eq!(id.as_str(), "b");
    assert_eq!(option.as_str(), "b");
    assert_eq!(target.as_str(), "ghost");
    assert_eq!(*reason, Unresolved::Missing);
    assert!(calls.iter().all(|call| call.id().as_str() == "a"));
}

#[test]
fn forward_optional_reference_fails_in_declared_order() {
    let decls = vec![widget("a").with_option(opt("b"), ident("z")), widget("z")];

    let (result, calls) = wire(decls.clone(), WireOrder::Declared);
    assert!(matches!(
        result,
        Err(Error::Resolve(ResolveError::UnresolvedDependency {
            reason: Unresolved::Pending,
            ..
        }))
    ));
    assert!(calls.is_empty());

    let (result, _) = wire(decls, WireOrder::Dependency);
    let order: Vec<String> = result
        .unwrap()
        .components()
        .iter()
        .map(|c| c.id.to_string())
        .collect();
    assert_eq!(order, ["z", "a"]);
}

#[test]
fn mutual_constructor_references_report_cycle() {
    let decls = vec![
        widget("p").with_option(opt("parent"), ident("q")),
        widget("q").with_option(opt("parent"), ident("p")),
    ];

    let (result, calls) = wire(decls.clone(), WireOrder::Dependency);
    let Err(Error::CycleDetected { path, cycle }) = &result else {
        panic!("expected a cycle, got {result:?}");
    };
    assert_eq!(cycle.first(), cycle.last());
    assert!(path == "p -> q -> p" || path == "q -> p -> q", "{path}");
    assert!(calls.is_empty());

    let (result, calls) = wire(decls, WireOrder::Declared);
    assert!(matches!(
        result,
        Err(Error::Resolve(ResolveError::UnresolvedDependency {
            reason: Unresolved::Pending,
            ..
        }))
    ));
    assert!(calls.is_empty());
}

#[test]
fn self_reference_is_unresolved() {
    let (result, calls) = wire(
        vec![widget("a").with_option(opt("b"), ident("a"))],
        WireOrder::Dependency,
    );
    assert!(matches!(
        result,
        Err(Error::Resolve(ResolveError::UnresolvedDependency { .. }))
    ));
    assert!(calls.is_empty());
}

#[test]
fn duplicate_identifier_in_document() {
    let (result, calls) = wire(vec![widget("a"), widget("a")], WireOrder::Dependency);
    let Err(Error::Resolve(ResolveError::DuplicateIdentifier { id })) = &result else {
        panic!("expected a duplicate identifier, got {result:?}");
    };
    assert_eq!(id.as_str(), "a");
    assert!(calls.is_empty());
}

#[test]
fn re_resolving_keeps_prior_registration() {
    let catalog = catalog();
    let mut recorder = RecordingEmitter::new();
    let mut table = IdentifierTable::new();
    let mut resolver = Resolver::new(&catalog, &mut recorder);

    let first = widget("a").with_option(opt("a"), Literal::Int(1));
    resolver.resolve(&first, &mut table).unwrap();

    let again = widget("a").with_option(opt("a"), Literal::Int(2));
    let err = resolver.resolve(&again, &mut table).unwrap_err();
    assert!(matches!(err, ResolveError::DuplicateIdentifier { .. }));
    assert_eq!(err.id().as_str(), "a");
    assert_eq!(resolver.registry().len(), 1);
    assert_eq!(resolver.state_of("a"), Some(&WiringState::Ready));
    drop(resolver);

    let setters: Vec<&Arg> = recorder
        .calls()
        .iter()
        .filter_map(|call| match call {
            Call::CallSetter { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(setters, [&Arg::Literal(Literal::Int(1))]);
}

#[test]
fn failed_declaration_ends_in_failed_state() {
    let catalog = catalog();
    let mut table = IdentifierTable::new();
    let mut resolver = Resolver::new(&catalog, RecordingEmitter::new());

    let decl = widget("b").with_option(opt("parent"), ident("missing"));
    resolver.resolve(&decl, &mut table).unwrap_err();

    let Some(WiringState::Failed(reason)) = resolver.state_of("b") else {
        panic!("expected failed state");
    };
    assert!(reason.contains("missing"), "{reason}");
    assert!(resolver.registry().is_empty());
    assert!(!table.is_resolved("b"));
}

#[test]
fn state_transitions() {
    use WiringState::*;

    let path = [
        Declared,
        ConstructorDepsResolving,
        Constructed,
        Registered,
        OptionsApplying,
        Ready,
    ];
    for pair in path.windows(2) {
        assert!(pair[0].can_advance_to(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        assert!(!pair[1].can_advance_to(&pair[0]));
    }
    for state in &path[..5] {
        assert!(state.can_advance_to(&Failed("boom".to_string())));
    }
    assert!(!Ready.can_advance_to(&Failed("boom".to_string())));
    assert!(!Failed("boom".to_string()).can_advance_to(&Declared));
    assert!(!Declared.can_advance_to(&Constructed));
}

#[test]
fn resolver_rejects_wrong_option_type() {
    let decl = widget("w").with_option(opt("a"), OptionValue::Literal(Literal::Bool(true)));
    let (result, calls) = wire(vec![decl], WireOrder::Dependency);
    let Err(Error::Resolve(ResolveError::InvalidOptionType {
        option,
        expected,
        found,
        ..
    })) = &result
    else {
        panic!("expected an invalid option type, got {result:?}");
    };
    assert_eq!(option.as_str(), "a");
    assert_eq!(expected, "an int literal");
    assert_eq!(found, "a bool literal");
    assert!(calls.is_empty());
}

#[test]
fn reference_to_wrong_class_is_rejected_before_construction() {
    let decls = vec![
        ComponentDeclaration::new(ident("clock"), Domain::new("time").unwrap()),
        ComponentDeclaration::new(ident("player"), Domain::new("dfplayer_pro").unwrap())
            .with_option(opt("uart_id"), ident("clock")),
    ];
    let (result, calls) = wire(decls, WireOrder::Declared);
    let Err(Error::Resolve(ResolveError::InvalidOptionType {
        id,
        option,
        expected,
        found,
    })) = &result
    else {
        panic!("expected an invalid option type, got {result:?}");
    };
    assert_eq!(id.as_str(), "player");
    assert_eq!(option.as_str(), "uart_id");
    assert_eq!(expected, "a reference to a uart::UARTComponent");
    assert_eq!(found, "a reference to `clock`, a sntp::SNTPComponent");
    assert!(calls.iter().all(|call| call.id().as_str() == "clock"));
}

#[test]
fn reference_accepts_base_class() {
    let decls = vec![
        ComponentDeclaration::new(ident("clock"), Domain::new("time").unwrap()),
        ComponentDeclaration::new(ident("tools"), Domain::new("display_tools").unwrap())
            .with_option(opt("clock_time"), ident("clock")),
    ];
    let (result, _) = wire(decls, WireOrder::Declared);
    result.unwrap();
}

static MISWIRED: ComponentSchema = ComponentSchema {
    domain: "miswired",
    namespace: "test",
    class: "Miswired",
    bases: &["Component"],
    header: "test/miswired.h",
    dependencies: &[],
    codeowners: &[],
    platforms: &[],
    multi: true,
    options: &[OptionSchema {
        name: "on_tick",
        kind: OptionKind::Literal {
            literal: LiteralKind::Int,
        },
        presence: Presence::Optional,
        stage: Stage::Trigger("get_tick_trigger"),
    }],
};

#[test]
fn trigger_option_without_automation_kind_fails() {
    let compiler = Compiler::new(catalog().with(&MISWIRED));
    let decl = ComponentDeclaration::new(ident("m"), Domain::new("miswired").unwrap())
        .with_option(opt("on_tick"), Literal::Int(1));
    let mut recorder = RecordingEmitter::new();
    let result = compiler.wire(
        &document(vec![decl]),
        &WireOptions::default(),
        &mut recorder,
    );

    let Err(Error::Resolve(ResolveError::InvalidOptionType { option, found, .. })) = &result
    else {
        panic!("expected an invalid option type, got {result:?}");
    };
    assert_eq!(option.as_str(), "on_tick");
    assert_eq!(found, "an int literal");
    assert!(
        !recorder
            .calls()
            .iter()
            .any(|call| matches!(call, Call::BuildAutomation { .. }))
    );
}

#[test]
fn resolver_rejects_unknown_types_and_options() {
    let stray = ComponentDeclaration::new(ident("s"), Domain::new("speaker").unwrap());
    let (result, _) = wire(vec![stray], WireOrder::Dependency);
    assert!(matches!(
        result,
        Err(Error::Resolve(ResolveError::UnknownComponentType { .. }))
    ));

    let decl = widget("w").with_option(opt("volume"), Literal::Int(3));
    let (result, _) = wire(vec![decl], WireOrder::Dependency);
    assert!(matches!(
        result,
        Err(Error::Resolve(ResolveError::UnknownOption { .. }))
    ));
}

#[test]
fn missing_constructor_dependency_is_reported() {
    let decl = ComponentDeclaration::new(ident("player"), Domain::new("dfplayer_pro").unwrap());
    let (result, _) = wire(vec![decl], WireOrder::Dependency);
    let Err(Error::Resolve(ResolveError::MissingOption { option, .. })) = &result else {
        panic!("expected a missing option, got {result:?}");
    };
    assert_eq!(option, "uart_id");
}

#[test]
fn setup_priority_is_passed_as_float() {
    let decl = widget("w").with_option(opt("setup_priority"), Literal::Int(800));
    let (result, calls) = wire(vec![decl], WireOrder::Dependency);
    result.unwrap();
    assert!(calls.contains(&Call::CallSetter {
        id: ident("w"),
        setter: "set_setup_priority".to_string(),
        value: Arg::Literal(Literal::Float(800.0)),
    }));
}

#[test]
fn wire_options_default_to_dependency_order() {
    assert_eq!(WireOptions::builder().build().order, WireOrder::Dependency);
    assert_eq!(WireOptions::default().order, WireOrder::Dependency);
}

#[test]
fn sample_config_wires_in_dependency_order() {
    let compiler = Compiler::default();
    let scenario = compiler.check(&sample(), &WireOptions::default()).unwrap();

    let order: Vec<&str> = scenario.components().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(order, ["sntp_time", "tools", "uart_bus", "player"]);
    assert_eq!(scenario.name(), "sample.yaml");

    let player = scenario.get("player").unwrap();
    assert_eq!(player.handle.class(), "dfplayer_pro::DFPlayerPro");
    assert_eq!(player.dependencies[0].target.as_str(), "uart_bus");
    assert!(player.dependencies[0].constructor);
}

#[test]
fn sample_config_records_automation() {
    let compiler = Compiler::default();
    let mut recorder = RecordingEmitter::new();
    compiler
        .wire(&sample(), &WireOptions::default(), &mut recorder)
        .unwrap();

    let automation = recorder
        .calls()
        .iter()
        .find_map(|call| match call {
            Call::BuildAutomation {
                id,
                trigger,
                actions,
            } => Some((id, trigger, actions)),
            _ => None,
        })
        .unwrap();
    assert_eq!(automation.0.as_str(), "tools");
    assert_eq!(automation.1, "get_on_play_trigger");
    assert_eq!(automation.2[0], Action::LoggerLog("play".to_string()));
    assert!(matches!(&automation.2[1], Action::Lambda(code) if code.contains("sound %d")));
}

#[test]
fn sample_config_emits_cpp() {
    let compiler = Compiler::default();
    let mut cpp = CppEmitter::new();
    compiler
        .wire(&sample(), &WireOptions::default(), &mut cpp)
        .unwrap();
    let source = cpp.render();

    assert!(source.contains("#include \"esphome/components/sntp/sntp_component.h\""));
    assert!(source.contains("display_tools::DisplayTools *tools;"));
    assert!(source.contains("  player = new dfplayer_pro::DFPlayerPro(uart_bus);\n"));
    assert!(source.contains("  tools->set_clock_time(sntp_time);\n"));
    assert!(source.contains("  tools->set_setup_priority(600.0);\n"));
    assert!(source.contains("  sntp_time->set_timezone(\"Europe/Kyiv\");\n"));
    assert!(source.contains(
        "  automation_id = new Automation<int>(tools->get_on_play_trigger());\n"
    ));
    assert!(source.contains("    ESP_LOGI(\"tools\", \"sound %d\", x);\n"));

    let construct_bus = source.find("uart_bus = new").unwrap();
    let construct_player = source.find("player = new").unwrap();
    let register_player = source.find("App.register_component(player);").unwrap();
    assert!(construct_bus < construct_player && construct_player < register_player);
}
