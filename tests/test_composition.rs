//! End-to-end composition builds over in-memory element trees.
//!
//! Each test assembles one translation unit, closes it, and checks the
//! composition view: classification, dependency order, executor contexts
//! and signal wiring.

use once_cell::sync::Lazy;
use weld::base::Fqn;
use weld::compose::EntryType;
use weld::tree::{symbol_element, Element, ElementBuilder, ExpressionBuilder};
use weld::{Composition, CompositionView, Error, Result, SourceSet, TranslationUnit};

fn unit(children: Vec<Element>) -> Element {
    ElementBuilder::new("unit")
        .children("children", children)
        .build()
}

fn app(entries: Vec<Element>) -> Element {
    ElementBuilder::new("composition")
        .attr("name", "app")
        .children("composition", entries)
        .build()
}

fn connect(writer: Element, reader: Element) -> Element {
    ExpressionBuilder::new()
        .call("connect", [writer, reader])
        .build()
}

/// A component with a non-const `out` endpoint.
fn sensor() -> Element {
    ElementBuilder::new("component")
        .attr("name", "Sensor")
        .children(
            "interface",
            vec![
                ExpressionBuilder::named("out").symbol("Integer").build(),
                ExpressionBuilder::named("fixed")
                    .symbol("Integer")
                    .const_()
                    .build(),
            ],
        )
        .build()
}

/// A component with const receivers of two different types.
fn sink() -> Element {
    ElementBuilder::new("component")
        .attr("name", "Sink")
        .children(
            "interface",
            vec![
                ExpressionBuilder::named("input")
                    .symbol("Integer")
                    .const_()
                    .build(),
                ExpressionBuilder::named("level")
                    .symbol("Float")
                    .const_()
                    .build(),
                ExpressionBuilder::named("raw").symbol("Integer").build(),
            ],
        )
        .build()
}

fn build(children: Vec<Element>) -> Result<CompositionView> {
    build_for(children, None)
}

fn build_for(children: Vec<Element>, target: Option<&str>) -> Result<CompositionView> {
    let sources = SourceSet::new();
    let unit = TranslationUnit::build("main.bdl", unit(children), &sources)?;
    let mut composition = Composition::new();
    composition.add_unit(&unit.symbols)?;
    composition.build(target)
}

fn registry_keys(view: &CompositionView, context: &str) -> Vec<String> {
    view.registry(context)
        .keys()
        .map(|fqn| fqn.to_string())
        .collect()
}

#[test]
fn test_config_value_below_inherited_minimum_rejected() {
    let base = ElementBuilder::new("struct")
        .attr("name", "Base")
        .child(
            "config",
            ExpressionBuilder::named("v")
                .call("Integer", [ExpressionBuilder::lit("10")])
                .contract("min", &["10"]),
        )
        .build();
    let derived = ElementBuilder::new("struct")
        .attr("name", "Derived")
        .child("inheritance", symbol_element("Base"))
        .build();
    let d = ExpressionBuilder::named("d")
        .call("Derived", [ExpressionBuilder::named_lit("v", "5")])
        .build();

    let err = build(vec![base, derived, app(vec![d])]).unwrap_err();
    match err {
        Error::ContractViolation { message, .. } => {
            assert!(
                message.contains("lower than the required minimum"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected a contract violation, got: {other}"),
    }
}

#[test]
fn test_unreferenced_registry_entries_stay_out() {
    let base = ElementBuilder::new("struct")
        .attr("name", "Base")
        .child(
            "config",
            ExpressionBuilder::named("v")
                .call("Integer", [ExpressionBuilder::lit("10")])
                .contract("min", &["10"]),
        )
        .build();
    let d = ExpressionBuilder::named("d")
        .call("Base", [ExpressionBuilder::named_lit("v", "12")])
        .build();

    let view = build(vec![base, app(vec![d])]).unwrap();
    assert_eq!(view.contexts(), ["~default"]);
    assert_eq!(
        view.entries().count(),
        0,
        "nothing depends on 'd', so nothing materializes"
    );
}

/// A minimal wired composition shared by the read-only connection tests.
static WIRED: Lazy<CompositionView> = Lazy::new(|| {
    build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.input"),
            ),
        ]),
    ])
    .unwrap()
});

#[test]
fn test_connected_instances_materialize_in_order() {
    assert_eq!(registry_keys(&WIRED, "~default"), ["app.x", "app.y"]);
}

#[test]
fn test_connection_wires_writer_to_reader() {
    let groups: Vec<_> = WIRED.connections().collect();
    assert_eq!(groups.len(), 1);
    let (writer, group) = groups[0];
    assert_eq!(writer.instance, Fqn::new("app.x"));
    assert_eq!(writer.member, "out");
    assert_eq!(group.signal, Some(Fqn::new("Integer")));
    let readers: Vec<String> = group.readers.keys().map(|r| r.to_string()).collect();
    assert_eq!(readers, ["app.y.input"]);
}

#[test]
fn test_connection_type_mismatch_rejected() {
    let err = build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.level"),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("between the same types"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_connection_reader_must_be_const() {
    let err = build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.raw"),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("must be marked as const"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_connection_writer_must_not_be_const() {
    let err = build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.fixed"),
                ExpressionBuilder::sym("y.input"),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("must not be marked as const"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_duplicate_connection_rejected() {
    let err = build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.input"),
            ),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.input"),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("defined multiple times"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_reader_accepts_a_single_writer() {
    let err = build(vec![
        sensor(),
        sink(),
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("x2").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.input"),
            ),
            connect(
                ExpressionBuilder::sym("x2.out"),
                ExpressionBuilder::sym("y.input"),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("already connected to a sender"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_varargs_reader_accepts_multiple_writers() {
    let mut all = ExpressionBuilder::named("all")
        .symbol("Integer")
        .const_()
        .build();
    all.set_attr("varargs", "");
    let hub = ElementBuilder::new("component")
        .attr("name", "Hub")
        .child("interface", all)
        .build();

    let view = build(vec![
        sensor(),
        hub,
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("x2").call("Sensor", []).build(),
            ExpressionBuilder::named("h").call("Hub", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("h.all"),
            ),
            connect(
                ExpressionBuilder::sym("x2.out"),
                ExpressionBuilder::sym("h.all"),
            ),
        ]),
    ])
    .unwrap();
    assert_eq!(view.connections().count(), 2);
}

#[test]
fn test_sole_executor_claims_the_default_context() {
    let clock = ElementBuilder::new("component")
        .attr("name", "Clock")
        .child("inheritance", symbol_element("Executor"))
        .build();
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .build();

    let view = build(vec![
        clock,
        worker,
        app(vec![
            ExpressionBuilder::named("e").call("Clock", []).build(),
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w").call("c.run", []).build(),
        ]),
    ])
    .unwrap();

    assert_eq!(view.contexts(), ["app.e"]);
    assert_eq!(view.workloads("app.e").len(), 1);
    assert!(view.services("app.e").is_empty());
    let keys = registry_keys(&view, "app.e");
    assert!(keys.contains(&"app.e".to_string()));
    assert!(keys.contains(&"app.c".to_string()));
    let entry = view.entry(&Fqn::new("app.e")).unwrap();
    assert!(entry.entry_type.contains(EntryType::EXECUTOR));
}

#[test]
fn test_multi_executor_composition_requires_assignment() {
    let clock = ElementBuilder::new("component")
        .attr("name", "Clock")
        .child("inheritance", symbol_element("Executor"))
        .build();
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .build();

    let err = build(vec![
        clock,
        worker,
        app(vec![
            ExpressionBuilder::named("e1").call("Clock", []).build(),
            ExpressionBuilder::named("e2").call("Clock", []).build(),
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w").call("c.run", []).build(),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("no executor is assigned"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_executor_contract_selects_the_context() {
    let clock = ElementBuilder::new("component")
        .attr("name", "Clock")
        .child("inheritance", symbol_element("Executor"))
        .build();
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .build();

    let view = build(vec![
        clock,
        worker,
        app(vec![
            ExpressionBuilder::named("e1").call("Clock", []).build(),
            ExpressionBuilder::named("e2").call("Clock", []).build(),
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w")
                .call("c.run", [])
                .contract("executor", &["e1"])
                .build(),
        ]),
    ])
    .unwrap();

    assert_eq!(view.contexts(), ["app.e1", "app.e2"]);
    assert_eq!(view.workloads("app.e1").len(), 1);
    assert!(view.workloads("app.e2").is_empty());
}

#[test]
fn test_lifecycle_and_nested_composition_expand() {
    let sub = ElementBuilder::new("component").attr("name", "Sub").build();
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .children(
            "interface",
            vec![
                ElementBuilder::new("method").attr("name", "run").build(),
                ElementBuilder::new("method")
                    .attr("name", "warmup")
                    .contract("init", &[])
                    .build(),
                ElementBuilder::new("method")
                    .attr("name", "drain")
                    .contract("shutdown", &[])
                    .build(),
            ],
        )
        .child(
            "composition",
            ExpressionBuilder::named("sub").call("Sub", []),
        )
        .build();

    let view = build(vec![
        sub,
        worker,
        app(vec![
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w").call("c.run", []).build(),
        ]),
    ])
    .unwrap();

    let entry = view.entry(&Fqn::new("app.c")).unwrap();
    assert_eq!(entry.init.len(), 1);
    assert_eq!(entry.shutdown.len(), 1);
    assert_eq!(entry.intra.len(), 1);
    // The nested instance materializes before its owner is complete.
    assert_eq!(registry_keys(&view, "~default"), ["app.c", "app.c.sub"]);
}

#[test]
fn test_service_entry_never_demotes_a_workload() {
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .child(
            "composition",
            ExpressionBuilder::new().call("this.run", []),
        )
        .build();

    let view = build(vec![
        worker,
        app(vec![
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::new().call("c.run", []).build(),
        ]),
    ])
    .unwrap();

    // The explicit workload and the component's own background call share
    // one identity; the workload wins.
    assert_eq!(view.workloads("~default").len(), 1);
    assert!(view.services("~default").is_empty());
    assert!(registry_keys(&view, "~default").contains(&"app.c".to_string()));
}

#[test]
fn test_background_service_classification() {
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .children(
            "interface",
            vec![
                ElementBuilder::new("method").attr("name", "run").build(),
                ElementBuilder::new("method").attr("name", "poll").build(),
            ],
        )
        .child(
            "composition",
            ExpressionBuilder::named("poller").call("this.poll", []),
        )
        .build();

    let view = build(vec![
        worker,
        app(vec![
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w").call("c.run", []).build(),
        ]),
    ])
    .unwrap();

    assert_eq!(view.workloads("~default").len(), 1);
    assert_eq!(view.services("~default").len(), 1);
}

#[test]
fn test_mutual_instance_references_rejected() {
    let alpha = ElementBuilder::new("component")
        .attr("name", "Alpha")
        .child("config", ExpressionBuilder::named("peer").symbol("Beta"))
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .build();
    let beta = ElementBuilder::new("component")
        .attr("name", "Beta")
        .child("config", ExpressionBuilder::named("peer").symbol("Alpha"))
        .build();

    let err = build(vec![
        alpha,
        beta,
        app(vec![
            ExpressionBuilder::named("a")
                .call("Alpha", [ExpressionBuilder::named("peer").symbol("b").build()])
                .build(),
            ExpressionBuilder::named("b")
                .call("Beta", [ExpressionBuilder::named("peer").symbol("a").build()])
                .build(),
            ExpressionBuilder::named("w").call("a.run", []).build(),
        ]),
    ])
    .unwrap_err();

    assert!(
        err.to_string().contains("circular resolution"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_unresolved_symbol_carries_suggestions() {
    let err = build(vec![
        sensor(),
        app(vec![ExpressionBuilder::named("x").call("Sensr", []).build()]),
    ])
    .unwrap_err();

    match err {
        Error::UnresolvedSymbol { name, suggestions, .. } => {
            assert_eq!(name, "Sensr");
            assert!(
                suggestions.iter().any(|s| s == "Sensor"),
                "missing suggestion in {suggestions:?}"
            );
        }
        other => panic!("expected an unresolved symbol, got: {other}"),
    }
}

#[test]
fn test_recorder_pattern_matches_signals() {
    let tap = ElementBuilder::new("component")
        .attr("name", "Tap")
        .child("inheritance", symbol_element("Recorder"))
        .child(
            "interface",
            ExpressionBuilder::named("drain").symbol("Integer").const_(),
        )
        .build();

    let view = build(vec![
        sensor(),
        sink(),
        tap,
        app(vec![
            ExpressionBuilder::named("x").call("Sensor", []).build(),
            ExpressionBuilder::named("y").call("Sink", []).build(),
            ExpressionBuilder::named("r").call("Tap", []).build(),
            connect(
                ExpressionBuilder::sym("x.out"),
                ExpressionBuilder::sym("y.input"),
            ),
            connect(ExpressionBuilder::sym("r.drain"), ExpressionBuilder::lit("\"out\"")),
        ]),
    ])
    .unwrap();

    let groups: Vec<_> = view.connections().collect();
    assert_eq!(groups.len(), 1);
    let readers: Vec<String> = groups[0].1.readers.keys().map(|r| r.to_string()).collect();
    assert_eq!(readers, ["app.y.input", "app.r.drain"]);
}

#[test]
fn test_recorder_without_match_rejected() {
    let tap = ElementBuilder::new("component")
        .attr("name", "Tap")
        .child("inheritance", symbol_element("Recorder"))
        .child(
            "interface",
            ExpressionBuilder::named("drain").symbol("Integer").const_(),
        )
        .build();

    let err = build(vec![
        tap,
        app(vec![
            ExpressionBuilder::named("r").call("Tap", []).build(),
            connect(
                ExpressionBuilder::sym("r.drain"),
                ExpressionBuilder::lit("\"nothing\""),
            ),
        ]),
    ])
    .unwrap_err();
    assert!(
        err.to_string().contains("does not match any signal"),
        "unexpected error: {err}"
    );
}

#[test]
fn test_platform_entries_serve_every_context() {
    let clock = ElementBuilder::new("component")
        .attr("name", "Clock")
        .child("inheritance", symbol_element("Executor"))
        .build();
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child("interface", ElementBuilder::new("method").attr("name", "run"))
        .build();
    let platform = ElementBuilder::new("composition")
        .attr("name", "platform")
        .child("composition", ExpressionBuilder::named("probe").call("Sensor", []))
        .build();

    let view = build(vec![
        sensor(),
        clock,
        worker,
        platform,
        app(vec![
            ExpressionBuilder::named("e1").call("Clock", []).build(),
            ExpressionBuilder::named("e2").call("Clock", []).build(),
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::named("w")
                .call("c.run", [])
                .contract("executor", &["e1"])
                .build(),
        ]),
    ])
    .unwrap();

    let platform_entries = view.platform();
    assert_eq!(platform_entries.len(), 1);
    let probe = &platform_entries[0];
    assert!(probe.executors.contains("app.e1"));
    assert!(probe.executors.contains("app.e2"));
}

#[test]
fn test_target_substitution_resolves_per_build() {
    let children = vec![
        ElementBuilder::new("namespace").attr("name", "hw").build(),
        ElementBuilder::new("component")
            .attr("name", "Led")
            .child("interface", ElementBuilder::new("method").attr("name", "blink"))
            .build(),
        app(vec![
            ExpressionBuilder::named("led").call("target.Led", []).build(),
            ExpressionBuilder::named("w").call("led.blink", []).build(),
        ]),
    ];

    let view = build_for(children, Some("hw")).unwrap();
    let entry = view.entry(&Fqn::new("hw.app.led")).unwrap();
    assert_eq!(
        entry.expression.underlying_type,
        Some(Fqn::new("hw.Led"))
    );
    assert_eq!(view.workloads("~default").len(), 1);
}

#[test]
fn test_duplicate_top_level_declaration_rejected() {
    let err = build(vec![sensor(), sensor(), app(vec![])]).unwrap_err();
    match err {
        Error::SymbolConflict { fqn, .. } => assert_eq!(fqn, "Sensor"),
        other => panic!("expected a symbol conflict, got: {other}"),
    }
}

#[test]
fn test_conflicting_entries_of_one_identity_rejected() {
    let worker = ElementBuilder::new("component")
        .attr("name", "Worker")
        .child(
            "interface",
            ElementBuilder::new("method")
                .attr("name", "run")
                .child("argument", ExpressionBuilder::named("n").symbol("Integer")),
        )
        .build();

    // Unnamed calls share the identity of the method they invoke; two of
    // them with diverging arguments cannot coexist.
    let err = build(vec![
        worker,
        app(vec![
            ExpressionBuilder::named("c").call("Worker", []).build(),
            ExpressionBuilder::new()
                .call("c.run", [ExpressionBuilder::lit("1")])
                .build(),
            ExpressionBuilder::new()
                .call("c.run", [ExpressionBuilder::lit("2")])
                .build(),
        ]),
    ])
    .unwrap_err();
    match err {
        Error::SymbolConflict { fqn, .. } => assert_eq!(fqn, "Worker.run"),
        other => panic!("expected a symbol conflict, got: {other}"),
    }
}
