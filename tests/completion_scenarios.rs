//! End-to-end completion scenarios over a small fixture index.

use std::sync::Arc;

use indoc::indoc;
use java_completion::completion::{CompletionOptions, ProposalKind, collect_completions};
use java_completion::index::{
    FieldMetadata, MethodMetadata, Modifiers, Parameter, TypeIndex, TypeKind, TypeMetadata,
};

fn method(name: &str, params: &[(&str, &str)], ret: &str, modifiers: Modifiers) -> Arc<MethodMetadata> {
    Arc::new(MethodMetadata {
        name: Arc::from(name),
        modifiers,
        type_parameters: vec![],
        parameters: params
            .iter()
            .map(|(n, t)| Parameter {
                name: Some(Arc::from(*n)),
                ty: Arc::from(*t),
            })
            .collect(),
        return_type: Arc::from(ret),
        thrown: vec![],
        is_constructor: false,
        is_varargs: false,
        deprecated: false,
    })
}

fn field(name: &str, ty: &str, modifiers: Modifiers) -> Arc<FieldMetadata> {
    Arc::new(FieldMetadata {
        name: Arc::from(name),
        modifiers,
        ty: Arc::from(ty),
        is_enum_constant: false,
        has_constant_value: false,
        deprecated: false,
    })
}

fn fixture_index() -> TypeIndex {
    let mut idx = TypeIndex::new();

    let mut object = TypeMetadata::new("java.lang.Object", TypeKind::Class);
    object.methods = vec![
        method("toString", &[], "java.lang.String", Modifiers::PUBLIC),
        method("hashCode", &[], "int", Modifiers::PUBLIC),
        method("equals", &[("obj", "java.lang.Object")], "boolean", Modifiers::PUBLIC),
    ];

    let mut string = TypeMetadata::new("java.lang.String", TypeKind::Class);
    string.modifiers |= Modifiers::FINAL;
    string.superclass = Some(Arc::from("java.lang.Object"));
    string.methods = vec![
        method("length", &[], "int", Modifiers::PUBLIC),
        method("charAt", &[("index", "int")], "char", Modifiers::PUBLIC),
        method("isEmpty", &[], "boolean", Modifiers::PUBLIC),
    ];

    let runnable = {
        let mut t = TypeMetadata::new("java.lang.Runnable", TypeKind::Interface);
        t.methods = vec![method("run", &[], "void", Modifiers::PUBLIC | Modifiers::ABSTRACT)];
        t
    };

    let mut list = TypeMetadata::new("java.util.List", TypeKind::Interface);
    list.methods = vec![
        method("size", &[], "int", Modifiers::PUBLIC | Modifiers::ABSTRACT),
        method("add", &[("e", "java.lang.Object")], "boolean", Modifiers::PUBLIC | Modifiers::ABSTRACT),
    ];

    let mut exception = TypeMetadata::new("java.lang.Exception", TypeKind::Class);
    exception.superclass = Some(Arc::from("java.lang.Object"));
    let mut ioe = TypeMetadata::new("java.io.IOException", TypeKind::Class);
    ioe.superclass = Some(Arc::from("java.lang.Exception"));
    let mut fnf = TypeMetadata::new("java.io.FileNotFoundException", TypeKind::Class);
    fnf.superclass = Some(Arc::from("java.io.IOException"));
    let mut rte = TypeMetadata::new("java.lang.RuntimeException", TypeKind::Class);
    rte.superclass = Some(Arc::from("java.lang.Exception"));

    let mut base = TypeMetadata::new("p.A", TypeKind::Class);
    base.superclass = Some(Arc::from("java.lang.Object"));
    base.fields = vec![
        field("secret", "int", Modifiers::PRIVATE),
        field("open", "int", Modifiers::PUBLIC),
    ];

    let mut sub = TypeMetadata::new("q.B", TypeKind::Class);
    sub.superclass = Some(Arc::from("p.A"));

    let mut runner = TypeMetadata::new("p.Runner", TypeKind::Interface);
    runner.methods = vec![method(
        "run",
        &[],
        "void",
        Modifiers::PUBLIC | Modifiers::DEFAULT,
    )];
    let mut task = TypeMetadata::new("p.Task", TypeKind::Class);
    task.superclass = Some(Arc::from("java.lang.Object"));
    task.interfaces = vec![Arc::from("p.Runner")];
    task.methods = vec![method("run", &[], "void", Modifiers::PUBLIC)];

    let mut color = TypeMetadata::new("p.Color", TypeKind::Enum);
    color.modifiers |= Modifiers::FINAL;
    let mut util = TypeMetadata::new("p.FinalUtil", TypeKind::Class);
    util.modifiers |= Modifiers::FINAL;

    let mut main = TypeMetadata::new("p.Main", TypeKind::Class);
    main.superclass = Some(Arc::from("java.lang.Object"));
    main.methods = vec![
        {
            let mut m = (*method("m", &[], "void", Modifiers::PUBLIC)).clone();
            m.thrown = vec![Arc::from("java.io.IOException")];
            Arc::new(m)
        },
        {
            let mut m = (*method("n", &[], "void", Modifiers::PUBLIC)).clone();
            m.thrown = vec![Arc::from("java.io.FileNotFoundException")];
            Arc::new(m)
        },
    ];

    idx.add_types([
        object, string, runnable, list, exception, ioe, fnf, rte, base, sub, runner, task, color,
        util, main,
    ]);
    idx
}

fn complete_at(src: &str, marker: &str, idx: &TypeIndex) -> Vec<java_completion::CompletionProposal> {
    init_logging();
    let offset = src.find(marker).map(|p| p + marker.len()).unwrap();
    collect_completions(src, offset, idx, &CompletionOptions::default()).unwrap()
}

/// `JAVA_COMPLETION_LOG=debug cargo test` shows the engine's tracing.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("JAVA_COMPLETION_LOG")
                .unwrap_or_else(|_| EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();
}

#[test]
fn local_variable_prefix_completion() {
    let idx = fixture_index();
    let src = "class Foo { void bar() { int count = 0; cou } }";
    let offset = src.find("cou }").unwrap() + 3;
    let proposals = collect_completions(src, offset, &idx, &CompletionOptions::default()).unwrap();

    let count = proposals
        .iter()
        .find(|p| p.kind == ProposalKind::LocalVariableRef && p.name.as_ref() == "count")
        .expect("local variable `count` proposed");
    // Replace range spans exactly `cou`.
    assert_eq!(count.replace_range, offset - 3..offset);
    // Case-sensitive prefix match outranks the plain baseline.
    assert!(
        count.relevance
            >= java_completion::completion::relevance::baseline_resolved()
                + java_completion::completion::relevance::R_CASE_PREFIX
    );
    // Statement-expression position: no type keywords.
    assert!(
        proposals
            .iter()
            .all(|p| p.kind != ProposalKind::Keyword
                || !matches!(p.name.as_ref(), "int" | "boolean" | "void" | "long")),
        "type keywords must not appear in expression position"
    );
}

#[test]
fn implements_clause_offers_interfaces_only() {
    let idx = fixture_index();
    let src = "class Foo implements  {}";
    let offset = src.find("implements ").unwrap() + "implements ".len();
    let proposals = collect_completions(src, offset, &idx, &CompletionOptions::default()).unwrap();

    assert!(
        proposals.iter().any(|p| p.name.as_ref() == "Runnable"),
        "interfaces must be proposed: {:?}",
        proposals.iter().map(|p| p.name.as_ref()).collect::<Vec<_>>()
    );
    assert!(proposals.iter().any(|p| p.name.as_ref() == "List"));
    for p in &proposals {
        assert_ne!(p.name.as_ref(), "Foo", "the declared type itself must never appear");
        assert_ne!(p.name.as_ref(), "Color", "enums are not implementable");
        assert_ne!(p.name.as_ref(), "FinalUtil", "final classes are not implementable");
        assert_ne!(p.name.as_ref(), "String", "classes are not implementable");
    }
}

#[test]
fn member_access_on_local_string() {
    let idx = fixture_index();
    let src = r#"class Foo { void f() { String s = ""; s.len } }"#;
    let proposals = complete_at(src, "s.len", &idx);
    let length = proposals
        .iter()
        .find(|p| p.name.as_ref() == "length")
        .expect("String.length proposed");
    assert_eq!(length.kind, ProposalKind::MethodRef);
    assert_eq!(length.signature.as_deref(), Some("length()"));
    assert_eq!(length.declaring_type.as_deref(), Some("java.lang.String"));
}

#[test]
fn inherited_members_visible_through_receiver() {
    let idx = fixture_index();
    let src = r#"class Foo { void f() { String s = ""; s.toS } }"#;
    let proposals = complete_at(src, "s.toS", &idx);
    let to_string = proposals
        .iter()
        .find(|p| p.name.as_ref() == "toString")
        .expect("inherited toString proposed");
    assert_eq!(to_string.declaring_type.as_deref(), Some("java.lang.Object"));
}

#[test]
fn private_field_never_leaks_across_classes() {
    let idx = fixture_index();
    // q.B extends p.A; A.secret is private and must stay invisible even
    // on an exact prefix match.
    let src = indoc! {r#"
        package q;
        class B extends p.A { }
        class Use {
            void f(B b) {
                b.sec
            }
        }
    "#};
    let proposals = complete_at(src, "b.sec", &idx);
    assert!(
        proposals.iter().all(|p| p.name.as_ref() != "secret"),
        "private field leaked: {:?}",
        proposals.iter().map(|p| p.name.as_ref()).collect::<Vec<_>>()
    );
    let src_open = src.replace("b.sec", "b.op");
    let offset = src_open.find("b.op").unwrap() + 4;
    let proposals =
        collect_completions(&src_open, offset, &idx, &CompletionOptions::default()).unwrap();
    assert!(proposals.iter().any(|p| p.name.as_ref() == "open"));
}

#[test]
fn override_appears_exactly_once() {
    let idx = fixture_index();
    let src = r#"class Foo { void f() { p.Task t = null; t.ru } }"#;
    let proposals = complete_at(src, "t.ru", &idx);
    let runs: Vec<_> = proposals.iter().filter(|p| p.name.as_ref() == "run").collect();
    assert_eq!(runs.len(), 1, "override must collapse to one proposal");
    assert_eq!(runs[0].declaring_type.as_deref(), Some("p.Task"));
}

#[test]
fn catch_completion_ranks_discouraged_lower() {
    let idx = fixture_index();
    let src = indoc! {r#"
        package p;
        class Main {
            void f() {
                try {
                    m();
                    try {
                        n();
                    } catch (java.io.FileNotFoundException inner) {
                    }
                } catch () {
                }
            }
        }
    "#};
    let offset = src.find("catch ()").unwrap() + "catch (".len();
    let proposals = collect_completions(src, offset, &idx, &CompletionOptions::default()).unwrap();
    let ioe = proposals
        .iter()
        .find(|p| p.name.as_ref() == "IOException")
        .expect("uncaught IOException proposed");
    let fnf = proposals
        .iter()
        .find(|p| p.name.as_ref() == "FileNotFoundException")
        .expect("inner-caught exception still proposed, just lower");
    assert!(
        ioe.relevance > fnf.relevance,
        "discouraged catch candidate must rank below uncaught ones ({} vs {})",
        ioe.relevance,
        fnf.relevance
    );
}

#[test]
fn deterministic_output() {
    let idx = fixture_index();
    let src = r#"class Foo { void f() { String s = ""; s. } }"#;
    let offset = src.find("s. ").unwrap() + 2;
    let first: Vec<(String, i32)> =
        collect_completions(src, offset, &idx, &CompletionOptions::default())
            .unwrap()
            .iter()
            .map(|p| (p.name.to_string(), p.relevance))
            .collect();
    let second: Vec<(String, i32)> =
        collect_completions(src, offset, &idx, &CompletionOptions::default())
            .unwrap()
            .iter()
            .map(|p| (p.name.to_string(), p.relevance))
            .collect();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn replace_ranges_stay_in_bounds() {
    let idx = fixture_index();
    let sources = [
        ("class Foo { void bar() { int count = 0; cou } }", "cou"),
        (r#"class Foo { void f() { String s = ""; s.len } }"#, "s.len"),
        ("class Foo implements  {}", "implements "),
    ];
    for (src, marker) in sources {
        let offset = src.find(marker).unwrap() + marker.len();
        let proposals =
            collect_completions(src, offset, &idx, &CompletionOptions::default()).unwrap();
        for p in proposals {
            assert!(p.replace_range.start <= p.replace_range.end, "{src}");
            assert!(p.replace_range.end <= offset + 1, "{src}");
            assert!(p.replace_range.end <= src.len());
        }
    }
}

#[test]
fn expected_type_surfaces_in_context_record() {
    let idx = fixture_index();
    let src = "class Foo { void f() { int x = ; } }";
    let offset = src.find("= ;").unwrap() + 2;
    let mut collector = java_completion::ProposalCollector::new();
    let cancel = java_completion::CancellationToken::new();
    java_completion::complete(
        src,
        offset,
        &idx,
        &CompletionOptions::default(),
        &mut collector,
        &cancel,
    )
    .unwrap();
    let ctx = collector.context.expect("context record delivered");
    assert_eq!(ctx.expected_types, vec![Arc::<str>::from("int")]);
}

#[test]
fn unimported_type_carries_required_import() {
    let idx = fixture_index();
    let src = "package app;\nclass Foo { void f() { Tas } }";
    let proposals = complete_at(src, "{ Tas", &idx);
    let task = proposals
        .iter()
        .find(|p| p.name.as_ref() == "Task")
        .expect("searched type proposed");
    assert_eq!(task.required.len(), 1);
    assert_eq!(task.required[0].kind, ProposalKind::TypeImport);
    assert_eq!(task.required[0].completion, "import p.Task;\n");
    // Required proposals carry the parent's relevance.
    assert_eq!(task.required[0].relevance, task.relevance);
}

#[test]
fn chained_call_completes_on_return_type() {
    let idx = fixture_index();
    let src = r#"class Foo { void f() { String s = ""; s.toString(). } }"#;
    let proposals = complete_at(src, "s.toString().", &idx);
    assert!(
        proposals.iter().any(|p| p.name.as_ref() == "length"),
        "chained call must complete on the return type: {:?}",
        proposals.iter().map(|p| p.name.as_ref()).collect::<Vec<_>>()
    );
}
