//! Property-based tests for pageview.
//!
//! Uses proptest to check that the runtime's invariants hold for arbitrary
//! inputs: widget fill/read round trips, navigation graph validation,
//! switchable view exclusivity, version dispatch and XPath quoting.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pageview::mock::trees::DynaTreePage;
use pageview::mock::{MockDriver, MockElement};
use pageview::prelude::*;
use pageview::RuntimeConfig;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::rc::Rc;

fn browser(mock: &Rc<MockDriver>, version: &str) -> Browser {
    let config = RuntimeConfig::builder()
        .page_safe_timeout_ms(20)
        .page_safe_poll_ms(1)
        .tree_timeouts_ms(40, 40)
        .observed_field_wait_ms(1)
        .build()
        .unwrap();
    Browser::builder(mock.clone())
        .config(config)
        .product_version(version)
        .build()
}

const OPTIONS: [&str; 4] = ["default", "east", "west", "north"];

#[derive(View)]
struct SettingsForm {
    node: Node,
    #[widget(TextInput::by_name("name"))]
    name: TextInput,
    #[widget(Checkbox::by_name("enabled"))]
    enabled: Checkbox,
    #[widget(Select::by_id("zone"))]
    zone: Select,
}

fn settings_page(mock: &MockDriver) {
    mock.add(
        None,
        ".//*[(self::input or self::textarea) and @name='name']",
        MockElement::input("text"),
    );
    mock.add(
        None,
        ".//input[@type='checkbox' and @name='enabled']",
        MockElement::input("checkbox"),
    );
    let select = mock.add(None, ".//select[@id='zone']", MockElement::new("select"));
    for label in OPTIONS {
        mock.add(
            Some(&select),
            ".//option",
            MockElement::new("option").text(label).selected(label == "default"),
        );
    }
}

// === Widget Round Trip Properties ===

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Reading after a fill returns what was filled.
    #[test]
    fn prop_fill_then_read_round_trips(
        name in "[a-zA-Z0-9_]{1,16}",
        enabled in any::<bool>(),
        zone in 0..OPTIONS.len()
    ) {
        let mock = Rc::new(MockDriver::new());
        settings_page(&mock);
        let form = SettingsForm::new(&browser(&mock, "5.10.1"));
        let payload = json!({"name": name, "enabled": enabled, "zone": OPTIONS[zone]});

        form.fill(&payload).unwrap();
        prop_assert_eq!(form.read().unwrap(), payload);
    }

    /// Filling the same values twice changes nothing the second time.
    #[test]
    fn prop_second_fill_is_noop(
        name in "[a-zA-Z0-9_]{0,16}",
        enabled in any::<bool>(),
        zone in 0..OPTIONS.len()
    ) {
        let mock = Rc::new(MockDriver::new());
        settings_page(&mock);
        let form = SettingsForm::new(&browser(&mock, "5.10.1"));
        let payload = json!({"name": name, "enabled": enabled, "zone": OPTIONS[zone]});

        form.fill(&payload).unwrap();
        mock.clear_history();
        prop_assert!(!form.fill(&payload).unwrap());
        prop_assert!(!mock.was_called("click"));
        prop_assert!(!mock.was_called("send_keys"));
    }

    /// Keys missing from a fill leave their widgets untouched.
    #[test]
    fn prop_partial_fill_touches_only_named_widgets(enabled in any::<bool>()) {
        let mock = Rc::new(MockDriver::new());
        settings_page(&mock);
        let form = SettingsForm::new(&browser(&mock, "5.10.1"));
        mock.clear_history();

        let changed = form.fill(&json!({"enabled": enabled})).unwrap();
        prop_assert_eq!(changed, enabled);
        prop_assert!(!mock.was_called("send_keys"));
        prop_assert_eq!(form.zone.read().unwrap(), json!("default"));
    }
}

// === Navigation Graph Properties ===

#[derive(View)]
#[view(locator = "#anywhere")]
struct Anywhere {
    node: Node,
}

#[derive(Debug)]
#[allow(dead_code)]
struct Server {
    appliance: Appliance,
}

impl Entity for Server {
    fn appliance(&self) -> &Appliance {
        &self.appliance
    }
}

struct Hop {
    prerequisite: Prerequisite,
}

impl NavigateStep for Hop {
    type View = Anywhere;

    fn prerequisite(&self) -> Prerequisite {
        self.prerequisite.clone()
    }

    fn step(&self, _ctx: &StepContext<'_>) -> ViewResult<()> {
        Ok(())
    }
}

fn destination(i: usize) -> String {
    format!("Step{i}")
}

/// Chain where every destination depends on an earlier one
fn forward_graph(parents: &[usize]) -> NavigatorBuilder {
    let mut builder = Navigator::builder().register::<Server, _>(
        destination(0),
        Hop {
            prerequisite: Prerequisite::None,
        },
    );
    for (i, parent) in parents.iter().enumerate() {
        let index = i + 1;
        builder = builder.register::<Server, _>(
            destination(index),
            Hop {
                prerequisite: Prerequisite::sibling(destination(parent % index)),
            },
        );
    }
    builder
}

proptest! {
    /// Graphs whose prerequisites always point backwards are accepted.
    #[test]
    fn prop_forward_graph_builds(parents in prop::collection::vec(any::<usize>(), 0..12)) {
        let navigator = forward_graph(&parents).build().unwrap();
        prop_assert_eq!(navigator.destinations::<Server>().len(), parents.len() + 1);
    }

    /// A closing edge back into the chain is reported as exactly that cycle.
    #[test]
    fn prop_closing_edge_rejected(len in 1usize..10, target in any::<usize>()) {
        // Step{i} needs Step{i-1}; Step0 needs Step{target}, closing Step0..=Step{target}
        let target = target % len;
        let mut builder = Navigator::builder();
        for i in 0..len {
            let needs = if i == 0 { target } else { i - 1 };
            builder = builder.register::<Server, _>(
                destination(i),
                Hop {
                    prerequisite: Prerequisite::sibling(destination(needs)),
                },
            );
        }
        let err = builder.build().unwrap_err();
        let ViewError::NavigationCycle { path } = err else {
            return Err(TestCaseError::fail(format!("expected a cycle, got {err:?}")));
        };
        prop_assert_eq!(path.first(), path.last());
        prop_assert_eq!(path.len(), target + 2);
        for i in 0..=target {
            let name = format!("Server/{}", destination(i));
            prop_assert!(path.contains(&name), "{} missing from {:?}", name, path);
        }
    }

    /// A prerequisite naming an unregistered destination is rejected.
    #[test]
    fn prop_dangling_prerequisite_rejected(parents in prop::collection::vec(any::<usize>(), 0..8)) {
        let err = forward_graph(&parents)
            .register::<Server, _>(
                "Dangling",
                Hop {
                    prerequisite: Prerequisite::sibling("Missing"),
                },
            )
            .build()
            .unwrap_err();
        prop_assert!(
            matches!(err, ViewError::DestinationNotFound { ref destination, .. } if destination == "Missing"),
            "unexpected {:?}",
            err
        );
    }
}

// === Switchable View Properties ===

#[derive(View)]
struct AlphaForm {
    node: Node,
}

#[derive(View)]
struct BetaForm {
    node: Node,
}

#[derive(View)]
struct GammaForm {
    node: Node,
}

const KINDS: [&str; 3] = ["Alpha", "Beta", "Gamma"];

#[derive(View)]
struct KindForm {
    node: Node,
    #[widget(Select::by_id("kind"))]
    kind: Select,
    #[widget(
        ConditionalSwitchableView::reference("kind", Select::by_id("kind"))
            .register::<AlphaForm>("Alpha")
            .register::<BetaForm>("Beta")
            .register::<GammaForm>("Gamma")
    )]
    details: ConditionalSwitchableView,
}

fn kind_page(mock: &MockDriver) {
    let select = mock.add(None, ".//select[@id='kind']", MockElement::new("select"));
    for kind in KINDS {
        mock.add(
            Some(&select),
            ".//option",
            MockElement::new("option").text(kind).selected(kind == "Alpha"),
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Exactly one registered subview is live for any reference value.
    #[test]
    fn prop_exactly_one_subview_active(kind in 0..KINDS.len()) {
        let mock = Rc::new(MockDriver::new());
        kind_page(&mock);
        let form = KindForm::new(&browser(&mock, "5.10.1"));
        form.fill(&json!({"kind": KINDS[kind]})).unwrap();

        prop_assert_eq!(form.details.live_key().unwrap(), KINDS[kind]);
        let active = [
            form.details.active::<AlphaForm>().is_ok(),
            form.details.active::<BetaForm>().is_ok(),
            form.details.active::<GammaForm>().is_ok(),
        ];
        prop_assert_eq!(active.iter().filter(|a| **a).count(), 1);
        prop_assert!(active[kind]);
    }
}

// === VersionPick Properties ===

fn version_text() -> impl Strategy<Value = String> {
    (1u32..8, 0u32..15, 0u32..5).prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
}

proptest! {
    /// A later version never picks an earlier entry.
    #[test]
    fn prop_pick_is_monotonic(
        keys in prop::collection::btree_set(version_text(), 1..6),
        a in version_text(),
        b in version_text()
    ) {
        let mut sorted: Vec<Version> = keys.iter().map(|k| Version::parse(k)).collect();
        sorted.sort();
        let pick = sorted
            .iter()
            .enumerate()
            .fold(VersionPick::lowest(0), |pick, (i, v)| pick.since(v.clone(), i + 1));

        let (low, high) = {
            let (a, b) = (Version::parse(&a), Version::parse(&b));
            if a <= b { (a, b) } else { (b, a) }
        };
        prop_assert!(pick.pick(&low).unwrap() <= pick.pick(&high).unwrap());
    }

    /// A registered version picks its own entry.
    #[test]
    fn prop_exact_version_picks_its_entry(keys in prop::collection::btree_set(version_text(), 1..6)) {
        let pick: VersionPick<String> = keys.iter().map(|k| (k.as_str(), k.clone())).collect();
        for key in &keys {
            prop_assert_eq!(pick.pick(&Version::parse(key)), Some(key));
        }
    }
}

// === Tree Path Properties ===

fn branch_tree(mock: &Rc<MockDriver>) {
    let page = DynaTreePage::new(mock, "pxe_treebox");
    page.node(None, "Root", "root");
    page.lazy("root", &[("Branch 0", "b0"), ("Branch 1", "b1"), ("Branch 2", "b2")]);
    page.lazy("b0", &[("Leaf 0.0", "l00"), ("Leaf 0.1", "l01")]);
    page.lazy("b1", &[("Leaf 1.0", "l10"), ("Leaf 1.1", "l11")]);
    page.lazy("b2", &[("Leaf 2.0", "l20"), ("Leaf 2.1", "l21")]);
}

#[derive(View)]
struct TreeAccordion {
    node: Node,
    #[widget(Tree::new("pxe_treebox"))]
    tree: Tree,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Clicking a path selects exactly that path.
    #[test]
    fn prop_click_path_selects_path(branch in 0usize..3, leaf in prop::option::of(0usize..2)) {
        let mock = Rc::new(MockDriver::new());
        branch_tree(&mock);
        let view = TreeAccordion::new(&browser(&mock, "5.6.4"));

        let branch_name = format!("Branch {branch}");
        let mut path = vec!["Root".to_string(), branch_name];
        if let Some(leaf) = leaf {
            path.push(format!("Leaf {branch}.{leaf}"));
        }
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();

        view.tree.click_path(&segments).unwrap();
        prop_assert_eq!(view.tree.currently_selected().unwrap(), path);
    }

    /// An unknown last segment reports the whole attempted path.
    #[test]
    fn prop_unknown_leaf_reports_path(branch in 0usize..3, leaf in "[a-z]{3,8}") {
        let mock = Rc::new(MockDriver::new());
        branch_tree(&mock);
        let view = TreeAccordion::new(&browser(&mock, "5.6.4"));

        let branch_name = format!("Branch {branch}");
        let segments = ["Root", branch_name.as_str(), leaf.as_str()];
        let err = view.tree.click_path(&segments).unwrap_err();
        let ViewError::CandidateNotFound { segment, path, .. } = err else {
            return Err(TestCaseError::fail(format!("unexpected {err:?}")));
        };
        prop_assert_eq!(&segment, &leaf);
        prop_assert_eq!(path, segments);
    }
}

// === XPath Quoting Properties ===

/// Evaluate an XPath string literal or `concat(...)` of literals
fn eval_literal(expr: &str) -> Option<String> {
    fn literal(rest: &str) -> Option<(String, &str)> {
        let delimiter = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let body = &rest[1..];
        let end = body.find(delimiter)?;
        Some((body[..end].to_string(), &body[end + 1..]))
    }

    if let Some(mut rest) = expr.strip_prefix("concat(") {
        let mut out = String::new();
        loop {
            let (text, tail) = literal(rest)?;
            out.push_str(&text);
            if tail == ")" {
                return Some(out);
            }
            rest = tail.strip_prefix(", ")?;
        }
    }
    let (text, tail) = literal(expr)?;
    tail.is_empty().then_some(text)
}

proptest! {
    /// Quoted text evaluates back to the original string.
    #[test]
    fn prop_quote_evaluates_to_input(text in "[a-z '\"]{0,20}") {
        prop_assert_eq!(eval_literal(&quote(&text)), Some(text));
    }

    /// Text without single quotes uses a plain single-quoted literal.
    #[test]
    fn prop_quote_plain_text(text in "[a-zA-Z0-9 ]{0,20}") {
        prop_assert_eq!(quote(&text), format!("'{text}'"));
    }
}

#[test]
fn test_quote_mixed_quotes_uses_concat() {
    let quoted = quote(r#"it's "fine""#);
    assert!(quoted.starts_with("concat("));
    assert_eq!(eval_literal(&quoted).as_deref(), Some(r#"it's "fine""#));
    assert_eq!(eval_literal("'a'"), Some("a".to_string()));
    assert_eq!(Value::from(quote("a")), json!("'a'"));
}
