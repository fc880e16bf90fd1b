use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dom_port::memory::{ElementSpec, MemoryDom, NodeId};
use dom_port::EventKind;
use form_fill::{
    DuplicateLabelPolicy, FieldOutcome, FieldResolver, FillOrchestrator, FillRequest,
    FormFillPolicy, ResolveError, SubmitOutcome,
};
use slotpilot_core_types::{FieldName, RunId, SubmitLocator};
use tool_click::{SkipReason, SyntheticEmitter};

struct FieldFixture {
    label: &'static str,
    id: &'static str,
    options: usize,
    delay_ms: u64,
    hidden: bool,
}

impl FieldFixture {
    fn new(label: &'static str, id: &'static str, options: usize, delay_ms: u64) -> Self {
        Self {
            label,
            id,
            options,
            delay_ms,
            hidden: false,
        }
    }

    fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

struct Page {
    dom: Arc<MemoryDom>,
    triggers: HashMap<&'static str, NodeId>,
    submit: NodeId,
}

/// Kendo-style form: each trigger populates its `_listbox` after a delay.
fn booking_form(fields: Vec<FieldFixture>) -> Page {
    let dom = MemoryDom::new();
    let mut triggers = HashMap::new();
    let mut lists: HashMap<String, (usize, u64)> = HashMap::new();
    let submit = dom.mutate(|tree| {
        let body = tree.body();
        let form = tree.append(body, ElementSpec::new("form"));
        for field in &fields {
            let mut group = ElementSpec::new("div").class("mb-3");
            if field.hidden {
                group = group.hidden();
            }
            let group = tree.append(form, group);
            tree.append(
                group,
                ElementSpec::new("label").attr("for", field.id).text(field.label),
            );
            let wrap = tree.append(group, ElementSpec::new("span").class("k-dropdown"));
            let listbox = format!("{}_listbox", field.id);
            let trigger = tree.append(
                wrap,
                ElementSpec::new("span")
                    .class("k-select")
                    .attr("aria-controls", &listbox),
            );
            tree.append(body, ElementSpec::new("ul").id(&listbox));
            triggers.insert(field.id, trigger);
            lists.insert(listbox, (field.options, field.delay_ms));
        }
        tree.append(form, ElementSpec::new("button").id("btnSubmit").text("Submit"))
    });

    let weak: Weak<MemoryDom> = Arc::downgrade(&dom);
    dom.on_event("span.k-select", EventKind::Click, move |tree, trigger| {
        let Some(listbox) = tree.attr(trigger, "aria-controls").map(str::to_string) else {
            return;
        };
        let Some((options, delay_ms)) = lists.get(&listbox).copied() else {
            return;
        };
        let weak = weak.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if let Some(dom) = weak.upgrade() {
                dom.mutate(|tree| {
                    let Some(list) = tree.first(&format!("#{listbox}")) else {
                        return;
                    };
                    if !tree.children(list).is_empty() {
                        return;
                    }
                    for i in 0..options {
                        tree.append(
                            list,
                            ElementSpec::new("li").class("k-item").text(&format!("Option {i}")),
                        );
                    }
                });
            }
        });
    });
    dom.on_event(".k-item", EventKind::Click, |tree, item| {
        tree.set_attr(item, "aria-selected", "true");
    });

    Page {
        dom,
        triggers,
        submit,
    }
}

fn test_policy() -> FormFillPolicy {
    FormFillPolicy {
        submit: SubmitLocator::Id("btnSubmit".into()),
        ..FormFillPolicy::default()
    }
}

fn standard_fields() -> Vec<FieldFixture> {
    vec![
        FieldFixture::new("Category*", "Category", 3, 30),
        FieldFixture::new("Location*", "Location", 4, 120),
        FieldFixture::new("Visa Type*", "VisaType", 3, 60),
        FieldFixture::new("Visa Sub Type*", "VisaSubType", 2, 10),
        FieldFixture::new("Mission*", "Mission", 2, 90),
    ]
}

#[tokio::test]
async fn resolver_maps_only_visible_recognised_groups() {
    let page = booking_form(vec![
        FieldFixture::new("Category*", "Category", 1, 0).hidden(),
        FieldFixture::new("Visa Type*", "VisaType", 1, 0),
        FieldFixture::new("Location*", "Location", 1, 0).hidden(),
        FieldFixture::new("Mission*", "Mission", 1, 0),
    ]);
    let policy = test_policy();
    let map = FieldResolver::new(&*page.dom, &policy).resolve().await.unwrap();

    let keys: Vec<_> = map.keys().map(FieldName::key).collect();
    assert_eq!(keys, vec!["visaType", "mission"]);
    let visa = &map[&FieldName::VisaType];
    assert_eq!(visa.option_list_selector, "#VisaType_listbox");
    assert_eq!(visa.control, MemoryDom::handle(page.triggers["VisaType"]));
    assert_eq!(visa.label, "Visa Type*");
}

#[tokio::test]
async fn resolver_skips_incomplete_groups() {
    let page = booking_form(vec![
        FieldFixture::new("Category*", "Category", 1, 0),
        FieldFixture::new("Location*", "Location", 1, 0),
        FieldFixture::new("Visa Type*", "VisaType", 1, 0),
        FieldFixture::new("Applicants", "Applicants", 1, 0),
        FieldFixture::new("   ", "Blank", 1, 0),
    ]);
    page.dom.mutate(|tree| {
        // Category loses its trigger, Location its label `for`.
        let category = page.triggers["Category"];
        tree.remove(category);
        let label = tree.first(r#"label[for="Location"]"#).unwrap();
        tree.remove_attr(label, "for");
        // Visa Type loses its label entirely.
        let label = tree.first(r#"label[for="VisaType"]"#).unwrap();
        tree.remove(label);
    });
    let policy = test_policy();
    let map = FieldResolver::new(&*page.dom, &policy).resolve().await.unwrap();
    assert!(map.is_empty(), "unexpected fields: {:?}", map.keys());
}

#[tokio::test]
async fn duplicate_labels_follow_policy() {
    let page = booking_form(vec![
        FieldFixture::new("Mission*", "MissionA", 1, 0),
        FieldFixture::new("Mission (select)", "MissionB", 1, 0),
    ]);
    let mut policy = test_policy();
    let map = FieldResolver::new(&*page.dom, &policy).resolve().await.unwrap();
    assert_eq!(map.len(), 1);
    assert_eq!(
        map[&FieldName::Mission].control,
        MemoryDom::handle(page.triggers["MissionB"])
    );

    policy.duplicate_labels = DuplicateLabelPolicy::Reject;
    let err = FieldResolver::new(&*page.dom, &policy)
        .resolve()
        .await
        .unwrap_err();
    assert_eq!(err, ResolveError::DuplicateLabel(FieldName::Mission));
}

#[tokio::test(start_paused = true)]
async fn fields_fill_concurrently_and_submit_waits_for_all() {
    let page = booking_form(standard_fields());
    let policy = test_policy();
    let emitter = SyntheticEmitter::default();
    let request = FillRequest::new(true)
        .with(FieldName::Category, 0)
        .with(FieldName::Location, 3)
        .with(FieldName::VisaType, 1)
        .with(FieldName::VisaSubType, 1)
        .with(FieldName::Mission, 0);

    let report = FillOrchestrator::new(&*page.dom, &emitter, &policy)
        .run(RunId::new(), &request)
        .await
        .unwrap();

    assert!(report.form_ready);
    assert_eq!(report.selected(), 5);
    assert_eq!(report.submit, SubmitOutcome::Clicked);

    let clicks: Vec<_> = page
        .dom
        .dispatch_log()
        .into_iter()
        .filter(|record| record.kind == EventKind::Click)
        .map(|record| record.target)
        .collect();
    let trigger_handles: Vec<_> = page
        .triggers
        .values()
        .map(|node| MemoryDom::handle(*node))
        .collect();
    // Every dropdown opens before any option is picked.
    assert!(clicks[..5].iter().all(|c| trigger_handles.contains(c)));
    assert_eq!(clicks.len(), 11);
    assert_eq!(clicks.last(), Some(&MemoryDom::handle(page.submit)));

    let selected = page
        .dom
        .read(|tree| tree.select(r#"li.k-item[aria-selected="true"]"#).unwrap().len());
    assert_eq!(selected, 5);
}

#[tokio::test(start_paused = true)]
async fn out_of_range_index_exhausts_only_its_field() {
    let page = booking_form(standard_fields());
    let policy = test_policy();
    let emitter = SyntheticEmitter::default();
    let request = FillRequest::new(true)
        .with(FieldName::Category, 7)
        .with(FieldName::Mission, 1);

    let report = FillOrchestrator::new(&*page.dom, &emitter, &policy)
        .run(RunId::new(), &request)
        .await
        .unwrap();

    assert_eq!(
        report.fields[&FieldName::Category],
        FieldOutcome::Exhausted {
            index: 7,
            evaluations: 201
        }
    );
    assert!(matches!(
        report.fields[&FieldName::Mission],
        FieldOutcome::Selected { index: 1, .. }
    ));
    assert_eq!(report.fields.len(), 2);
    assert_eq!(report.submit, SubmitOutcome::Clicked);
    assert_eq!(page.dom.events_on(page.submit, EventKind::Click), 1);
}

#[tokio::test(start_paused = true)]
async fn prerendered_hidden_list_waits_until_shown() {
    let page = booking_form(vec![FieldFixture::new("Mission*", "Mission", 3, 0)]);
    let items = page.dom.mutate(|tree| {
        let list = tree.first("#Mission_listbox").unwrap();
        tree.set_hidden(list, true);
        (0..3)
            .map(|i| {
                tree.append(
                    list,
                    ElementSpec::new("li").class("k-item").text(&format!("Option {i}")),
                )
            })
            .collect::<Vec<_>>()
    });
    let weak = Arc::downgrade(&page.dom);
    page.dom
        .on_event("span.k-select", EventKind::Click, move |_, _| {
            let weak = weak.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                if let Some(dom) = weak.upgrade() {
                    dom.mutate(|tree| {
                        if let Some(list) = tree.first("#Mission_listbox") {
                            tree.set_hidden(list, false);
                        }
                    });
                }
            });
        });

    let policy = test_policy();
    let emitter = SyntheticEmitter::default();
    let request = FillRequest::new(false).with(FieldName::Mission, 1);
    let report = FillOrchestrator::new(&*page.dom, &emitter, &policy)
        .run(RunId::new(), &request)
        .await
        .unwrap();

    match &report.fields[&FieldName::Mission] {
        FieldOutcome::Selected { index, evaluations } => {
            assert_eq!(*index, 1);
            assert!(*evaluations > 1, "selected on evaluation {evaluations}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(page.dom.events_on(items[1], EventKind::Click), 1);
    assert_eq!(page.dom.events_on(items[0], EventKind::Click), 0);
}

#[tokio::test(start_paused = true)]
async fn unclickable_trigger_does_not_block_siblings() {
    let page = booking_form(standard_fields());
    page.dom
        .mutate(|tree| tree.set_hidden(page.triggers["Location"], true));
    let policy = test_policy();
    let emitter = SyntheticEmitter::default();
    let request = FillRequest::new(false)
        .with(FieldName::Location, 0)
        .with(FieldName::VisaType, 0);

    let report = FillOrchestrator::new(&*page.dom, &emitter, &policy)
        .run(RunId::new(), &request)
        .await
        .unwrap();
    assert_eq!(
        report.fields[&FieldName::Location],
        FieldOutcome::ControlUnavailable(SkipReason::NotLaidOut)
    );
    assert!(matches!(
        report.fields[&FieldName::VisaType],
        FieldOutcome::Selected { .. }
    ));
    assert_eq!(report.submit, SubmitOutcome::NotRequested);
    assert_eq!(page.dom.events_on(page.submit, EventKind::Click), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_form_halts_without_submitting() {
    let dom = MemoryDom::new();
    let button = dom.mutate(|tree| {
        let body = tree.body();
        tree.append(body, ElementSpec::new("button").id("btnSubmit"))
    });
    let policy = test_policy();
    let emitter = SyntheticEmitter::default();
    let report = FillOrchestrator::new(&*dom, &emitter, &policy)
        .run(RunId::new(), &FillRequest::new(true).with(FieldName::Mission, 0))
        .await
        .unwrap();
    assert!(!report.form_ready);
    assert_eq!(report.submit, SubmitOutcome::Halted);
    assert_eq!(dom.events_on(button, EventKind::Click), 0);
}

#[tokio::test(start_paused = true)]
async fn xpath_submit_locator_is_followed() {
    let page = booking_form(vec![FieldFixture::new("Mission*", "Mission", 1, 0)]);
    let policy = FormFillPolicy {
        submit: SubmitLocator::XPath("/html/body/form/button".into()),
        ..FormFillPolicy::default()
    };
    let emitter = SyntheticEmitter::default();
    let report = FillOrchestrator::new(&*page.dom, &emitter, &policy)
        .run(RunId::new(), &FillRequest::new(true).with(FieldName::Mission, 0))
        .await
        .unwrap();
    assert_eq!(report.submit, SubmitOutcome::Clicked);

    let missing = FormFillPolicy {
        submit: SubmitLocator::XPath("/html/body/main/button".into()),
        ..FormFillPolicy::default()
    };
    let report = FillOrchestrator::new(&*page.dom, &emitter, &missing)
        .run(RunId::new(), &FillRequest::new(true))
        .await
        .unwrap();
    assert_eq!(report.submit, SubmitOutcome::NotFound);
}
