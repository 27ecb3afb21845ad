// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Whole editing cycles: gesture, mutation, debounced render, extraction and re-selection,
//! against a fake renderer that emits Mermaid-shaped SVG.

use std::collections::BTreeMap;

use diasync::config::{EditorConfig, ThemeConfig};
use diasync::format::mermaid::flowchart::NodeShape;
use diasync::format::mermaid::{parse_er_source, parse_flowchart_source};
use diasync::model::{DiagramKind, DiagramSource, ObjectKind};
use diasync::ops::{ErOp, FlowOp, Op};
use diasync::reconcile::Selection;
use diasync::render::{RenderError, RenderScheduler, RenderService, RenderedSvg};
use diasync::session::{EditorSession, SavedDiagram};

struct FakeMermaid;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn flowchart_svg(render_id: &str, source: &DiagramSource) -> String {
    let view = parse_flowchart_source(source);
    let mut svg = format!(r#"<svg id="{render_id}" xmlns="http://www.w3.org/2000/svg"><g class="root">"#);
    for subgraph in &view.subgraphs {
        svg.push_str(&format!(
            r#"<g class="cluster default" id="{}"><text>{}</text></g>"#,
            subgraph.id,
            escape(subgraph.label())
        ));
    }
    // Per-pair counters number parallel edges 0, 2, 3, ...
    let mut pair_counts = BTreeMap::<(String, String), usize>::new();
    for record in &view.links {
        let key = (record.link.source.id.to_string(), record.link.target.id.to_string());
        let existing = pair_counts.entry(key.clone()).or_default();
        let ordinal = if *existing == 0 { 0 } else { *existing + 1 };
        svg.push_str(&format!(
            r#"<path class="flowchart-link" id="L_{}_{}_{ordinal}"/>"#,
            key.0, key.1
        ));
        *existing += 1;
    }
    for (position, node) in view.nodes.iter().enumerate() {
        svg.push_str(&format!(
            r#"<g class="node default" id="flowchart-{}-{position}"><text>{}</text></g>"#,
            node.id,
            escape(node.label())
        ));
    }
    svg.push_str("</g></svg>");
    svg
}

fn er_svg(render_id: &str, source: &DiagramSource) -> String {
    let view = parse_er_source(source);
    let mut svg = format!(r#"<svg id="{render_id}"><g class="root">"#);
    for _ in &view.relationships {
        svg.push_str(r#"<path class="er relationshipLine"/>"#);
    }
    for (position, entity) in view.entities.iter().enumerate() {
        svg.push_str(&format!(
            r#"<g id="entity-{}-{position}" class="node"><text>{}</text></g>"#,
            entity.name,
            escape(entity.label())
        ));
    }
    svg.push_str("</g></svg>");
    svg
}

impl RenderService for FakeMermaid {
    async fn render(
        &self,
        render_id: &str,
        source_text: &str,
        _theme: &ThemeConfig,
    ) -> Result<RenderedSvg, RenderError> {
        let source = DiagramSource::from_text(source_text);
        if let Some(line_no) = source.lines().iter().position(|line| line.trim_end().ends_with("-->")) {
            return Err(RenderError::new(format!("Parse error on line {}", line_no + 1)));
        }
        match DiagramKind::sniff(&source) {
            Some(DiagramKind::Flowchart) => Ok(RenderedSvg::new(flowchart_svg(render_id, &source))),
            Some(DiagramKind::Er) => Ok(RenderedSvg::new(er_svg(render_id, &source))),
            _ => Err(RenderError::new("No diagram type detected")),
        }
    }
}

fn session(code: &str) -> EditorSession {
    let record = SavedDiagram {
        id: "d:cycle".to_owned(),
        title: "Cycle".to_owned(),
        code: code.to_owned(),
        created_at: 0,
    };
    EditorSession::from_record(&record).expect("session")
}

async fn render_cycle(session: &mut EditorSession, scheduler: &RenderScheduler) {
    let outcome = scheduler.schedule(&FakeMermaid, session.source_text(), &ThemeConfig::default()).await;
    session.handle_outcome(outcome).expect("extraction");
}

fn scheduler() -> RenderScheduler {
    RenderScheduler::from_config(&EditorConfig::default())
}

#[tokio::test(start_paused = true)]
async fn insert_and_link_selects_the_new_edge() {
    let mut session = session("flowchart TD\nA[Start]");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    assert_eq!(session.objects().nodes.len(), 1);

    let rev = session.diagram().rev();
    session
        .apply(
            rev,
            &[
                Op::Flow(FlowOp::AddNode {
                    id: Some("B".to_owned()),
                    shape: NodeShape::Rect,
                    label: "End".to_owned(),
                }),
                Op::Flow(FlowOp::AddEdge { from: "A".to_owned(), to: "B".to_owned(), text: None }),
            ],
        )
        .expect("apply");
    render_cycle(&mut session, &scheduler).await;

    let objects = session.objects();
    let core_ids = objects.nodes.iter().map(|node| node.core_id.as_str()).collect::<Vec<_>>();
    assert_eq!(core_ids, ["A", "B"]);
    assert_eq!(objects.edges.len(), 1);
    assert_eq!(objects.edges[0].source_core_id, "A");
    assert_eq!(objects.edges[0].target_core_id, "B");
    assert_eq!(objects.edges[0].target_label, "End");
    assert_eq!(session.selection(), Some(&Selection::new("L_A_B_0", ObjectKind::Edge)));
}

#[tokio::test(start_paused = true)]
async fn swapping_an_edge_reselects_it_under_its_new_id() {
    let mut session = session("flowchart TD\n    A[\"Start\"] --> B\n    B --> C");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    session.select(Some(Selection::new("L_A_B_0", ObjectKind::Edge)));

    session.apply(session.diagram().rev(), &[Op::Flow(FlowOp::SwapEdge { index: 0 })]).expect("swap");
    render_cycle(&mut session, &scheduler).await;

    let selection = session.selection().expect("selection");
    assert_eq!(selection, &Selection::new("L_B_A_0", ObjectKind::Edge));
    let edge = session.objects().edges.iter().find(|edge| edge.id == selection.id).expect("edge");
    assert_eq!((edge.source_core_id.as_str(), edge.target_core_id.as_str()), ("B", "A"));
    assert_eq!(edge.link_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn parallel_edges_resolve_to_their_own_links() {
    let mut session = session("flowchart TD\n    A --> B\n    A -.-> B\n    A ==> B");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;

    let edges = session
        .objects()
        .edges
        .iter()
        .map(|edge| (edge.id.as_str(), edge.link_index))
        .collect::<Vec<_>>();
    assert_eq!(edges, [("L_A_B_0", Some(0)), ("L_A_B_2", Some(1)), ("L_A_B_3", Some(2))]);

    session.select(Some(Selection::new("L_A_B_2", ObjectKind::Edge)));
    session.apply(session.diagram().rev(), &[Op::Flow(FlowOp::SwapEdge { index: 1 })]).expect("swap");
    render_cycle(&mut session, &scheduler).await;

    assert_eq!(session.source_text(), "flowchart TD\n    A --> B\n    B -.-> A\n    A ==> B");
    let selection = session.selection().expect("selection");
    assert_eq!(selection, &Selection::new("L_B_A_0", ObjectKind::Edge));
    let edge = session.objects().edges.iter().find(|edge| edge.id == selection.id).expect("edge");
    assert_eq!(edge.link_index, Some(1));
    let thick = session.objects().edges.iter().find(|edge| edge.id == "L_A_B_2").expect("edge");
    assert_eq!(thick.link_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn cascading_delete_removes_exactly_the_incident_edges() {
    let mut session = session("flowchart TD\n    A --> B(\"Hub\")\n    B --> C[\"Sink\"]\n    C --> D\n    B --> D");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    assert_eq!(session.objects().edges.len(), 4);

    session
        .apply(session.diagram().rev(), &[Op::Flow(FlowOp::DeleteNode { id: "B".to_owned() })])
        .expect("delete");
    render_cycle(&mut session, &scheduler).await;

    let objects = session.objects();
    assert_eq!(objects.edges.len(), 1);
    assert_eq!(objects.edges[0].id, "L_C_D_0");
    assert!(objects.node_by_core_id("B").is_none());
    // "Sink" only lived on a removed link line and was rebuilt.
    assert_eq!(objects.node_by_core_id("C").map(|node| node.label.as_str()), Some("Sink"));
    assert!(session.selection().is_none());
}

#[tokio::test(start_paused = true)]
async fn renamed_entity_stays_selected() {
    let mut session = session("erDiagram\nCUSTOMER{string name}\nCUSTOMER ||--o{ ORDER : places");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    session.select(Some(Selection::new("entity-CUSTOMER", ObjectKind::Entity)));

    session
        .apply(
            session.diagram().rev(),
            &[Op::Er(ErOp::RenameEntity {
                name: "CUSTOMER".to_owned(),
                new_name: "CLIENT".to_owned(),
            })],
        )
        .expect("rename");
    render_cycle(&mut session, &scheduler).await;

    assert_eq!(session.source_text(), "erDiagram\nCLIENT{string name}\nCLIENT ||--o{ ORDER : places");
    assert_eq!(session.selection(), Some(&Selection::new("entity-CLIENT", ObjectKind::Entity)));
    let client = session.objects().entities.iter().find(|e| e.name == "CLIENT").expect("entity");
    assert_eq!(client.attributes.len(), 1);
    assert_eq!(session.objects().relationships[0].entity1, "CLIENT");
    assert!(session.svg().is_some_and(|svg| svg.contains(r#"data-id="entity-CLIENT""#)));
}

#[tokio::test(start_paused = true)]
async fn selection_survives_unrelated_edits() {
    let mut session = session("flowchart TD\n    A --> B");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    session.select(Some(Selection::new("flowchart-A-0", ObjectKind::Node)));

    session
        .apply(
            session.diagram().rev(),
            &[Op::Flow(FlowOp::SetNodeStyle {
                id: "B".to_owned(),
                key: "fill".to_owned(),
                value: Some("#f00".to_owned()),
            })],
        )
        .expect("style");
    render_cycle(&mut session, &scheduler).await;

    assert_eq!(session.selection(), Some(&Selection::new("flowchart-A-0", ObjectKind::Node)));
    let b = session.objects().node_by_core_id("B").expect("node");
    assert_eq!(b.style.get("fill").map(String::as_str), Some("#f00"));
}

#[tokio::test(start_paused = true)]
async fn failed_render_keeps_the_stale_model() {
    let mut session = session("flowchart TD\n    A --> B");
    let scheduler = scheduler();
    render_cycle(&mut session, &scheduler).await;
    let before = session.objects().clone();

    session.replace_text("flowchart TD\n    A --> B\n    B -->");
    render_cycle(&mut session, &scheduler).await;

    assert_eq!(session.notice(), Some("Parse error on line 3"));
    assert_eq!(session.objects(), &before);
    assert_eq!(session.source_text(), "flowchart TD\n    A --> B\n    B -->");

    session.replace_text("flowchart TD\n    A --> B\n    B --> C");
    render_cycle(&mut session, &scheduler).await;
    assert!(session.notice().is_none());
    assert_eq!(session.objects().edges.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn typing_burst_renders_only_the_final_text() {
    let mut session = session("flowchart TD\n    A");
    let scheduler = scheduler();
    let theme = ThemeConfig::default();

    let first_text = "flowchart TD\n    A --> B".to_owned();
    let final_text = "flowchart TD\n    A --> B\n    B --> C".to_owned();
    let (first, last) = tokio::join!(scheduler.schedule(&FakeMermaid, first_text, &theme), async {
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        scheduler.schedule(&FakeMermaid, final_text.clone(), &theme).await
    });

    session.replace_text(&final_text);
    session.handle_outcome(first).expect("superseded is ignored");
    assert!(session.objects().is_empty());
    session.handle_outcome(last).expect("extraction");
    assert_eq!(session.objects().edges.len(), 2);
}
