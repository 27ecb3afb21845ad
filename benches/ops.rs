// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use diasync::apply_ops;
use diasync::model::{Diagram, DiagramId, IdAllocator};
use diasync::ops::{ErOp, FlowOp, Op, SeqOp};

mod fixtures;

use fixtures::Case;

fn diagram(text: &str) -> Diagram {
    let diagram_id = DiagramId::new("d:bench").expect("diagram id");
    Diagram::from_text(diagram_id, "bench", text).expect("diagram kind")
}

fn bench_op(c: &mut Criterion, group_name: &str, text: fn(Case) -> String, op: impl Fn(Case) -> Op) {
    let mut group = c.benchmark_group(group_name);
    for case in Case::ALL {
        let base = diagram(&text(case));
        let ops = [op(case)];
        group.bench_function(case.id(), |b| {
            b.iter_batched(
                || (base.clone(), IdAllocator::new()),
                |(mut diagram, mut ids)| {
                    let result = apply_ops(&mut diagram, 0, black_box(&ops), &mut ids).expect("apply");
                    black_box(result.new_rev)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// Group names and case ids stay stable so results remain comparable across runs.
fn benches_ops(c: &mut Criterion) {
    bench_op(c, "ops.flow_delete_node_cascade", fixtures::flowchart, |case| {
        Op::Flow(FlowOp::DeleteNode { id: format!("n{}", case.size() / 2) })
    });
    bench_op(c, "ops.flow_add_edge", fixtures::flowchart, |case| {
        Op::Flow(FlowOp::AddEdge { from: "n0".to_owned(), to: format!("n{}", case.size() - 1), text: None })
    });
    bench_op(c, "ops.er_rename_entity", fixtures::er, |case| {
        Op::Er(ErOp::RenameEntity { name: format!("E{}", case.size() / 2), new_name: "RENAMED".to_owned() })
    });
    bench_op(c, "ops.seq_delete_participant", fixtures::sequence, |_| {
        Op::Seq(SeqOp::DeleteParticipant { alias: "p3".to_owned() })
    });
}

criterion_group!(benches, benches_ops);
criterion_main!(benches);
