// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Deterministic synthetic sources shared by the benches.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy)]
pub enum Case {
    Small,
    Medium,
    Large,
}

impl Case {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    pub fn id(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }

    pub fn size(self) -> usize {
        match self {
            Self::Small => 12,
            Self::Medium => 120,
            Self::Large => 600,
        }
    }
}

/// A chain of `size` nodes, grouped into subgraphs of ten, with a few styles.
pub fn flowchart(case: Case) -> String {
    let size = case.size();
    let mut out = String::from("flowchart TD\n");
    for group in 0..size.div_ceil(10) {
        let _ = writeln!(out, "    subgraph g{group} [Group {group}]");
        for n in group * 10..((group + 1) * 10).min(size) {
            let _ = writeln!(out, "        n{n}[\"Step {n}\"]");
        }
        out.push_str("    end\n");
    }
    for n in 1..size {
        let _ = writeln!(out, "    n{} --> n{n}", n - 1);
    }
    for n in (0..size).step_by(7) {
        let _ = writeln!(out, "    style n{n} fill:#eef");
    }
    out
}

pub fn er(case: Case) -> String {
    let size = case.size();
    let mut out = String::from("erDiagram\n");
    for n in 0..size {
        let _ = writeln!(out, "    E{n} {{\n        string id PK\n        string name\n    }}");
    }
    for n in 1..size {
        let _ = writeln!(out, "    E{} ||--o{{ E{n} : owns", n - 1);
    }
    out
}

pub fn sequence(case: Case) -> String {
    let size = case.size();
    let mut out = String::from("sequenceDiagram\n    participant p0 as Client\n");
    for n in 1..8 {
        let _ = writeln!(out, "    participant p{n} as Service {n}");
    }
    for n in 0..size {
        if n % 10 == 0 {
            let _ = writeln!(out, "    loop batch {n}");
        }
        let _ = writeln!(out, "    p{}->>p{}: call {n}", n % 8, (n + 1) % 8);
        if n % 10 == 9 || n + 1 == size {
            out.push_str("    end\n");
        }
    }
    out
}
