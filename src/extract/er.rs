// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Diasync-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Diasync and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use std::collections::BTreeSet;

use roxmltree::{Document, Node};

use super::{has_class, identified_elements, SvgAnnotator};
use crate::format::mermaid::er::{parse_er_source, EntityRecord, ErView};
use crate::model::{
    AttributeObject, DiagramObjects, DiagramSource, EntityObject, OtherObject, RelationshipObject,
};

fn is_entity_group(node: Node<'_, '_>) -> bool {
    node.tag_name().name() == "g" && node.attribute("id").is_some_and(|id| id.starts_with("entity-"))
}

/// Entity for a rendered `entity-<NAME>-<suffix>` id; the longest matching name wins.
fn entity_for_id<'v>(rendered_id: &str, view: &'v ErView) -> Option<&'v EntityRecord> {
    let rest = rendered_id.strip_prefix("entity-")?;
    view.entities
        .iter()
        .filter(|entity| {
            rest == entity.name
                || rest.strip_prefix(entity.name.as_str()).is_some_and(|tail| tail.starts_with('-'))
        })
        .max_by_key(|entity| entity.name.len())
}

fn entity_object(entity: &EntityRecord) -> EntityObject {
    EntityObject {
        id: format!("entity-{}", entity.name),
        name: entity.name.to_string(),
        label: entity.label().to_owned(),
        attributes: entity
            .attributes
            .iter()
            .map(|(_, attr)| AttributeObject {
                attr_type: attr.attr_type.clone(),
                name: attr.name.clone(),
                keys: attr.keys.to_vec(),
                comment: attr.comment.clone(),
            })
            .collect(),
        line_index: entity.span.map(|span| span.start),
    }
}

pub(super) fn extract_er(
    doc: &Document<'_>,
    source: &DiagramSource,
    annotator: &mut SvgAnnotator,
) -> DiagramObjects {
    let view = parse_er_source(source);
    let mut objects = DiagramObjects::default();
    let mut claimed = BTreeSet::new();

    let groups = doc.descendants().filter(|n| n.is_element() && is_entity_group(*n));
    for (position, group) in groups.enumerate() {
        let id = group.attribute("id").unwrap_or_default();
        // Render order is assumed to follow source order when the name cannot be read back.
        let Some(entity) = entity_for_id(id, &view).or_else(|| view.entities.get(position)) else {
            continue;
        };
        if objects.entities.iter().any(|existing| existing.name == entity.name) {
            continue;
        }
        let object = entity_object(entity);
        annotator.tag(group, &object.id);
        claimed.insert(group.range().start);
        objects.entities.push(object);
    }

    let lines = doc.descendants().filter(|n| n.is_element() && has_class(*n, "relationshipLine"));
    for (line, record) in lines.zip(view.relationships.iter()) {
        let rel = &record.relationship;
        let id = format!("rel-{}", record.index);
        annotator.tag(line, &id);
        claimed.insert(line.range().start);
        objects.relationships.push(RelationshipObject {
            id,
            index: record.index,
            entity1: rel.entity1.to_string(),
            cardinality1: rel.cardinality1,
            identification: rel.identification,
            cardinality2: rel.cardinality2,
            entity2: rel.entity2.to_string(),
            label: rel.label.clone(),
            line_index: record.line_index,
        });
    }

    for (node, id) in identified_elements(doc) {
        if !claimed.contains(&node.range().start) {
            objects.others.push(OtherObject {
                id: id.to_owned(),
                class: node.attribute("class").map(str::to_owned),
            });
        }
    }
    objects
}

#[cfg(test)]
mod tests {
    use crate::extract::extract;
    use crate::format::mermaid::er::Cardinality;
    use crate::model::{DiagramKind, DiagramSource};

    #[test]
    fn pairs_entities_by_name_and_relationships_by_position() {
        let source = DiagramSource::from_text(
            "erDiagram\n    CUSTOMER {\n        string id PK\n    }\n    CUSTOMER ||--o{ ORDER : places\n    ORDER ||--|{ LINE-ITEM : contains\n",
        );
        let svg = r#"<svg id="d"><g class="root">
  <path class="edge-thickness-normal relationshipLine" id="id_a"/>
  <path class="relationshipLine" d="M0"/>
  <g id="entity-CUSTOMER-0" class="node"><text>CUSTOMER</text></g>
  <g id="entity-ORDER-1" class="node"><text>ORDER</text></g>
  <g id="entity-LINE-ITEM-2" class="node"><text>LINE-ITEM</text></g>
</g></svg>"#;
        let extraction = extract(DiagramKind::Er, svg, &source).expect("extract");
        let objects = &extraction.objects;

        let names = objects.entities.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["CUSTOMER", "ORDER", "LINE-ITEM"]);
        assert_eq!(objects.entities[0].attributes.len(), 1);
        assert_eq!(objects.entities[0].line_index, Some(1));
        assert_eq!(objects.relationships.len(), 2);
        assert_eq!(objects.relationships[1].entity2, "LINE-ITEM");
        assert_eq!(objects.relationships[1].cardinality2, Cardinality::OneOrMore);

        assert!(extraction.svg.contains(r#"<g data-id="entity-LINE-ITEM" id="entity-LINE-ITEM-2""#));
        assert!(extraction.svg.contains(r#"<path data-id="rel-1" class="relationshipLine""#));
        assert!(objects.others.iter().any(|o| o.id == "d"));
        assert!(!objects.others.iter().any(|o| o.id == "id_a"));
    }
}
