//! Transition resolution: picking the outgoing edge to follow from a node.

use tracing::warn;

use crate::{
    common::Slots,
    eval::{condition, evaluate_condition, template},
    model::{Edge, EvaluationType, HANDLE_DEFAULT, Node, NodeKind},
};

/// Pick the edge to follow out of `node`.
///
/// Resolution order, first match wins:
/// 1. llm keyword branch — the first keyword found in the lower-cased output
///    slot supplies the handle.
/// 2. branch/CONDITION — conditions evaluated in authored order; the reply at
///    the matching index supplies the handle, with the `"default"`-handled
///    edge as fallback.
/// 3. a single outgoing edge is taken unconditionally, even when an explicit
///    handle was supplied.
/// 4. explicit `source_handle` match, falling back to the first edge when
///    nothing matches (logged — this usually means an authoring error).
/// 5. the first outgoing edge in authoring order.
///
/// Returns `None` only when the node has no outgoing edges, which signals
/// normal scenario completion.
pub fn resolve<'a>(
    node: &Node,
    edges: &'a [Edge],
    source_handle: Option<&str>,
    slots: &Slots,
) -> Option<&'a Edge> {
    if edges.is_empty() {
        return None;
    }

    if let NodeKind::Llm(payload) = &node.kind
        && !payload.conditions.is_empty()
    {
        let output = payload.output_var.as_deref().map(|var| condition::string_form(slots.get(var)).to_lowercase()).unwrap_or_default();
        if let Some(matched) = payload.conditions.iter().find(|c| !c.keyword.is_empty() && output.contains(&c.keyword.to_lowercase()))
            && let Some(edge) = edges.iter().find(|e| e.has_handle(&matched.id))
        {
            return Some(edge);
        }
    }

    if let NodeKind::Branch(payload) = &node.kind
        && payload.evaluation_type == EvaluationType::Condition
    {
        let matched = payload.conditions.iter().position(|c| {
            let resolved_value = template::interpolate(&c.value, slots);
            evaluate_condition(slots.get(&c.slot), &c.operator, &resolved_value)
        });

        if let Some(index) = matched
            && let Some(reply) = payload.replies.get(index)
            && let Some(edge) = edges.iter().find(|e| e.has_handle(&reply.value))
        {
            return Some(edge);
        }
        if let Some(edge) = edges.iter().find(|e| e.has_handle(HANDLE_DEFAULT)) {
            return Some(edge);
        }
    }

    if edges.len() == 1 {
        return edges.first();
    }

    if let Some(handle) = source_handle {
        match edges.iter().find(|e| e.has_handle(handle)) {
            Some(edge) => return Some(edge),
            None => {
                warn!(node_id = %node.id, handle = %handle, "no edge matches the supplied source handle, falling back to the first outgoing edge");
                return edges.first();
            }
        }
    }

    edges.first()
}
