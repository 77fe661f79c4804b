use std::collections::HashSet;

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;

use super::model::Flow;

/// A button whose target is not a step of the flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    pub step_id: String,
    pub step_order: u32,
    pub button_text: String,
    pub missing_step_id: String,
}

/// Every link whose `NextStepId` does not resolve, in step then button order.
pub fn broken_links(flow: &Flow) -> Vec<BrokenLink> {
    let ids: HashSet<&str> = flow.steps.iter().map(|s| s.id.as_str()).collect();
    flow.steps
        .iter()
        .flat_map(|step| {
            step.button_links.iter().filter_map(|link| {
                let target = link.next_step_id.as_deref()?;
                (!ids.contains(target)).then(|| BrokenLink {
                    step_id: step.id.clone(),
                    step_order: step.step_order,
                    button_text: link.button_text.clone(),
                    missing_step_id: target.to_string(),
                })
            })
        })
        .collect()
}

/// Step graph over resolvable links only.
pub fn link_graph(flow: &Flow) -> DiGraphMap<&str, ()> {
    let mut graph = DiGraphMap::new();
    for step in &flow.steps {
        graph.add_node(step.id.as_str());
    }
    for step in &flow.steps {
        for link in &step.button_links {
            if let Some(target) = link.next_step_id.as_deref() {
                if graph.contains_node(target) {
                    graph.add_edge(step.id.as_str(), target, ());
                }
            }
        }
    }
    graph
}

/// Groups of steps that can reach each other through links, each listed in
/// flow order. A step linking to itself is a group of one.
pub fn cycles(flow: &Flow) -> Vec<Vec<String>> {
    let graph = link_graph(flow);
    let mut groups: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let members: HashSet<&str> = scc.into_iter().collect();
            flow.steps
                .iter()
                .filter(|s| members.contains(s.id.as_str()))
                .map(|s| s.id.clone())
                .collect()
        })
        .collect();
    groups.sort_by_key(|g| g.first().and_then(|id| flow.position(id)));
    groups
}

/// Steps that cannot be reached from the entry step by following links.
pub fn unreachable_steps(flow: &Flow) -> Vec<String> {
    let graph = link_graph(flow);
    let Some(entry) = flow.steps.first() else {
        return Vec::new();
    };
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack = vec![entry.id.as_str()];
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(graph.neighbors(id));
        }
    }
    flow.steps
        .iter()
        .filter(|s| !seen.contains(s.id.as_str()))
        .map(|s| s.id.clone())
        .collect()
}
