//! Graph mode.
//!
//! Elements whose condition is false are dropped, then every element that
//! depends on a dropped element is dropped too, repeatedly, until a pass
//! removes nothing.

use std::collections::{HashMap, HashSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_yaml::Value;
use tracing::{info, warn};

use super::merge::Settings;
use super::{BuildInput, GenerateError, Request, filter_elements};
use crate::buildspec::GraphElement;

pub(crate) fn resolve(request: &Request<'_>) -> Result<BuildInput, GenerateError> {
  let passed = filter_elements(
    &request.buildspec.batch.build_graph,
    request.scope,
    "batch.build-graph",
    |e| e.condition.as_ref(),
    |e| e.identifier.as_str(),
  )?;
  let survivors = prune_dependencies(passed);
  warn_cycles(&survivors);

  match survivors.as_slice() {
    [] => {
      info!("no build of the build graph is run");
      Ok(BuildInput::Empty)
    }
    [element] => request.single_build(
      Settings::from_element(&element.env, element.debug_session),
      element.buildspec.as_deref(),
      element.env.variables.clone(),
    ),
    _ => {
      let mut batch = request.buildspec.raw_batch();
      batch.insert(
        Value::from("build-graph"),
        Value::Sequence(survivors.iter().map(|e| Value::Mapping(e.raw.clone())).collect()),
      );
      request.batch_build(batch)
    }
  }
}

/// Drops every element with a dependency outside the set, until none is left.
///
/// The relative order of the survivors is kept. Running it again on its own
/// output returns the same elements.
pub fn prune_dependencies<'e>(mut survivors: Vec<&'e GraphElement>) -> Vec<&'e GraphElement> {
  loop {
    let identifiers: HashSet<&'e str> = survivors.iter().map(|&e| e.identifier.as_str()).collect();
    let before = survivors.len();

    survivors.retain(|element| {
      match element.depend_on.iter().find(|dep| !identifiers.contains(dep.as_str())) {
        Some(missing) => {
          info!(
            build_identifier = %element.identifier,
            dependent_identifier = %missing,
            "build is removed because a build it depends on is not run"
          );
          false
        }
        None => true,
      }
    });

    if survivors.len() == before {
      return survivors;
    }
  }
}

/// Cycles among survivors are left to the build service, which rejects them.
fn warn_cycles(survivors: &[&GraphElement]) {
  let mut graph: DiGraph<&str, ()> = DiGraph::new();
  let nodes: HashMap<&str, NodeIndex> = survivors
    .iter()
    .map(|e| (e.identifier.as_str(), graph.add_node(e.identifier.as_str())))
    .collect();

  for element in survivors {
    let Some(&to) = nodes.get(element.identifier.as_str()) else {
      continue;
    };
    for dep in &element.depend_on {
      if let Some(&from) = nodes.get(dep.as_str()) {
        graph.add_edge(from, to, ());
      }
    }
  }

  if let Err(cycle) = toposort(&graph, None) {
    warn!(
      build_identifier = graph[cycle.node_id()],
      "builds of the build graph depend on each other in a cycle"
    );
  }
}
