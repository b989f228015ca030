//! Item mode: one build per item whose condition holds.

use std::slice;

use tracing::{debug, info};

use super::merge::{self, Settings};
use super::{BuildInput, GenerateError, Request, check};
use crate::buildspec::Item;

pub(crate) fn resolve(request: &Request<'_>) -> Result<BuildInput, GenerateError> {
  let implicit = Item::default();
  let items = match request.buildspec.lambuild.items.as_slice() {
    [] => slice::from_ref(&implicit),
    items => items,
  };

  let mut builds = Vec::with_capacity(items.len());
  for (index, item) in items.iter().enumerate() {
    let scope = request
      .scope
      .with_item(&item.param)
      .map_err(GenerateError::Runtime)?;

    if !check(item.condition.as_ref(), &scope, || format!("lambuild.items[{index}].if"))? {
      debug!(index, "item condition is false, skipping");
      continue;
    }

    let variables = merge::overlay(
      request.lambuild_variables(&scope)?,
      merge::evaluate_variables(&item.overrides.env, &scope, &format!("lambuild.items[{index}]"))?,
    );
    let status = request.status_context(item.overrides.build_status_context.as_ref(), &scope)?;
    let buildspec = request.buildspec.payload(&scope)?;

    let settings = Settings::from_overrides(&item.overrides).or(request.lambuild_settings());
    builds.push(settings.into_build(buildspec, variables, status));
  }

  if builds.is_empty() {
    info!(items = items.len(), "every item condition is false, no build is run");
    return Ok(BuildInput::Empty);
  }
  Ok(BuildInput::Builds(builds))
}
