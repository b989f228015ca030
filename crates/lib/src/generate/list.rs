//! List mode: like graph mode, without dependencies.

use serde_yaml::Value;
use tracing::info;

use super::merge::Settings;
use super::{BuildInput, GenerateError, Request, filter_elements};

pub(crate) fn resolve(request: &Request<'_>) -> Result<BuildInput, GenerateError> {
  let survivors = filter_elements(
    &request.buildspec.batch.build_list,
    request.scope,
    "batch.build-list",
    |e| e.condition.as_ref(),
    |e| e.identifier.as_str(),
  )?;

  match survivors.as_slice() {
    [] => {
      info!("no build of the build list is run");
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
        Value::from("build-list"),
        Value::Sequence(survivors.iter().map(|e| Value::Mapping(e.raw.clone())).collect()),
      );
      request.batch_build(batch)
    }
  }
}
