//! Matrix mode.
//!
//! Each dynamic axis is filtered on its own. An axis emptied by filtering
//! empties the whole matrix; the product of the remaining axis lengths decides
//! between one build and one batch build.

use std::collections::BTreeMap;

use tracing::{debug, info};

use super::merge::Settings;
use super::{BuildInput, GenerateError, Request, check};
use crate::buildspec::{Axis, MatrixDynamic, MatrixStatic};
use crate::expr::Scope;
use crate::util::yaml::{set_in, string_sequence};

/// Filtered axes. An empty axis was never populated.
#[derive(Debug, Default)]
struct Axes {
  buildspec: Vec<String>,
  image: Vec<String>,
  compute_type: Vec<String>,
  variables: BTreeMap<String, Vec<String>>,
}

impl Axes {
  /// Returns `None` when a populated axis has no entry left.
  fn filter(dynamic: &MatrixDynamic, scope: &Scope<'_>) -> Result<Option<Self>, GenerateError> {
    let mut axes = Axes::default();

    for (name, axis, out) in [
      ("buildspec", &dynamic.buildspec, &mut axes.buildspec),
      ("env.image", &dynamic.env.image, &mut axes.image),
      ("env.compute-type", &dynamic.env.compute_type, &mut axes.compute_type),
    ] {
      let Some(values) = filter_axis(axis, scope, name)? else {
        return Ok(None);
      };
      *out = values;
    }

    for (variable, axis) in &dynamic.env.variables {
      let name = format!("env.variables.{variable}");
      let Some(values) = filter_axis(axis, scope, &name)? else {
        return Ok(None);
      };
      if !values.is_empty() {
        axes.variables.insert(variable.clone(), values);
      }
    }

    Ok(Some(axes))
  }

  fn cardinality(&self) -> usize {
    [&self.buildspec, &self.image, &self.compute_type]
      .into_iter()
      .filter(|axis| !axis.is_empty())
      .map(Vec::len)
      .product::<usize>()
      * size_of_variables(&self.variables)
  }
}

fn filter_axis(axis: &Axis, scope: &Scope<'_>, name: &str) -> Result<Option<Vec<String>>, GenerateError> {
  let mut values = Vec::with_capacity(axis.entries().len());
  for (index, entry) in axis.entries().iter().enumerate() {
    if check(entry.condition(), scope, || {
      format!("batch.build-matrix.dynamic.{name}[{index}].if")
    })? {
      values.push(entry.value().to_string());
    }
  }

  if !axis.is_empty() && values.is_empty() {
    info!(axis = name, "every entry of a matrix axis is filtered out, no build is run");
    return Ok(None);
  }
  Ok(Some(values))
}

/// The number of combinations of the variable axes. Empty axes count as one.
pub fn size_of_variables(variables: &BTreeMap<String, Vec<String>>) -> usize {
  variables
    .values()
    .filter(|values| !values.is_empty())
    .map(Vec::len)
    .product()
}

pub(crate) fn resolve(request: &Request<'_>) -> Result<BuildInput, GenerateError> {
  let Some(matrix) = &request.buildspec.batch.build_matrix else {
    return Ok(BuildInput::Empty);
  };
  let static_env = matrix.static_env.as_ref();

  if !matrix.dynamic.is_populated() {
    debug!("the build matrix has no dynamic axis, running the static block");
    return resolve_static(request, static_env);
  }

  let Some(axes) = Axes::filter(&matrix.dynamic, request.scope)? else {
    return Ok(BuildInput::Empty);
  };

  let cardinality = axes.cardinality();
  debug!(cardinality, "filtered the build matrix");
  if cardinality > 1 {
    return batch(request, axes);
  }

  let mut settings = Settings {
    image: axes.image.first().cloned(),
    compute_type: axes.compute_type.first().cloned(),
    ..Default::default()
  };
  let mut variables = BTreeMap::new();
  if let Some(static_env) = static_env {
    settings = settings.or(Settings::from_element(&static_env.env, None));
    variables.extend(static_env.env.variables.clone());
  }
  variables.extend(
    axes
      .variables
      .iter()
      .filter_map(|(name, values)| Some((name.clone(), values.first()?.clone()))),
  );

  request.single_build(settings, axes.buildspec.first().map(String::as_str), variables)
}

fn resolve_static(request: &Request<'_>, static_env: Option<&MatrixStatic>) -> Result<BuildInput, GenerateError> {
  match static_env {
    Some(static_env) => request.single_build(
      Settings::from_element(&static_env.env, None),
      None,
      static_env.env.variables.clone(),
    ),
    None => request.single_build(Settings::default(), None, BTreeMap::new()),
  }
}

fn batch(request: &Request<'_>, axes: Axes) -> Result<BuildInput, GenerateError> {
  let mut batch = request.buildspec.raw_batch();
  let dynamic = ["build-matrix", "dynamic"];

  if !axes.buildspec.is_empty() {
    set_in(&mut batch, &[dynamic[0], dynamic[1], "buildspec"], string_sequence(axes.buildspec));
  }
  if !axes.image.is_empty() {
    set_in(&mut batch, &[dynamic[0], dynamic[1], "env", "image"], string_sequence(axes.image));
  }
  if !axes.compute_type.is_empty() {
    set_in(
      &mut batch,
      &[dynamic[0], dynamic[1], "env", "compute-type"],
      string_sequence(axes.compute_type),
    );
  }
  for (name, values) in axes.variables {
    set_in(
      &mut batch,
      &[dynamic[0], dynamic[1], "env", "variables", name.as_str()],
      string_sequence(values),
    );
  }

  request.batch_build(batch)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_yaml::Value;
  use tracing_test::traced_test;

  use crate::buildspec::Buildspec;
  use crate::generate::generate;
  use crate::util::testutil::push_data;

  fn generate_yaml(yaml: &str) -> BuildInput {
    generate(&push_data(), &Buildspec::from_yaml(yaml).unwrap()).unwrap()
  }

  #[test]
  fn variable_axes_multiply() {
    let variables = BTreeMap::from([
      ("FOO".to_string(), vec!["a".to_string(), "b".to_string()]),
      ("BAR".to_string(), vec!["x".to_string(), "y".to_string(), "z".to_string()]),
    ]);
    assert_eq!(size_of_variables(&variables), 6);
    assert_eq!(size_of_variables(&BTreeMap::new()), 1);
  }

  #[test]
  fn one_combination_is_a_single_build() {
    let input = generate_yaml(
      r#"
batch:
  build-matrix:
    dynamic:
      env:
        image:
          - alpine
        compute-type:
          - BUILD_GENERAL1_SMALL
        variables:
          FOO:
            - YOO
"#,
    );

    let builds = input.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].image_override.as_deref(), Some("alpine"));
    assert_eq!(builds[0].compute_type_override.as_deref(), Some("BUILD_GENERAL1_SMALL"));
    assert_eq!(builds[0].variable("FOO"), Some("YOO"));

    let payload: Value = serde_yaml::from_str(builds[0].buildspec_override.as_deref().unwrap()).unwrap();
    assert!(payload.get("batch").is_none());
  }

  #[test]
  fn filtering_down_to_one_combination_is_a_single_build() {
    let input = generate_yaml(
      r#"
lambuild:
  env:
    variables:
      FOO: "'spec'"
      BAR: "'spec'"
batch:
  build-matrix:
    dynamic:
      buildspec:
        - value: pr.yml
          if: event.name == 'pull_request'
        - push.yml
      env:
        variables:
          FOO:
            - value: pr
              if: "false"
            - push
"#,
    );

    let build = &input.builds()[0];
    assert_eq!(build.buildspec_override.as_deref(), Some("push.yml"));
    assert_eq!(build.variable("FOO"), Some("push"));
    assert_eq!(build.variable("BAR"), Some("spec"));
  }

  #[test]
  #[traced_test]
  fn exhausted_axis_empties_the_matrix() {
    let input = generate_yaml(
      r#"
batch:
  build-matrix:
    dynamic:
      env:
        image:
          - alpine
          - ubuntu
        variables:
          FOO:
            - value: a
              if: "false"
"#,
    );

    assert_eq!(input, BuildInput::Empty);
    assert!(logs_contain("env.variables.FOO"));
  }

  #[test]
  fn several_combinations_are_a_batch_build_with_filtered_axes() {
    let input = generate_yaml(
      r#"
version: 0.2
lambuild:
  env:
    variables:
      FOO: "'spec'"
batch:
  build-matrix:
    static:
      ignore-failure: false
    dynamic:
      env:
        image:
          - alpine
          - value: ubuntu
            if: event.name == 'push'
          - value: debian
            if: "false"
        variables:
          BAR:
            - "1"
            - "2"
"#,
    );

    let batch = input.batch().unwrap();
    assert_eq!(batch.variable("FOO"), Some("spec"));

    let payload: Value = serde_yaml::from_str(&batch.buildspec_override).unwrap();
    let matrix = &payload["batch"]["build-matrix"];
    assert_eq!(matrix["static"]["ignore-failure"], Value::Bool(false));
    assert_eq!(matrix["dynamic"]["env"]["image"], string_sequence(["alpine", "ubuntu"]));
    assert_eq!(matrix["dynamic"]["env"]["variables"]["BAR"], string_sequence(["1", "2"]));
  }

  #[test]
  fn static_only_matrix_is_a_single_build_with_static_settings() {
    let input = generate_yaml(
      r#"
lambuild:
  compute-type: BUILD_GENERAL1_LARGE
batch:
  build-matrix:
    static:
      env:
        image: alpine
        privileged-mode: true
        variables:
          FOO: static
"#,
    );

    let build = &input.builds()[0];
    assert_eq!(build.image_override.as_deref(), Some("alpine"));
    assert_eq!(build.compute_type_override.as_deref(), Some("BUILD_GENERAL1_LARGE"));
    assert_eq!(build.privileged_mode_override, Some(true));
    assert_eq!(build.variable("FOO"), Some("static"));
  }
}
