use std::sync::Arc;

use lambuild_lib::generate::{BuildInput, Generator, generate};
use lambuild_lib::template::Template;
use serde_yaml::Value;

use super::common::{FakeScm, fixture, pull_request, push};

fn commands(buildspec: &str) -> Value {
  let payload: Value = serde_yaml::from_str(buildspec).unwrap();
  payload["phases"]["build"]["commands"].clone()
}

#[test]
fn graph_prunes_builds_depending_on_skipped_ones() {
  let scm = Arc::new(FakeScm::new(&[], &[]));
  let input = generate(&push(scm), &fixture("graph.yaml")).unwrap();

  let builds = input.builds();
  assert_eq!(builds.len(), 1);
  let build = &builds[0];
  assert_eq!(build.buildspec_override.as_deref(), Some("build.yml"));
  assert_eq!(build.image_override.as_deref(), Some("alpine"));
  assert_eq!(build.variable("FOO"), Some("bar"));
  assert_eq!(build.variable("PR_NUMBER"), Some("12"));
  assert_eq!(build.build_status_context.as_deref(), Some("lambuild (push)"));
}

#[test]
fn graph_with_every_build_is_a_batch_build() {
  let scm = Arc::new(FakeScm::new(&["test"], &[]));
  let input = generate(&push(scm), &fixture("graph.yaml")).unwrap();

  let batch = input.batch().expect("a batch build");
  assert_eq!(batch.variable("FOO"), Some("baz"));

  let payload: Value = serde_yaml::from_str(&batch.buildspec_override).unwrap();
  assert!(payload.get("lambuild").is_none());
  let identifiers: Vec<&str> = payload["batch"]["build-graph"]
    .as_sequence()
    .unwrap()
    .iter()
    .filter_map(|e| e["identifier"].as_str())
    .collect();
  assert_eq!(identifiers, vec!["build", "deploy", "test"]);
}

#[test]
fn pull_request_facts_are_fetched_once() {
  let scm = Arc::new(FakeScm::new(&[], &["src/main.rs"]));
  let data = push(scm.clone());

  generate(&data, &fixture("graph.yaml")).unwrap();
  let after_first = scm.calls();
  generate(&data, &fixture("graph.yaml")).unwrap();

  // the PR number lookup and the PR itself
  assert_eq!(after_first, 2);
  assert_eq!(scm.calls(), after_first);
}

#[test]
fn matrix_filtered_to_one_combination() {
  let scm = Arc::new(FakeScm::new(&[], &["src/main.rs"]));
  let input = generate(&pull_request(scm), &fixture("matrix.yaml")).unwrap();

  let builds = input.builds();
  assert_eq!(builds.len(), 1);
  assert_eq!(builds[0].buildspec_override.as_deref(), Some("matrix.yml"));
  assert_eq!(builds[0].image_override.as_deref(), Some("alpine"));
  assert_eq!(builds[0].compute_type_override.as_deref(), Some("BUILD_GENERAL1_SMALL"));
  assert_eq!(builds[0].variable("FOO"), Some("YOO"));
}

#[test]
fn matrix_with_several_combinations_is_a_batch_build() {
  let scm = Arc::new(FakeScm::new(&[], &["Dockerfile"]));
  let input = generate(&pull_request(scm), &fixture("matrix.yaml")).unwrap();

  let batch = input.batch().expect("a batch build");
  let payload: Value = serde_yaml::from_str(&batch.buildspec_override).unwrap();
  let images: Vec<&str> = payload["batch"]["build-matrix"]["dynamic"]["env"]["image"]
    .as_sequence()
    .unwrap()
    .iter()
    .filter_map(Value::as_str)
    .collect();
  assert_eq!(images, vec!["alpine", "ubuntu"]);
}

#[test]
fn items_are_skipped_outside_pull_requests() {
  let scm = Arc::new(FakeScm::new(&[], &["src/main.rs"]));
  let input = generate(&push(scm.clone()), &fixture("items.yaml")).unwrap();

  assert_eq!(input, BuildInput::Empty);
  assert_eq!(scm.calls(), 0);
}

#[test]
fn items_build_per_matching_item() {
  let scm = Arc::new(FakeScm::new(&[], &["src/lib.rs", "README.md"]));
  let generator = Generator::new().with_build_status_context(Some(Template::parse("default").unwrap()));
  let input = generator.generate(&pull_request(scm), &fixture("items.yaml")).unwrap();

  let builds = input.builds();
  assert_eq!(builds.len(), 2);

  assert_eq!(builds[0].variable("TASK"), Some("lint"));
  assert_eq!(builds[0].variable("PR"), Some("12"));
  assert_eq!(builds[0].compute_type_override.as_deref(), Some("BUILD_GENERAL1_SMALL"));
  assert_eq!(builds[0].build_status_context.as_deref(), Some("default"));
  assert_eq!(
    commands(builds[0].buildspec_override.as_deref().unwrap()),
    Value::Sequence(vec![Value::from("make lint")])
  );

  assert_eq!(builds[1].variable("TASK"), Some("docs"));
  assert_eq!(builds[1].build_status_context.as_deref(), Some("docs #12"));
  assert_eq!(
    commands(builds[1].buildspec_override.as_deref().unwrap()),
    Value::Sequence(vec![Value::from("make docs")])
  );
}
