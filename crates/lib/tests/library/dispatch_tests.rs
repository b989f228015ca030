use std::sync::Arc;

use lambuild_lib::dispatch::{
  BuildService, DispatchError, Dispatcher, Document, Outcome, ServiceError, StartBuild, StartBuildBatch,
};
use lambuild_lib::generate::Generator;
use tokio::sync::Mutex;

use super::common::{FakeScm, fixture, push};

#[derive(Default)]
struct Service {
  started: Mutex<Vec<String>>,
}

impl BuildService for Service {
  async fn start_build(&self, input: StartBuild) -> Result<String, ServiceError> {
    let id = format!("{}:{}", input.project_name, input.request.buildspec_override.unwrap_or_default());
    self.started.lock().await.push(id.clone());
    Ok(id)
  }

  async fn start_build_batch(&self, input: StartBuildBatch) -> Result<String, ServiceError> {
    Err(ServiceError(format!("batch builds are disabled for {}", input.project_name)))
  }
}

#[tokio::test]
async fn documents_share_one_context() {
  let scm = Arc::new(FakeScm::new(&[], &[]));
  let data = push(scm.clone());
  let dispatcher = Dispatcher::new(Service::default(), Generator::new(), "project");

  let documents = (0..4)
    .map(|i| Document {
      path: format!("graph-{i}.yaml"),
      buildspec: fixture("graph.yaml"),
    })
    .collect();

  let outcomes = dispatcher.dispatch(&data, documents).await.unwrap();

  assert_eq!(outcomes.len(), 4);
  for (i, outcome) in outcomes.iter().enumerate() {
    assert_eq!(outcome.path, format!("graph-{i}.yaml"));
    assert_eq!(outcome.outcome, Outcome::Builds(vec!["project:build.yml".to_string()]));
  }
  assert_eq!(dispatcher.service().started.lock().await.len(), 4);
  // Concurrent tasks may race on the first fetch, but never more than once each.
  assert!(scm.calls() <= 8, "calls: {}", scm.calls());
}

#[tokio::test]
async fn batch_failure_is_reported_after_siblings_finish() {
  let scm = Arc::new(FakeScm::new(&["test"], &[]));
  let data = push(scm);
  let dispatcher = Dispatcher::new(Service::default(), Generator::new(), "project");

  let documents = vec![
    Document {
      path: "batch.yaml".to_string(),
      buildspec: fixture("graph.yaml"),
    },
    Document {
      path: "matrix.yaml".to_string(),
      buildspec: fixture("matrix.yaml"),
    },
  ];

  let err = dispatcher.dispatch(&data, documents).await.unwrap_err();
  assert!(matches!(err, DispatchError::StartBuildBatch { ref path, .. } if path == "batch.yaml"), "{err}");
  assert_eq!(
    dispatcher.service().started.lock().await.as_slice(),
    &["project:matrix.yml".to_string()]
  );
}
