use envinject_lib::system::BuildContext;
use envinject_lib::{BuildRecord, JobConfig, MemoryRecord};

use super::common::{TestNode, vars};

fn keeping_build_vars() -> JobConfig {
  JobConfig {
    keep_build_vars: true,
    ..JobConfig::default()
  }
}

#[test]
fn workspace_variables_are_resolved_and_pruned() {
  let node = TestNode::new();
  let prior = vars(&[
    ("OUT", "${WORKSPACE}/out"),
    ("CACHE", "${OUT}/cache"),
    ("TOKEN", "${VAULT_TOKEN}"),
    ("SHELL_STYLE", "$HOME/bin"),
  ]);
  let mut record = MemoryRecord::new();

  let published = node
    .injector()
    .before_workspace_use(Some(&keeping_build_vars()), &prior, node.root.path(), &mut record)
    .unwrap();

  let ws = node.root.path().to_string_lossy().to_string();
  assert_eq!(published.get("WORKSPACE"), Some(ws.as_str()));
  assert_eq!(published.get("CACHE"), Some(format!("{ws}/out/cache").as_str()));
  assert_eq!(published.get("SHELL_STYLE"), Some("$HOME/bin"));
  assert!(!published.contains("TOKEN"));
  assert_eq!(record.publications(), 1);
}

#[test]
fn disabled_job_skips_workspace_hook() {
  let node = TestNode::new();
  let config = JobConfig {
    on: false,
    ..keeping_build_vars()
  };
  let mut record = MemoryRecord::new();

  let published = node
    .injector()
    .before_workspace_use(Some(&config), &vars(&[("A", "1")]), node.root.path(), &mut record);

  assert!(published.is_none());
  assert!(record.env_injection().is_none());
}

#[tokio::test]
async fn step_builds_on_workspace_result() {
  let node = TestNode::new();
  let injector = node.injector();
  let config = JobConfig {
    keep_build_vars: true,
    ..JobConfig::from_json(r#"{ "properties_content": "REPORT=${WORKSPACE}/report.xml" }"#).unwrap()
  };
  let mut record = MemoryRecord::new();

  let after_checkout = injector
    .before_workspace_use(Some(&config), &vars(&[("STAGE", "checkout")]), node.root.path(), &mut record)
    .unwrap();

  let mut build = BuildContext::new("nightly", 12);
  build.workspace = Some(node.root.path().to_path_buf());
  let result = injector.before_step(Some(&config), &build, &after_checkout, &mut record).await.unwrap();

  let ws = node.root.path().to_string_lossy().to_string();
  assert_eq!(result.vars.get("STAGE"), Some("checkout"));
  assert_eq!(result.vars.get("REPORT"), Some(format!("{ws}/report.xml").as_str()));
  assert_eq!(result.vars.get("BUILD_TAG"), Some("envinject-nightly-12"));
  assert_eq!(record.env_injection(), Some(&result.vars));
  assert_eq!(record.publications(), 2);
}
