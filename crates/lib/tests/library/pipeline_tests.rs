use std::sync::atomic::Ordering;

use envinject_lib::config::JobPropertyInfo;
use envinject_lib::contrib::{Contributors, StaticContributor};
use envinject_lib::script::{ShellDialect, interrupt_pair};
use envinject_lib::system::{BuildContext, NodeContext};
use envinject_lib::{BuildRecord, EnvInjector, ErrorKind, InjectError, JobConfig, MemoryRecord, Stage};

use super::common::{CountingContributor, TestNode, vars};

fn config_with(info: JobPropertyInfo) -> JobConfig {
  JobConfig {
    info,
    ..JobConfig::default()
  }
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn inline_properties_and_contributor() {
  let node = TestNode::new();
  let mut contributors = Contributors::new();
  contributors.register(StaticContributor::new("tags", vars(&[("BUILD_TAG", "42")])));
  let injector = node.injector().with_contributors(contributors);

  let config = config_with(JobPropertyInfo {
    properties_content: Some("GREETING=hi ${WORKSPACE}".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let result = injector
    .before_step(Some(&config), &BuildContext::default(), &vars(&[("WORKSPACE", "/ws")]), &mut record)
    .await
    .unwrap();

  let expected = vars(&[("WORKSPACE", "/ws"), ("GREETING", "hi /ws"), ("BUILD_TAG", "42")]);
  assert_eq!(result.vars, expected);
  assert_eq!(record.env_injection(), Some(&expected));
}

#[tokio::test]
#[cfg(unix)]
async fn failing_script_stops_pipeline() {
  let node = TestNode::new();
  let (contributor, calls) = CountingContributor::new(vars(&[("X", "1")]));
  let mut contributors = Contributors::new();
  contributors.register(contributor);
  let injector = node.injector().with_contributors(contributors);

  let config = config_with(JobPropertyInfo {
    script_content: Some("exit 3".to_string()),
    expression: Some("error('expression must not run')".to_string()),
    properties_path: Some("missing.properties".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let err = injector
    .before_step(Some(&config), &BuildContext::default(), &vars(&[("WORKSPACE", "/ws")]), &mut record)
    .await
    .unwrap_err();

  assert!(matches!(err, InjectError::NonZeroExit { code: 3 }));
  assert_eq!(err.kind(), ErrorKind::NonZeroExit);
  assert_eq!(calls.load(Ordering::SeqCst), 0);
  assert!(record.env_injection().is_none());
}

#[tokio::test]
async fn later_sources_override_earlier_ones() {
  let node = TestNode::new();
  node.write("build.properties", "MODE=from-file\nSOURCE=properties\n");
  let mut contributors = Contributors::new();
  contributors.register(StaticContributor::new("overrides", vars(&[("WINNER", "contribution")])));
  let injector = node.injector().with_contributors(contributors);

  let config = config_with(JobPropertyInfo {
    properties_path: Some("build.properties".to_string()),
    properties_content: Some("MODE=inline".to_string()),
    expression: Some("return { SOURCE = 'expression', WINNER = 'expression' }".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let prior = vars(&[("MODE", "prior"), ("SOURCE", "prior"), ("KEPT", "prior")]);
  let result = injector
    .before_step(Some(&config), &BuildContext::default(), &prior, &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("KEPT"), Some("prior"));
  assert_eq!(result.vars.get("MODE"), Some("inline"));
  assert_eq!(result.vars.get("SOURCE"), Some("expression"));
  assert_eq!(result.vars.get("WINNER"), Some("contribution"));
}

#[tokio::test]
async fn merged_set_is_resolved_against_itself() {
  let node = TestNode::new();
  let config = config_with(JobPropertyInfo {
    properties_content: Some("TOOL=${BIN}/tool\nLEFT=${NOWHERE}".to_string()),
    expression: Some("return { BIN = WORKSPACE .. '/bin' }".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &vars(&[("WORKSPACE", "/ws")]), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("TOOL"), Some("/ws/bin/tool"));
  assert_eq!(result.vars.get("LEFT"), Some("${NOWHERE}"));
}

#[tokio::test]
async fn self_appending_path_stays_bounded() {
  let node = TestNode::new();
  let mut text = String::from("PATH=${PATH}:/opt/bin\n");
  for i in 0..30 {
    text.push_str(&format!("K{i}=${{PATH}}/k{i}\n"));
  }
  let config = config_with(JobPropertyInfo {
    properties_content: Some(text),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("PATH"), Some("${PATH}:/opt/bin"));
  assert_eq!(result.vars.get("K7"), Some("${PATH}/k7"));
  assert!(result.vars.iter().all(|(_, value)| value.len() < 64));
}

#[tokio::test]
async fn self_appending_path_extends_prior_value() {
  let node = TestNode::new();
  let config = config_with(JobPropertyInfo {
    properties_content: Some("PATH=${PATH}:/opt/bin\nTOOLS=${PATH}".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &vars(&[("PATH", "/usr/bin")]), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("PATH"), Some("/usr/bin:/opt/bin"));
  // Inline text is expanded against the prior variables before parsing
  assert_eq!(result.vars.get("TOOLS"), Some("/usr/bin"));
}

#[tokio::test]
async fn job_contributions_follow_registered_ones() {
  let node = TestNode::new();
  let mut contributors = Contributors::new();
  contributors.register(StaticContributor::new("global", vars(&[("TIER", "global"), ("ONLY", "global")])));
  let config = JobConfig::from_json(r#"{ "contributions": [{ "name": "job", "vars": { "TIER": "job" } }] }"#).unwrap();
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .with_contributors(contributors)
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("TIER"), Some("job"));
  assert_eq!(result.vars.get("ONLY"), Some("global"));
}

// =============================================================================
// Scripts
// =============================================================================

#[tokio::test]
#[cfg(unix)]
async fn script_runs_with_seeded_environment() {
  let node = TestNode::new();
  let config = config_with(JobPropertyInfo {
    script_content: Some("echo \"building $JOB_NAME in $WORKSPACE\"".to_string()),
    ..Default::default()
  });
  let config = JobConfig {
    keep_build_vars: true,
    ..config
  };
  let mut build = BuildContext::new("nightly", 9);
  build.workspace = Some(node.root.path().to_path_buf());
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &build, &Default::default(), &mut record)
    .await
    .unwrap();

  assert_eq!(result.exit_code, Some(0));
  let expected = format!("building nightly in {}", node.root.path().display());
  assert!(node.sink.lines().contains(&expected), "output: {:?}", node.sink.lines());
}

#[tokio::test]
#[cfg(unix)]
async fn script_path_expands_against_node_variables() {
  let node = TestNode::new();
  node.write_executable("scripts/setup.sh", "#!/bin/sh\necho \"setup $1\"\n");
  let config = config_with(JobPropertyInfo {
    script_path: Some("${SCRIPTS}/setup.sh fast".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &vars(&[("SCRIPTS", "scripts")]), &mut record)
    .await
    .unwrap();

  assert_eq!(result.exit_code, Some(0));
  assert!(node.sink.lines().contains(&"setup fast".to_string()));
}

#[tokio::test]
#[cfg(unix)]
async fn interrupt_aborts_running_script() {
  let node = TestNode::new();
  let (handle, interrupt) = interrupt_pair();
  let config = config_with(JobPropertyInfo {
    script_content: Some("sleep 30".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  tokio::spawn(async move {
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    handle.interrupt();
  });

  let started = std::time::Instant::now();
  let err = node
    .injector()
    .with_interrupt(interrupt)
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Infrastructure);
  assert!(started.elapsed() < std::time::Duration::from_secs(10));
  assert!(record.env_injection().is_none());
}

#[tokio::test]
#[cfg(unix)]
async fn relative_paths_resolve_in_node_root_not_workspace() {
  let node = TestNode::new();
  let workspace = tempfile::TempDir::new().unwrap();
  node.write("env.properties", "FROM=node-root\n");
  node.write("marker.txt", "node-root marker\n");
  std::fs::write(workspace.path().join("env.properties"), "FROM=workspace\n").unwrap();
  std::fs::write(workspace.path().join("marker.txt"), "workspace marker\n").unwrap();

  let config = config_with(JobPropertyInfo {
    script_content: Some("cat marker.txt".to_string()),
    properties_path: Some("env.properties".to_string()),
    ..Default::default()
  });
  let mut build = BuildContext::new("nightly", 2);
  build.workspace = Some(workspace.path().to_path_buf());
  let mut record = MemoryRecord::new();

  let result = node
    .injector()
    .before_step(Some(&config), &build, &Default::default(), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("FROM"), Some("node-root"));
  assert!(node.sink.lines().contains(&"node-root marker".to_string()));
}

// =============================================================================
// Properties location
// =============================================================================

#[tokio::test]
async fn properties_from_central_use_central_lookup() {
  let node = TestNode::new();
  let central_root = tempfile::TempDir::new().unwrap();
  std::fs::create_dir(central_root.path().join("shared")).unwrap();
  std::fs::write(central_root.path().join("shared/env.properties"), "ORIGIN=central\n").unwrap();
  node.write("local/env.properties", "ORIGIN=node\n");

  let central = NodeContext::new("central", central_root.path(), ShellDialect::current())
    .with_system_vars(vars(&[("CONF_DIR", "shared")]));
  let injector = EnvInjector::new(node.context().with_system_vars(vars(&[("CONF_DIR", "local")])))
    .with_central(central)
    .with_sink(node.sink.clone());

  let config = JobConfig {
    keep_system_vars: true,
    ..config_with(JobPropertyInfo {
      properties_path: Some("${CONF_DIR}/env.properties".to_string()),
      load_from_central: true,
      ..Default::default()
    })
  };
  let mut record = MemoryRecord::new();

  let result = injector
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap();
  assert_eq!(result.vars.get("ORIGIN"), Some("central"));

  let config = JobConfig {
    info: JobPropertyInfo {
      load_from_central: false,
      ..config.info.clone()
    },
    ..config
  };
  let result = injector
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap();
  assert_eq!(result.vars.get("ORIGIN"), Some("node"));
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn malformed_properties_are_configuration_errors() {
  let node = TestNode::new();
  node.write("bad.properties", "=no key\n");
  let config = config_with(JobPropertyInfo {
    properties_path: Some("bad.properties".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let err = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Configuration);
  assert!(record.env_injection().is_none());
}

#[tokio::test]
async fn missing_properties_file_is_a_configuration_error() {
  let node = TestNode::new();
  let config = config_with(JobPropertyInfo {
    properties_path: Some("nope.properties".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let err = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Configuration);
  assert!(err.to_string().contains("nope.properties"));
}

#[tokio::test]
async fn expression_errors_are_configuration_errors() {
  let node = TestNode::new();
  let config = config_with(JobPropertyInfo {
    expression: Some("return {".to_string()),
    ..Default::default()
  });
  let mut record = MemoryRecord::new();

  let err = node
    .injector()
    .before_step(Some(&config), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap_err();

  assert!(matches!(err, InjectError::Expression(_)));
  assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn contributor_failure_aborts_everything() {
  let node = TestNode::new();
  let (failing, failing_calls) = CountingContributor::failing();
  let (after, after_calls) = CountingContributor::new(vars(&[("LATE", "1")]));
  let mut contributors = Contributors::new();
  contributors.register(failing).register(after);
  let mut record = MemoryRecord::new();

  let err = node
    .injector()
    .with_contributors(contributors)
    .before_step(Some(&JobConfig::default()), &BuildContext::default(), &Default::default(), &mut record)
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Contributor);
  assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
  assert_eq!(after_calls.load(Ordering::SeqCst), 0);
  assert!(record.env_injection().is_none());
}

// =============================================================================
// Without a job configuration
// =============================================================================

#[tokio::test]
async fn absent_config_publishes_prior_system_and_build_variables() {
  let node = TestNode::new();
  let injector = EnvInjector::new(node.context().with_system_vars(vars(&[("PATH", "/usr/bin")])));
  let mut record = MemoryRecord::new();

  let result = injector
    .before_step(None, &BuildContext::new("nightly", 3), &vars(&[("EARLIER", "yes")]), &mut record)
    .await
    .unwrap();

  assert_eq!(result.vars.get("EARLIER"), Some("yes"));
  assert_eq!(result.vars.get("PATH"), Some("/usr/bin"));
  assert_eq!(result.vars.get("BUILD_NUMBER"), Some("3"));
  assert_eq!(result.stages.last(), Some(&Stage::Published));
}
