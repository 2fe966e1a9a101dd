//! The environment injection pipeline of a build step.
//!
//! [`EnvInjector`] exposes the entry points a scheduler calls:
//! - [`EnvInjector::before_workspace_use`] once the workspace is available
//! - [`EnvInjector::before_step`] right before the build step runs
//! - [`EnvInjector::after_step`] once the build has completed
//!
//! The first two take a snapshot of the variables established by earlier
//! steps and publish their result to a [`BuildRecord`]. Nothing is published
//! when a stage fails.

mod record;
mod types;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

pub use record::{BuildRecord, MemoryRecord};
pub use types::{ResolutionResult, Stage};

use crate::config::JobConfig;
use crate::consts::WORKSPACE_VAR;
use crate::contrib::Contributors;
use crate::error::InjectError;
use crate::expr::evaluate_expression;
use crate::placeholder;
use crate::properties::{Locations, PropertiesLoader};
use crate::script::{Interrupt, OutputSink, ScriptExecutor, TracingSink};
use crate::system::{BuildContext, NodeContext};
use crate::vars::{PrecedenceChain, VariableSet, merge};

/// Runs injection for build steps on one node.
pub struct EnvInjector {
  node: NodeContext,
  central: NodeContext,
  contributors: Contributors,
  sink: Arc<dyn OutputSink>,
  interrupt: Option<Interrupt>,
}

impl EnvInjector {
  /// Injector for steps on `node`, which also acts as the central host.
  pub fn new(node: NodeContext) -> Self {
    Self {
      central: node.clone(),
      node,
      contributors: Contributors::new(),
      sink: Arc::new(TracingSink),
      interrupt: None,
    }
  }

  pub fn with_central(mut self, central: NodeContext) -> Self {
    self.central = central;
    self
  }

  /// Contributors queried for every step, before the job's own contributions.
  pub fn with_contributors(mut self, contributors: Contributors) -> Self {
    self.contributors = contributors;
    self
  }

  /// Where script output goes.
  pub fn with_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
    self.sink = sink;
    self
  }

  pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
    self.interrupt = Some(interrupt);
    self
  }

  pub fn node(&self) -> &NodeContext {
    &self.node
  }

  pub fn central(&self) -> &NodeContext {
    &self.central
  }

  /// Entry point called once the workspace of a build is available.
  ///
  /// Only acts when the job keeps build variables: `WORKSPACE` is added to
  /// the prior variables unless already present, the set is resolved
  /// against itself, and variables still referencing unknown names are
  /// dropped before publishing.
  ///
  /// # Returns
  ///
  /// The published variables, or `None` when the job does not ask for them.
  pub fn before_workspace_use(
    &self,
    config: Option<&JobConfig>,
    prior: &VariableSet,
    workspace: &Path,
    record: &mut impl BuildRecord,
  ) -> Option<VariableSet> {
    let config = config.filter(|c| c.on)?;
    if !config.keep_build_vars {
      debug!("build variables not kept; skipping workspace injection");
      return None;
    }

    let mut vars = prior.clone();
    if !vars.contains(WORKSPACE_VAR) {
      vars.insert(WORKSPACE_VAR, workspace.to_string_lossy());
    }
    placeholder::resolve_self(&mut vars);
    let vars = placeholder::remove_unset_vars(&vars);

    info!(count = vars.len(), workspace = %workspace.display(), "publishing workspace variables");
    record.set_env_injection(vars.clone());
    Some(vars)
  }

  /// Entry point called before a build step runs.
  ///
  /// With an enabled job configuration this runs the full pipeline:
  /// 1. Gather the prior variables and the node's own variables
  /// 2. Seed with system and build variables, as configured
  /// 3. Run the injection script; a non-zero exit fails the step
  /// 4. Evaluate the expression
  /// 5. Load properties
  /// 6. Collect contributions
  /// 7. Merge `[seeded, properties, expression, contributions]`
  /// 8. Resolve references within the merged set
  /// 9. Publish
  ///
  /// Without a configuration (or with `on` unset) the prior, system and
  /// build variables are published as they are.
  ///
  /// # Errors
  ///
  /// The first failing stage aborts the pipeline; nothing is published.
  pub async fn before_step(
    &self,
    config: Option<&JobConfig>,
    build: &BuildContext,
    prior: &VariableSet,
    record: &mut impl BuildRecord,
  ) -> Result<ResolutionResult, InjectError> {
    let mut run = Run::new(self.interrupt.as_ref());

    let outcome = match config.filter(|c| c.on) {
      Some(config) => self.run_pipeline(&mut run, config, build, prior).await,
      None => self.run_without_property(&mut run, build, prior),
    };
    let outcome = outcome.and_then(|done| run.enter(Stage::Published).map(|()| done));

    match outcome {
      Ok((vars, exit_code)) => {
        info!(count = vars.len(), job = %build.job_name, "published injected variables");
        record.set_env_injection(vars.clone());
        Ok(ResolutionResult {
          vars,
          exit_code,
          stages: run.stages,
        })
      }
      Err(err) => {
        let stage = run.current();
        run.stages.push(Stage::Failed);
        error!(
          stage = %stage,
          trace = ?run.stages,
          kind = %err.kind(),
          error = %err,
          "environment injection failed"
        );
        Err(err)
      }
    }
  }

  /// Entry point called once a build has completed.
  ///
  /// A build whose steps never published an injected environment gets
  /// `build_env`, the environment the build ended with. A record that
  /// already holds an injection is left untouched.
  ///
  /// # Returns
  ///
  /// The published variables, or `None` when the record already had some.
  pub fn after_step(&self, build_env: &VariableSet, record: &mut impl BuildRecord) -> Option<VariableSet> {
    if record.env_injection().is_some() {
      debug!("build already carries an injected environment");
      return None;
    }

    info!(count = build_env.len(), "publishing environment of completed build");
    record.set_env_injection(build_env.clone());
    Some(build_env.clone())
  }

  async fn run_pipeline(
    &self,
    run: &mut Run<'_>,
    config: &JobConfig,
    build: &BuildContext,
    prior: &VariableSet,
  ) -> Result<(VariableSet, Option<i32>), InjectError> {
    let info = &config.info;

    run.enter(Stage::Gathering)?;
    if config.keep_system_vars {
      info!("keeping system variables");
    }
    if config.keep_build_vars {
      info!("keeping build variables");
    }
    let gathered = self.gather(prior);
    let infra_node = seed(&gathered, &self.node, config, build);
    let infra_central = seed(&gathered, &self.central, config, build);

    run.enter(Stage::ExecutingScript)?;
    let spec = info.script_spec();
    let mut exit_code = None;
    if !spec.is_empty() {
      let path_env = if spec.load_from_central { &infra_central } else { &infra_node };
      let code = self.executor().execute(&spec, path_env, &infra_node).await?;
      exit_code = Some(code);
      if code != 0 {
        return Err(InjectError::NonZeroExit { code });
      }
    }

    run.enter(Stage::Evaluating)?;
    let from_expression = evaluate_expression(info.expression.as_deref(), &infra_node)?;

    run.enter(Stage::LoadingProperties)?;
    let inline = info.properties_content_map(&gathered)?;
    let locations = Locations::new(self.node.root.clone(), self.central.root.clone());
    let from_properties = PropertiesLoader::new(&locations).load(
      info.load_from_central,
      info.properties_path.as_deref(),
      &inline,
      &infra_central,
      &infra_node,
    )?;

    run.enter(Stage::Contributing)?;
    let registered = self.contributors.collect(build)?;
    let configured = config.contributors().collect(build)?;
    let contributions = merge([&registered, &configured]);

    run.enter(Stage::Merging)?;
    let mut vars = PrecedenceChain::new()
      .then(&infra_node)
      .then(&from_properties)
      .then(&from_expression)
      .then(&contributions)
      .merge();

    run.enter(Stage::Resolving)?;
    placeholder::resolve_self(&mut vars);

    Ok((vars, exit_code))
  }

  fn run_without_property(
    &self,
    run: &mut Run<'_>,
    build: &BuildContext,
    prior: &VariableSet,
  ) -> Result<(VariableSet, Option<i32>), InjectError> {
    run.enter(Stage::Gathering)?;
    debug!("no injection configured for job; publishing system and build variables");
    let gathered = self.gather(prior);
    let build_vars = build.build_variables();

    run.enter(Stage::Merging)?;
    Ok((merge([&gathered, &self.node.system_vars, &build_vars]), None))
  }

  /// Prior variables with the node's own variables on top.
  fn gather(&self, prior: &VariableSet) -> VariableSet {
    let node_vars = self.node.resolved_node_vars();
    if !node_vars.is_empty() {
      debug!(node = %self.node.name, count = node_vars.len(), "injecting node variables");
    }
    merge([prior, &node_vars])
  }

  /// Scripts run in the node root; relative script paths and properties
  /// files resolve there too, whatever the build's workspace is.
  fn executor(&self) -> ScriptExecutor {
    let executor = ScriptExecutor::new(&self.node.root, self.node.dialect)
      .with_resource_root(self.central.root.clone())
      .with_sink(Arc::clone(&self.sink));
    match &self.interrupt {
      Some(interrupt) => executor.with_interrupt(interrupt.clone()),
      None => executor,
    }
  }
}

/// `gathered` plus the host's system variables and the build variables, as
/// the job configuration asks.
fn seed(gathered: &VariableSet, host: &NodeContext, config: &JobConfig, build: &BuildContext) -> VariableSet {
  let build_vars = if config.keep_build_vars {
    build.build_variables()
  } else {
    VariableSet::new()
  };

  let mut chain = PrecedenceChain::new().then(gathered);
  if config.keep_system_vars {
    chain = chain.then(&host.system_vars);
  }
  chain.then(&build_vars).merge()
}

/// Stage bookkeeping for one pipeline run.
struct Run<'a> {
  interrupt: Option<&'a Interrupt>,
  stages: Vec<Stage>,
}

impl<'a> Run<'a> {
  fn new(interrupt: Option<&'a Interrupt>) -> Self {
    Self {
      interrupt,
      stages: vec![Stage::Init],
    }
  }

  fn enter(&mut self, stage: Stage) -> Result<(), InjectError> {
    if self.interrupt.is_some_and(Interrupt::is_interrupted) {
      return Err(InjectError::Interrupted);
    }
    debug!(stage = %stage, "entering stage");
    self.stages.push(stage);
    Ok(())
  }

  fn current(&self) -> Stage {
    self.stages.last().copied().unwrap_or(Stage::Init)
  }
}
