use anyhow::Result;
use serde::Serialize;

use envinject_lib::consts::APP_NAME;
use envinject_lib::script::ShellDialect;
use envinject_lib::system::system_variables;

use crate::output::{OutputFormat, print_json, print_stat};

#[derive(Debug, Serialize)]
struct Info {
  name: &'static str,
  version: &'static str,
  dialect: ShellDialect,
  script_suffix: &'static str,
  system_variables: usize,
}

pub fn cmd_info(output: OutputFormat) -> Result<()> {
  let dialect = ShellDialect::current();
  let info = Info {
    name: APP_NAME,
    version: env!("CARGO_PKG_VERSION"),
    dialect,
    script_suffix: dialect.script_suffix(),
    system_variables: system_variables().len(),
  };

  if output.is_json() {
    return print_json(&info);
  }

  println!("{} v{}", info.name, info.version);
  print_stat("Script dialect", info.dialect.as_str());
  print_stat("Script suffix", info.script_suffix);
  print_stat("System variables", &info.system_variables.to_string());
  Ok(())
}
