pub const APP_NAME: &str = "envinject";

/// Name reported for the node this process runs on.
pub const LOCAL_NODE_NAME: &str = "local";

/// Prefix of temporary script files written for inline script content.
pub const SCRIPT_PREFIX: &str = "envinject";

/// Variable pointing at the step's working directory.
pub const WORKSPACE_VAR: &str = "WORKSPACE";
