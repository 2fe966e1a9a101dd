mod common;
mod pipeline_tests;
mod workspace_tests;
