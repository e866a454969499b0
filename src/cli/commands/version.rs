//! Version command implementation.

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    schema_version: i32,
    build: &'a str,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };

    if json {
        return super::print_json(&VersionOutput {
            version,
            schema_version: CURRENT_SCHEMA_VERSION,
            build,
        });
    }

    println!("pb version {version} (schema {CURRENT_SCHEMA_VERSION}, {build})");
    Ok(())
}
