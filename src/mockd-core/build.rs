use std::fs;

fn main() {
    // Read workspace metadata from workspace Cargo.toml
    let workspace_manifest_path = "../../Cargo.toml"; // relative to this crate
    println!("cargo:rerun-if-changed={workspace_manifest_path}");
    let manifest_content = fs::read_to_string(workspace_manifest_path).unwrap_or_default();

    let mut in_metadata = false;
    let mut app_name = None;
    for line in manifest_content.lines().map(str::trim) {
        if line.starts_with('[') {
            in_metadata = line == "[workspace.metadata]";
            continue;
        }
        if in_metadata && line.starts_with("name") {
            app_name = line.split('=').nth(1).map(|v| v.trim().trim_matches('"').to_string());
            break;
        }
    }
    let app_name = app_name.unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());

    println!("cargo:rustc-env=APP_NAME={}", app_name);
}
