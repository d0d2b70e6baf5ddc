//! Project layout canonicalization (§6): maps a loosely-named file path
//! produced by decomposition or a cognitive agent's solution into the
//! directory structure the coordinator's generated projects follow.

/// Route a bare filename into its conventional subdirectory. A path that
/// already contains a separator is assumed already placed and is returned
/// unchanged.
pub fn canonicalize_path(path: &str) -> String {
    if path.contains('/') {
        return path.to_string();
    }
    let lower = path.to_lowercase();
    let dir = if lower.starts_with("test") {
        "tests"
    } else if lower.starts_with("model") && lower.ends_with(".py") {
        "src/models"
    } else if lower.starts_with("service") {
        "src/services"
    } else if lower.starts_with("util") || lower.starts_with("helper") {
        "src/utils"
    } else if (lower.starts_with("core") || lower.starts_with("main")) && lower.ends_with(".py") {
        "src/core"
    } else if lower.ends_with(".py") {
        "src"
    } else if lower.ends_with(".md") {
        "docs"
    } else if matches!(lower.rsplit('.').next(), Some("yaml") | Some("yml") | Some("toml") | Some("ini") | Some("json")) {
        "config"
    } else if lower.ends_with(".sh") || lower.starts_with("script") {
        "scripts"
    } else if matches!(lower.rsplit('.').next(), Some("csv") | Some("txt") | Some("dat")) {
        "data"
    } else {
        "."
    };
    if dir == "." {
        path.to_string()
    } else {
        format!("{dir}/{path}")
    }
}

/// Canonicalize every path in a `files_to_create[]`-shaped list of
/// `{path, content}` objects, leaving other fields untouched.
pub fn canonicalize_manifest(files: &[serde_json::Value]) -> Vec<serde_json::Value> {
    files
        .iter()
        .map(|file| {
            let mut file = file.clone();
            if let Some(path) = file.get("path").and_then(|v| v.as_str()).map(canonicalize_path) {
                file["path"] = serde_json::Value::String(path);
            }
            file
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_name_and_extension() {
        assert_eq!(canonicalize_path("test_parser.py"), "tests/test_parser.py");
        assert_eq!(canonicalize_path("model_user.py"), "src/models/model_user.py");
        assert_eq!(canonicalize_path("service_auth.py"), "src/services/service_auth.py");
        assert_eq!(canonicalize_path("util_strings.py"), "src/utils/util_strings.py");
        assert_eq!(canonicalize_path("main.py"), "src/core/main.py");
        assert_eq!(canonicalize_path("README.md"), "docs/README.md");
        assert_eq!(canonicalize_path("config.yaml"), "config/config.yaml");
        assert_eq!(canonicalize_path("deploy.sh"), "scripts/deploy.sh");
        assert_eq!(canonicalize_path("dataset.csv"), "data/dataset.csv");
        assert_eq!(canonicalize_path("already/nested/path.py"), "already/nested/path.py");
    }

    #[test]
    fn manifest_canonicalization_preserves_content() {
        let files = vec![serde_json::json!({"path": "util_math.py", "content": "x = 1"})];
        let canon = canonicalize_manifest(&files);
        assert_eq!(canon[0]["path"], "src/utils/util_math.py");
        assert_eq!(canon[0]["content"], "x = 1");
    }
}
