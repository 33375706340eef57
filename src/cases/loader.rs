//! Loading case files from disk.
//!
//! A case path may be a single file or a directory that is searched
//! recursively. Files are read in sorted path order so case order is stable
//! between runs. Every file is schema-checked first and all violations across
//! all files are reported together.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::schema::CaseSchemaValidator;
use super::types::EvalCase;
use crate::error::{CaseError, FieldError};

const CASE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Load and validate every case reachable from `path`.
pub fn load_cases(path: &Path) -> Result<Vec<EvalCase>, CaseError> {
    if !path.exists() {
        return Err(CaseError::NotFound(path.display().to_string()));
    }

    let files = discover_case_files(path);
    if files.is_empty() {
        return Err(CaseError::NoCases(path.display().to_string()));
    }

    let mut errors = Vec::new();
    let mut cases = Vec::new();

    for file in &files {
        match load_file(file) {
            Ok(mut loaded) => cases.append(&mut loaded),
            Err(mut file_errors) => errors.append(&mut file_errors),
        }
    }

    check_unique_names(&cases, &mut errors);

    if !errors.is_empty() {
        return Err(CaseError::Schema { errors });
    }

    info!(
        cases = cases.len(),
        files = files.len(),
        "Loaded case definitions from {}",
        path.display()
    );
    Ok(cases)
}

/// List case files under `path` in sorted order.
pub fn discover_case_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|p| has_case_extension(p))
        .collect();
    files.sort();
    files
}

fn has_case_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| CASE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Parse, validate and deserialize one file.
fn load_file(path: &Path) -> Result<Vec<EvalCase>, Vec<FieldError>> {
    let file_label = path.display().to_string();
    let document_error = |message: String| {
        vec![FieldError {
            file: file_label.clone(),
            path: "<document>".to_string(),
            message,
        }]
    };

    let content = fs::read_to_string(path).map_err(|e| document_error(e.to_string()))?;
    let document = parse_document(path, &content).map_err(document_error)?;

    let mut validator = CaseSchemaValidator::new(file_label.clone());
    validator.validate_document(&document);
    let errors = validator.into_errors();
    if !errors.is_empty() {
        return Err(errors);
    }

    let source_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let raw_cases = match document {
        Value::Array(items) => items,
        single => vec![single],
    };

    let mut cases = Vec::with_capacity(raw_cases.len());
    for (idx, raw) in raw_cases.into_iter().enumerate() {
        match serde_json::from_value::<EvalCase>(raw) {
            Ok(mut case) => {
                case.source_dir = source_dir.clone();
                cases.push(case);
            }
            Err(e) => {
                return Err(vec![FieldError {
                    file: file_label.clone(),
                    path: format!("[{}]", idx),
                    message: e.to_string(),
                }])
            }
        }
    }

    debug!(file = %file_label, cases = cases.len(), "Parsed case file");
    Ok(cases)
}

fn parse_document(path: &Path, content: &str) -> Result<Value, String> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))
    } else {
        serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {}", e))
    }
}

fn check_unique_names(cases: &[EvalCase], errors: &mut Vec<FieldError>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for case in cases {
        let count = seen.entry(case.name.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            errors.push(FieldError {
                file: case.source_dir.display().to_string(),
                path: "name".to_string(),
                message: format!("duplicate case name '{}'", case.name),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_directory_sorted_and_mixed_formats() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "b.yaml",
            "- name: second\n  input:\n    prompt: two\n- name: third\n  input:\n    prompt: three\n",
        );
        write(
            temp.path(),
            "a.json",
            r#"{"name": "first", "input": {"prompt": "one"}}"#,
        );
        write(temp.path(), "notes.txt", "ignored");

        let cases = load_cases(temp.path()).expect("cases should load");
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(cases[0].source_dir, temp.path());
    }

    #[test]
    fn test_nested_directories_are_searched() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "search/indexes.yml",
            "name: nested\ninput:\n  prompt: p\n",
        );

        let cases = load_cases(temp.path()).expect("cases should load");
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].source_dir, temp.path().join("search"));
    }

    #[test]
    fn test_errors_from_all_files_are_collected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.yaml", "input:\n  prompt: p\n");
        write(temp.path(), "b.yaml", "name: b\ninput: {}\n");
        write(temp.path(), "c.yaml", "name: [unclosed\n");

        let err = load_cases(temp.path()).unwrap_err();
        let CaseError::Schema { errors } = err else {
            panic!("expected schema error");
        };

        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.file.ends_with("a.yaml") && e.path == "name"));
        assert!(errors
            .iter()
            .any(|e| e.file.ends_with("b.yaml") && e.path == "input.prompt"));
        assert!(errors
            .iter()
            .any(|e| e.file.ends_with("c.yaml") && e.path == "<document>"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "a.yaml", "name: same\ninput:\n  prompt: p\n");
        write(temp.path(), "b.yaml", "name: same\ninput:\n  prompt: q\n");

        let err = load_cases(temp.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate case name 'same'"));
    }

    #[test]
    fn test_missing_path_and_empty_dir() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            load_cases(&temp.path().join("missing")),
            Err(CaseError::NotFound(_))
        ));
        assert!(matches!(load_cases(temp.path()), Err(CaseError::NoCases(_))));
    }

    #[test]
    fn test_single_file_path() {
        let temp = TempDir::new().unwrap();
        let file = write(temp.path(), "one.yaml", "name: one\ninput:\n  prompt: p\n");

        let cases = load_cases(&file).expect("case should load");
        assert_eq!(cases.len(), 1);
    }
}
