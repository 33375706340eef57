//! Schema validation for case definitions.
//!
//! Case documents are validated as untyped JSON trees before they are
//! deserialized into [`EvalCase`](super::EvalCase). The validator never stops
//! at the first problem: every violated field path in a document is reported,
//! so a case author sees the full list in one attempt.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::FieldError;

const CASE_KEYS: &[&str] = &["name", "tags", "input", "expected", "cleanup"];
const INPUT_KEYS: &[&str] = &["prompt", "docLink", "skillFiles"];
const EXPECTED_KEYS: &[&str] = &["syntax", "semantic", "execution", "result"];
const SYNTAX_KEYS: &[&str] = &["isValidJS", "hasAsyncAwait"];
const SEMANTIC_KEYS: &[&str] = &["mustContain", "mustNotContain"];
const EXECUTION_KEYS: &[&str] = &["shouldSucceed"];
const RESULT_KEYS: &[&str] = &["searchIndexExists"];
const SEARCH_INDEX_KEYS: &[&str] = &["database", "collection", "indexName", "config"];
const CLEANUP_KEYS: &[&str] = &["dropSearchIndex"];
const INDEX_REF_KEYS: &[&str] = &["database", "collection", "indexName"];
const PATTERN_KEYS: &[&str] = &["pattern", "name"];

/// Collects schema violations for the case documents of one file.
pub struct CaseSchemaValidator {
    file: String,
    errors: Vec<FieldError>,
}

impl CaseSchemaValidator {
    /// Create a validator that attributes errors to `file`.
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            errors: Vec::new(),
        }
    }

    /// Validate a whole document: either a single case or a list of cases.
    pub fn validate_document(&mut self, document: &Value) {
        match document {
            Value::Array(cases) => {
                if cases.is_empty() {
                    self.add_error("", "case list is empty");
                }
                for (idx, case) in cases.iter().enumerate() {
                    self.validate_case(case, &format!("[{}]", idx));
                }
            }
            other => self.validate_case(other, ""),
        }
    }

    /// Validate a single case object rooted at `path`.
    pub fn validate_case(&mut self, case: &Value, path: &str) {
        let Some(map) = self.object(case, path) else {
            return;
        };
        self.check_keys(map, CASE_KEYS, path);

        self.required_string(map, "name", path);
        self.optional_string_list(map, "tags", path);

        match map.get("input") {
            Some(input) => self.validate_input(input, &join(path, "input")),
            None => self.add_error(&join(path, "input"), "required field is missing"),
        }

        if let Some(expected) = map.get("expected") {
            self.validate_expected(expected, &join(path, "expected"));
        }

        if let Some(cleanup) = map.get("cleanup") {
            let cleanup_path = join(path, "cleanup");
            if let Some(cleanup_map) = self.object(cleanup, &cleanup_path) {
                self.check_keys(cleanup_map, CLEANUP_KEYS, &cleanup_path);
                if let Some(target) = cleanup_map.get("dropSearchIndex") {
                    self.validate_index_ref(
                        target,
                        &join(&cleanup_path, "dropSearchIndex"),
                        INDEX_REF_KEYS,
                    );
                }
            }
        }
    }

    /// Consume the validator, returning every collected violation.
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    fn validate_input(&mut self, input: &Value, path: &str) {
        let Some(map) = self.object(input, path) else {
            return;
        };
        self.check_keys(map, INPUT_KEYS, path);
        self.required_string(map, "prompt", path);

        if let Some(link) = map.get("docLink") {
            let link_path = join(path, "docLink");
            match link.as_str() {
                Some(url) if is_http_url(url) => {}
                Some(_) => self.add_error(&link_path, "expected an http(s) URL"),
                None => self.add_error(&link_path, "expected a string"),
            }
        }

        if let Some(skills) = map.get("skillFiles") {
            let skills_path = join(path, "skillFiles");
            match skills {
                Value::String(s) if s.trim().is_empty() => {
                    self.add_error(&skills_path, "skill file path must not be empty")
                }
                Value::String(_) => {}
                Value::Array(items) => {
                    for (idx, item) in items.iter().enumerate() {
                        let item_path = format!("{}[{}]", skills_path, idx);
                        match item.as_str() {
                            Some(s) if !s.trim().is_empty() => {}
                            Some(_) => {
                                self.add_error(&item_path, "skill file path must not be empty")
                            }
                            None => self.add_error(&item_path, "expected a string"),
                        }
                    }
                }
                _ => self.add_error(&skills_path, "expected a string or a list of strings"),
            }
        }
    }

    fn validate_expected(&mut self, expected: &Value, path: &str) {
        let Some(map) = self.object(expected, path) else {
            return;
        };
        self.check_keys(map, EXPECTED_KEYS, path);

        if let Some(syntax) = map.get("syntax") {
            let syntax_path = join(path, "syntax");
            if let Some(syntax_map) = self.object(syntax, &syntax_path) {
                self.check_keys(syntax_map, SYNTAX_KEYS, &syntax_path);
                self.optional_bool(syntax_map, "isValidJS", &syntax_path);
                self.optional_bool(syntax_map, "hasAsyncAwait", &syntax_path);
            }
        }

        if let Some(semantic) = map.get("semantic") {
            let semantic_path = join(path, "semantic");
            if let Some(semantic_map) = self.object(semantic, &semantic_path) {
                self.check_keys(semantic_map, SEMANTIC_KEYS, &semantic_path);
                // Pattern names become score names, so they must be unique
                // across both lists.
                let mut seen = HashSet::new();
                for key in ["mustContain", "mustNotContain"] {
                    if let Some(list) = semantic_map.get(key) {
                        self.validate_patterns(list, &join(&semantic_path, key), &mut seen);
                    }
                }
            }
        }

        if let Some(execution) = map.get("execution") {
            let execution_path = join(path, "execution");
            if let Some(execution_map) = self.object(execution, &execution_path) {
                self.check_keys(execution_map, EXECUTION_KEYS, &execution_path);
                self.optional_bool(execution_map, "shouldSucceed", &execution_path);
            }
        }

        if let Some(result) = map.get("result") {
            let result_path = join(path, "result");
            if let Some(result_map) = self.object(result, &result_path) {
                self.check_keys(result_map, RESULT_KEYS, &result_path);
                if let Some(index) = result_map.get("searchIndexExists") {
                    let index_path = join(&result_path, "searchIndexExists");
                    self.validate_index_ref(index, &index_path, SEARCH_INDEX_KEYS);
                    if let Some(config) = index.get("config") {
                        self.validate_config(config, &join(&index_path, "config"));
                    }
                }
            }
        }
    }

    fn validate_patterns<'a>(&mut self, list: &'a Value, path: &str, seen: &mut HashSet<&'a str>) {
        let Some(items) = list.as_array() else {
            self.add_error(path, "expected a list of {pattern, name} entries");
            return;
        };

        for (idx, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, idx);
            let Some(map) = self.object(item, &item_path) else {
                continue;
            };
            self.check_keys(map, PATTERN_KEYS, &item_path);
            self.required_string(map, "pattern", &item_path);
            if let Some(name) = self.required_string(map, "name", &item_path) {
                if !seen.insert(name) {
                    self.add_error(
                        &join(&item_path, "name"),
                        format!("duplicate pattern name '{}'", name),
                    );
                }
            }
        }
    }

    fn validate_index_ref(&mut self, value: &Value, path: &str, allowed: &[&str]) {
        let Some(map) = self.object(value, path) else {
            return;
        };
        self.check_keys(map, allowed, path);
        for key in INDEX_REF_KEYS {
            self.required_string(map, key, path);
        }
    }

    fn validate_config(&mut self, config: &Value, path: &str) {
        let Some(map) = self.object(config, path) else {
            return;
        };
        for key in map.keys() {
            if key.is_empty() || key.split('.').any(str::is_empty) {
                self.add_error(
                    &join(path, key),
                    "config keys must be non-empty dot paths",
                );
            }
        }
    }

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value.as_object() {
            Some(map) => Some(map),
            None => {
                self.add_error(path, format!("expected an object, found {}", type_name(value)));
                None
            }
        }
    }

    fn check_keys(&mut self, map: &Map<String, Value>, allowed: &[&str], path: &str) {
        for key in map.keys() {
            if !allowed.contains(&key.as_str()) {
                self.add_error(
                    &join(path, key),
                    format!("unknown field (expected one of: {})", allowed.join(", ")),
                );
            }
        }
    }

    fn required_string<'a>(
        &mut self,
        map: &'a Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Option<&'a str> {
        let field_path = join(path, key);
        match map.get(key) {
            None => {
                self.add_error(&field_path, "required field is missing");
                None
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.add_error(&field_path, "must not be empty");
                None
            }
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                self.add_error(
                    &field_path,
                    format!("expected a string, found {}", type_name(other)),
                );
                None
            }
        }
    }

    fn optional_bool(&mut self, map: &Map<String, Value>, key: &str, path: &str) {
        if let Some(value) = map.get(key) {
            if !value.is_boolean() {
                self.add_error(
                    &join(path, key),
                    format!("expected a boolean, found {}", type_name(value)),
                );
            }
        }
    }

    fn optional_string_list(&mut self, map: &Map<String, Value>, key: &str, path: &str) {
        let Some(value) = map.get(key) else {
            return;
        };
        let field_path = join(path, key);
        match value.as_array() {
            Some(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        self.add_error(
                            &format!("{}[{}]", field_path, idx),
                            format!("expected a string, found {}", type_name(item)),
                        );
                    }
                }
            }
            None => self.add_error(
                &field_path,
                format!("expected a list of strings, found {}", type_name(value)),
            ),
        }
    }

    fn add_error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            file: self.file.clone(),
            path: if path.is_empty() {
                "<root>".to_string()
            } else {
                path.to_string()
            },
            message: message.into(),
        });
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn is_http_url(candidate: &str) -> bool {
    reqwest::Url::parse(candidate)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
        .unwrap_or(false)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
