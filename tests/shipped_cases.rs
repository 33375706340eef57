//! The case files shipped in `cases/` must always load.

use std::path::Path;

use skill_eval::cases::load_cases;

#[test]
fn test_shipped_cases_load() {
    let cases = load_cases(Path::new(env!("CARGO_MANIFEST_DIR")).join("cases").as_path())
        .expect("shipped cases should validate");

    assert!(!cases.is_empty());
    for case in &cases {
        assert!(case.matches_tags(&["atlas-search".to_string()]), "{}", case.name);
        for skill in case.resolved_skill_files() {
            assert!(skill.is_file(), "{}: missing {}", case.name, skill.display());
        }
    }

    let creates: Vec<_> = cases.iter().filter(|c| c.needs_execution()).collect();
    assert_eq!(creates.len(), 3);
    assert!(cases
        .iter()
        .filter(|c| c.expected.result.is_some())
        .all(|c| c.cleanup_target().is_some()));
}
