//! Sandbox tests against a real Node.js runtime and MongoDB deployment.
//!
//! Requires `node` on PATH, the `mongodb` npm package and a reachable server.
//! Run with:
//!   MONGODB_URI=mongodb://localhost:27017 SKILL_EVAL_NODE_MODULES=./node_modules \
//!     cargo test --test sandbox_node -- --ignored

use std::time::Duration;

use serde_json::json;
use skill_eval::runner::{CodeExecutor, NodeSandbox, NodeSyntaxChecker, SandboxConfig, SyntaxChecker};

fn sandbox() -> NodeSandbox {
    let uri = std::env::var("MONGODB_URI")
        .expect("MONGODB_URI environment variable must be set for sandbox tests");
    let mut config = SandboxConfig::new(uri).with_kill_grace(Duration::from_secs(1));
    if let Ok(modules) = std::env::var("SKILL_EVAL_NODE_MODULES") {
        config = config.with_node_modules(modules);
    }
    NodeSandbox::new(config)
}

#[tokio::test]
#[ignore]
async fn test_returns_snippet_value() {
    let result = sandbox()
        .execute("const r = await client.db('admin').command({ ping: 1 });\nreturn r.ok;", Duration::from_secs(10))
        .await;
    assert!(result.success, "execution failed: {:?}", result.error);
    assert_eq!(result.output, Some(json!(1)));
}

#[tokio::test]
#[ignore]
async fn test_trailing_call_is_awaited() {
    let code = "async function main() {\n  await new Promise((r) => setTimeout(r, 50));\n  console.log('done');\n}\nmain();";
    let result = sandbox().execute(code, Duration::from_secs(10)).await;
    assert!(result.success, "execution failed: {:?}", result.error);
    assert!(result.logs.iter().any(|l| l == "[log] done"), "logs: {:?}", result.logs);
}

#[tokio::test]
#[ignore]
async fn test_denied_capabilities() {
    for code in ["process.exit(1);", "require('fs').readFileSync('/etc/passwd');"] {
        let result = sandbox().execute(code, Duration::from_secs(10)).await;
        assert!(!result.success);
        let error = result.error.unwrap_or_default();
        assert!(error.contains("Capability not permitted"), "{}: {}", code, error);
    }
}

#[tokio::test]
#[ignore]
async fn test_hanging_code_times_out() {
    let result = sandbox()
        .execute("await new Promise(() => {});", Duration::from_millis(500))
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap_or_default().contains("timed out"));
}

#[tokio::test]
#[ignore]
async fn test_node_syntax_check() {
    let checker = NodeSyntaxChecker::default();
    assert!(checker.check("async function f() { await g(); }").await.is_valid());
    assert!(!checker.check("function (").await.is_valid());
}
