use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use fix_oracle::{FixOracle, OracleError, Turn};
use patch_engine::{DriverStrategy, EngineConfig, FileStatus, Finding, UnitState, remediate};
use serde_json::json;

/// Answers every request with `reply(prompt)`, counting calls.
struct ScriptedOracle<F> {
    reply: F,
    calls: Arc<AtomicU32>,
}

impl<F> ScriptedOracle<F> {
    fn new(reply: F) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        (
            Self {
                reply,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<F> FixOracle for ScriptedOracle<F>
where
    F: Fn(&str) -> String + Send + Sync,
{
    async fn complete(&self, turns: &[Turn]) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = turns.last().map(|t| t.content.as_str()).unwrap_or_default();
        Ok((self.reply)(prompt))
    }
}

/// Code of the first fenced block in a prompt.
fn code_of(prompt: &str) -> &str {
    let open = prompt.find("```").expect("prompt has a code block");
    let body = &prompt[open..];
    let body = &body[body.find('\n').expect("fence line") + 1..];
    &body[..body.find("\n```").expect("closing fence")]
}

fn fenced(code: &str) -> String {
    format!("Here is the fix:\n```javascript\n{code}\n```\n")
}

fn finding(path: &str, start: usize, end: usize) -> Finding {
    serde_json::from_value(json!({
        "filePath": path,
        "startLine": start,
        "endLine": end,
        "ruleId": "no-eval",
        "severity": "high",
        "message": "eval() executes arbitrary code",
        "metadata": { "cwe": ["CWE-95"] }
    }))
    .unwrap()
}

fn config(root: &Path, strategy: DriverStrategy) -> EngineConfig {
    EngineConfig {
        repo_root: root.to_path_buf(),
        strategy,
        ..EngineConfig::default()
    }
}

fn replace_eval(prompt: &str) -> String {
    fenced(&code_of(prompt).replace("eval(x)", "JSON.parse(x)"))
}

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, text).unwrap();
    path
}

fn function(name: &str, lines: usize, eval_at: Option<usize>) -> String {
    let mut out = format!("function {name}() {{\n");
    for i in 2..lines {
        if Some(i) == eval_at {
            out.push_str("  eval(x);\n");
        } else {
            out.push_str("  run();\n");
        }
    }
    out.push_str("}\n");
    out
}

#[tokio::test]
async fn chunk_growth_shifts_following_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let source = [
        function("one", 40, Some(2)),
        function("two", 120, Some(60)),
        function("three", 30, None),
    ]
    .concat();
    let path = write(dir.path(), "src/big.js", &source);

    let (oracle, calls) = ScriptedOracle::new(|prompt: &str| {
        let code = code_of(prompt);
        if code.starts_with("function one") {
            fenced(&function("one", 50, None).trim_end().replace("run()", "safe()"))
        } else {
            fenced(&code.replace("eval(x)", "JSON.parse(x)"))
        }
    });
    let cfg = EngineConfig {
        chunk_target_lines: 100,
        ..config(dir.path(), DriverStrategy::Chunk)
    };
    let findings = [finding("src/big.js", 2, 2), finding("src/big.js", 60, 60)];
    let report = remediate(cfg, oracle, &findings).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let file = &report.files[0];
    assert_eq!(file.status, FileStatus::Completed);
    let spans: Vec<_> = file.units.iter().map(|u| (u.start_line, u.end_line)).collect();
    assert_eq!(spans, vec![(1, 40), (51, 170)]);

    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 200);
    assert_eq!(lines[50], "function two() {");
    assert_eq!(lines[170], "function three() {");
    assert!(!text.contains("eval("));
    assert!(report.changed_files.contains(Path::new("src/big.js")));
}

#[tokio::test]
async fn always_malformed_oracle_hits_retry_ceiling_and_keeps_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = "const a = 1;\nlet b = eval(x);\nconst c = 3;\n";
    let path = write(dir.path(), "a.js", source);

    let (oracle, calls) = ScriptedOracle::new(|_: &str| "I cannot help with that.".to_string());
    let cfg = EngineConfig {
        max_attempts: 3,
        ..config(dir.path(), DriverStrategy::Window)
    };
    let report = remediate(cfg, oracle, &[finding("a.js", 2, 2)]).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(std::fs::read_to_string(path).unwrap(), source);
    let file = &report.files[0];
    assert_eq!(file.status, FileStatus::Unresolved);
    assert_eq!(file.attempts_used, 3);
    assert_eq!(file.units[0].state, UnitState::Abandoned);
    assert!(
        file.units[0]
            .error
            .as_deref()
            .unwrap()
            .starts_with("retry limit reached after 3")
    );
    assert!(report.changed_files.is_empty());
}

#[tokio::test]
async fn window_patch_touches_only_requested_lines() {
    let dir = tempfile::tempdir().unwrap();
    let source = "const a = 1;\r\nlet b = eval(x);\r\nconst c = 3;\r\nconst d = 4;";
    let path = write(dir.path(), "w.js", source);

    // Rewrites the context lines too; only line 2 may land in the file.
    let (oracle, _) = ScriptedOracle::new(|prompt: &str| {
        fenced(
            &code_of(prompt)
                .replace("eval(x)", "JSON.parse(x)")
                .replace("const", "var"),
        )
    });
    let cfg = EngineConfig {
        window_margin: 1,
        ..config(dir.path(), DriverStrategy::Window)
    };
    let report = remediate(cfg, oracle, &[finding("w.js", 2, 2)]).await.unwrap();

    assert_eq!(report.files[0].status, FileStatus::Completed);
    assert_eq!(report.files[0].units[0].unit, "window 1-3");
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "const a = 1;\r\nlet b = JSON.parse(x);\r\nconst c = 3;\r\nconst d = 4;"
    );
}

#[tokio::test]
async fn window_reply_with_wrong_line_count_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "r.js", "let a = 1;\nlet b = eval(x);\nlet c = 3;\n");

    let (oracle, calls) = ScriptedOracle::new({
        let seen = AtomicU32::new(0);
        move |prompt: &str| {
            let code = code_of(prompt).replace("eval(x)", "JSON.parse(x)");
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                fenced(&format!("{code}\nlet extra = 1;"))
            } else {
                fenced(&code)
            }
        }
    });
    let cfg = config(dir.path(), DriverStrategy::Window);
    let report = remediate(cfg, oracle, &[finding("r.js", 2, 2)]).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.files[0].units[0].attempts, 2);
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "let a = 1;\nlet b = JSON.parse(x);\nlet c = 3;\n"
    );
}

#[tokio::test]
async fn node_driver_replaces_class_method() {
    let dir = tempfile::tempdir().unwrap();
    let source = concat!(
        "class Store {\n",
        "  load(raw) {\n",
        "    return eval(raw);\n",
        "  }\n",
        "\n",
        "  size() {\n",
        "    return 1;\n",
        "  }\n",
        "}\n",
    );
    let path = write(dir.path(), "store.js", source);

    let (oracle, _) = ScriptedOracle::new(|prompt: &str| {
        assert!(prompt.contains("`method_definition`"));
        assert!(code_of(prompt).starts_with("  load(raw) {"));
        fenced("  load(raw) {\n    return JSON.parse(raw);\n  }")
    });
    let cfg = EngineConfig {
        min_node_span_lines: 2,
        ..config(dir.path(), DriverStrategy::Node)
    };
    let report = remediate(cfg, oracle, &[finding("store.js", 3, 3)]).await.unwrap();

    assert_eq!(report.files[0].status, FileStatus::Completed);
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        source.replace("eval(raw)", "JSON.parse(raw)")
    );
}

#[tokio::test]
async fn node_driver_rebases_dedented_python_reply() {
    let dir = tempfile::tempdir().unwrap();
    let source = concat!(
        "class A:\n",
        "    def f(self, z):\n",
        "        if z:\n",
        "            y = eval(z)\n",
        "        return 1\n",
    );
    let path = write(dir.path(), "svc.py", source);

    // Answers with the construct dedented to column 0.
    let (oracle, calls) = ScriptedOracle::new(|prompt: &str| {
        assert!(prompt.contains("`if_statement`"));
        "```python\nif z:\n    y = ast.literal_eval(z)\n```\n".to_string()
    });
    let cfg = EngineConfig {
        min_node_span_lines: 2,
        ..config(dir.path(), DriverStrategy::Node)
    };
    let report = remediate(cfg, oracle, &[finding("svc.py", 4, 4)]).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.files[0].status, FileStatus::Completed);
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        source.replace("eval(z)", "ast.literal_eval(z)")
    );
}

#[tokio::test]
async fn node_reply_that_breaks_the_file_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let source = concat!(
        "struct Loader;\n",
        "\n",
        "impl Loader {\n",
        "    fn load(&self, raw: &str) -> i32 {\n",
        "        unsafe_parse(raw)\n",
        "    }\n",
        "}\n",
    );
    let path = write(dir.path(), "loader.rs", source);

    // An expression statement parses on its own but not inside an impl block.
    let (oracle, calls) = ScriptedOracle::new(|_: &str| fenced("safe_parse(raw);"));
    let cfg = EngineConfig {
        min_node_span_lines: 2,
        max_attempts: 2,
        ..config(dir.path(), DriverStrategy::Node)
    };
    let report = remediate(cfg, oracle, &[finding("loader.rs", 5, 5)]).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let file = &report.files[0];
    assert_eq!(file.status, FileStatus::Unresolved);
    assert_eq!(file.units[0].state, UnitState::Abandoned);
    assert_eq!(std::fs::read_to_string(path).unwrap(), source);
    assert!(report.changed_files.is_empty());
}

#[tokio::test]
async fn node_driver_skips_unparseable_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = "function broken( {\n  eval(x);\n";
    let path = write(dir.path(), "broken.js", source);

    let (oracle, calls) = ScriptedOracle::new(|_: &str| fenced("unused"));
    let cfg = config(dir.path(), DriverStrategy::Node);
    let report = remediate(cfg, oracle, &[finding("broken.js", 2, 2)]).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let file = &report.files[0];
    assert_eq!(file.status, FileStatus::Skipped);
    assert!(file.reason.is_some());
    assert_eq!(file.unresolved_finding_count, 1);
    assert_eq!(std::fs::read_to_string(path).unwrap(), source);
}

#[tokio::test]
async fn missing_file_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "src/app.js", "let a = eval(x);\n");

    let (oracle, _) = ScriptedOracle::new(replace_eval);
    let report_path = dir.path().join("out/report.json");
    let cfg = EngineConfig {
        report_path: Some(report_path.clone()),
        ..config(dir.path(), DriverStrategy::Auto)
    };
    let report = remediate(
        cfg,
        oracle,
        &[finding("/src/missing.js", 1, 1), finding("./src/app.js", 1, 1)],
    )
    .await
    .unwrap();

    let statuses: Vec<_> = report
        .files
        .iter()
        .map(|f| (f.file_path.clone(), f.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (PathBuf::from("src/app.js"), FileStatus::Completed),
            (PathBuf::from("src/missing.js"), FileStatus::Failed),
        ]
    );
    let changed: Vec<_> = report.changed_files.iter().collect();
    assert_eq!(changed, vec![Path::new("src/app.js")]);

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(report_path).unwrap()).unwrap();
    assert_eq!(written["changedFiles"], json!(["src/app.js"]));
    assert_eq!(written["files"][1]["status"], "failed");
}

#[tokio::test]
async fn finished_files_are_skipped_on_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.js", "let a = eval(x);\n");
    let state = dir.path().join("state.json");
    let cfg = EngineConfig {
        state_file: Some(state.clone()),
        ..config(dir.path(), DriverStrategy::Window)
    };
    let findings = [finding("a.js", 1, 1)];

    let (oracle, calls) = ScriptedOracle::new(replace_eval);
    let first = remediate(cfg.clone(), oracle, &findings).await.unwrap();
    assert_eq!(first.files[0].status, FileStatus::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(state.exists());

    let (oracle, calls) = ScriptedOracle::new(|_: &str| fenced("unused"));
    let second = remediate(cfg, oracle, &findings).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.files[0].status, FileStatus::Skipped);
    assert!(second.changed_files.is_empty());
}

#[tokio::test]
async fn finding_outside_the_repo_root_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("repo");
    write(&root, "in.js", "let a = eval(x);\n");
    let outside = write(dir.path(), "outside.js", "let a = eval(x);\n");

    let (oracle, calls) = ScriptedOracle::new(replace_eval);
    let findings = [finding("../outside.js", 1, 1), finding("in.js", 1, 1)];
    let report = remediate(config(&root, DriverStrategy::Window), oracle, &findings)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read_to_string(outside).unwrap(), "let a = eval(x);\n");
    let escaped = report
        .files
        .iter()
        .find(|f| f.file_path == Path::new("../outside.js"))
        .unwrap();
    assert_eq!(escaped.status, FileStatus::Failed);
    assert!(escaped.reason.as_deref().unwrap().contains("outside the repository root"));
    let changed: Vec<_> = report.changed_files.iter().collect();
    assert_eq!(changed, vec![Path::new("in.js")]);
}
