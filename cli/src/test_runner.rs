use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use fence::IdScheme;
use highlighter::{ClientConfig, HighlightClient, Highlighter, ReplayTransport};

/// Scripted service answer for one fixture.
#[derive(Debug, Deserialize)]
pub struct FixtureReply {
    #[serde(default = "default_status")]
    pub status: u16,

    /// Fragments returned as `{ "blocks": [...] }`, in this order.
    #[serde(default)]
    pub blocks: Vec<ReplyBlock>,

    /// Verbatim response body; takes precedence over `blocks`.
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyBlock {
    pub id: String,
    pub wrapped: String,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct SentBlock {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Human-readable fixture description.
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub reply: Option<FixtureReply>,

    /// Simulate a failed exchange with this message instead of replying.
    #[serde(default)]
    pub transport_error: Option<String>,

    #[serde(default)]
    pub theme: Option<String>,

    #[serde(default)]
    pub max_blocks: Option<NonZeroUsize>,

    /// Expected HTML (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// Expected number of requests made to the service.
    #[serde(default)]
    pub expect_requests: Option<usize>,

    /// Expected blocks in the (single) request, in order.
    #[serde(default)]
    pub expect_sent: Option<Vec<SentBlock>>,
}

fn default_status() -> u16 {
    200
}

/// Split a `.test.md` file into its TOML front matter and Markdown body.
fn split_fixture(content: &str) -> Result<(Fixture, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let rest = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
        .ok_or("missing opening --- front matter delimiter")?;

    let close = rest
        .find("\n---")
        .ok_or("missing closing --- front matter delimiter")?;
    let front = rest[..close].trim_end_matches('\r');
    let after = &rest[close + 4..];
    let body = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    let fixture: Fixture =
        toml::from_str(front).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((fixture, body))
}

fn transport_for(fixture: &Fixture) -> ReplayTransport {
    if let Some(message) = &fixture.transport_error {
        return ReplayTransport::fail(message.clone());
    }
    match &fixture.reply {
        Some(reply) => {
            let body = reply.raw.clone().unwrap_or_else(|| {
                let blocks: Vec<_> = reply
                    .blocks
                    .iter()
                    .map(|b| json!({ "id": b.id, "wrapped": b.wrapped }))
                    .collect();
                json!({ "blocks": blocks }).to_string()
            });
            ReplayTransport::respond(reply.status, body)
        }
        None => ReplayTransport::json(json!({ "blocks": [] })),
    }
}

pub enum Outcome {
    Pass,
    Fail(String),
}

pub struct FixtureResult {
    pub path: PathBuf,
    pub label: String,
    pub outcome: Outcome,
}

fn run_fixture(path: &Path) -> FixtureResult {
    let fallback_label = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".test.md").to_string())
        .unwrap_or_else(|| "?".to_string());
    let fail = |label: String, reason: String| FixtureResult {
        path: path.to_path_buf(),
        label,
        outcome: Outcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(fallback_label, format!("cannot read file: {}", e)),
    };
    let (fixture, markdown) = match split_fixture(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(fallback_label, format!("front matter error: {}", e)),
    };
    let label = fixture.description.clone().unwrap_or(fallback_label);

    log::debug!("running fixture {}", path.display());
    let outcome = match check_fixture(&fixture, markdown) {
        Ok(()) => Outcome::Pass,
        Err(reason) => Outcome::Fail(reason),
    };
    FixtureResult {
        path: path.to_path_buf(),
        label,
        outcome,
    }
}

/// Render `markdown` against the fixture's scripted service and compare.
fn check_fixture(fixture: &Fixture, markdown: &str) -> Result<(), String> {
    let transport = Arc::new(transport_for(fixture));

    let mut config = ClientConfig::new("https://fixture.invalid").with_ids(IdScheme::sequential());
    config.theme = fixture.theme.clone();
    config.max_blocks = fixture.max_blocks;

    let highlighter = Highlighter::new(HighlightClient::with_transport(config, Arc::clone(&transport)));
    let html = highlighter.render(markdown);

    if let Some(expected) = &fixture.expect_output {
        let (expected, actual) = (expected.trim(), html.trim());
        if expected != actual {
            return Err(format!(
                "output mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(expected),
                indent(actual)
            ));
        }
    }

    let requests = transport.requests();
    if let Some(expected) = fixture.expect_requests {
        if requests.len() != expected {
            return Err(format!(
                "expected {} request(s), got {}",
                expected,
                requests.len()
            ));
        }
    }

    if let Some(expected) = &fixture.expect_sent {
        let Some(first) = requests.first() else {
            return Err("expected a request, but none was sent".into());
        };
        let sent: Vec<SentBlock> = serde_json::from_value(first.json()["blocks"].clone())
            .map_err(|e| format!("cannot read sent blocks: {}", e))?;
        if &sent != expected {
            return Err(format!(
                "sent blocks mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, sent
            ));
        }
    }

    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `.test.md` files under `root`, grouped by their directory relative to it.
fn discover(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for path in entries.flatten().map(|e| e.path()) {
            if path.is_dir() {
                dirs.push(path);
            } else if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".test.md"))
            {
                let category = dir
                    .strip_prefix(root)
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                found.entry(category).or_default().push(path);
            }
        }
    }
    for files in found.values_mut() {
        files.sort();
    }
    found
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Run every fixture under `path` (or the single file `path`), optionally
/// limited to `categories`. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected: BTreeMap<String, Vec<PathBuf>> = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        let all = discover(path);
        if categories.is_empty() {
            all
        } else {
            all.into_iter()
                .filter(|(cat, _)| {
                    categories.iter().any(|req| {
                        let req = req.trim_matches('/');
                        cat == req || cat.starts_with(&format!("{}/", req))
                    })
                })
                .collect()
        }
    };

    if selected.is_empty() {
        eprintln!("no matching .test.md files in {}", path.display());
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<FixtureResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            let header = if category.is_empty() { "(root)" } else { category.as_str() };
            eprintln!();
            eprintln!("{}", paint(header, "1", no_color));
        }
        for file in files {
            let result = run_fixture(file);
            match result.outcome {
                Outcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), result.label);
                }
                Outcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), result.label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let Outcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", paint("ok", "32", no_color), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}
