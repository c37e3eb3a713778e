//! Pandoc JSON filter: swaps math elements for pre-rendered HTML.
//!
//! The document is treated as opaque JSON. Any object of the form
//! `{"t": "Math", "c": [{"t": "InlineMath" | "DisplayMath"}, "<tex>"]}` is a
//! math element; rendered ones become `{"t": "RawInline", "c": ["html", ...]}`
//! and the rest are left as they were.
//!
//! Math elements are collected in document order, rendered (optionally with
//! bounded concurrency), then substituted in a second pass over the same
//! order.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::client::{ClientError, MathRenderer};
use crate::protocol::MathMode;

/// Errors that stop a filter run.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed to parse document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("render aborted: {0}")]
    Render(#[from] ClientError),

    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Counts from one filter run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterReport {
    /// Math elements found in the document.
    pub found: usize,
    /// Math elements replaced with HTML.
    pub rendered: usize,
}

impl FilterReport {
    /// Math elements left unrendered.
    pub fn skipped(&self) -> usize {
        self.found - self.rendered
    }
}

/// A math element as found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathNode {
    pub mode: MathMode,
    pub tex: String,
}

/// Recognise a Pandoc math element.
pub fn math_node(value: &Value) -> Option<MathNode> {
    if value.get("t")?.as_str()? != "Math" {
        return None;
    }
    let content = value.get("c")?.as_array()?;
    if content.len() < 2 {
        return None;
    }
    let display = content[0].get("t").and_then(Value::as_str) == Some("DisplayMath");
    let tex = content[1].as_str()?;
    Some(MathNode {
        mode: MathMode::from_display(display),
        tex: tex.to_string(),
    })
}

/// The raw HTML element that replaces a rendered math element.
pub fn raw_html(html: &str) -> Value {
    json!({ "t": "RawInline", "c": ["html", html] })
}

/// Collect every math element in document order.
pub fn collect_math(doc: &Value) -> Vec<MathNode> {
    let mut nodes = Vec::new();
    collect_into(doc, &mut nodes);
    nodes
}

fn collect_into(value: &Value, nodes: &mut Vec<MathNode>) {
    if let Some(node) = math_node(value) {
        nodes.push(node);
        return;
    }
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_into(item, nodes)),
        Value::Object(map) => map.values().for_each(|item| collect_into(item, nodes)),
        _ => {}
    }
}

/// Replace math elements with the matching entry of `rendered`, in the
/// order [`collect_math`] produced them. `None` entries are left untouched.
pub fn substitute_math(doc: &mut Value, rendered: &[Option<String>]) -> usize {
    let mut results = rendered.iter();
    let mut replaced = 0;
    substitute_into(doc, &mut results, &mut replaced);
    replaced
}

fn substitute_into<'a>(
    value: &mut Value,
    results: &mut impl Iterator<Item = &'a Option<String>>,
    replaced: &mut usize,
) {
    if math_node(value).is_some() {
        if let Some(Some(html)) = results.next() {
            *value = raw_html(html);
            *replaced += 1;
        }
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                substitute_into(item, results, replaced);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                substitute_into(item, results, replaced);
            }
        }
        _ => {}
    }
}

/// Render every node, at most `concurrency` at a time, keeping input order.
pub async fn render_all(
    nodes: Vec<MathNode>,
    renderer: Arc<dyn MathRenderer>,
    concurrency: usize,
) -> Result<Vec<Option<String>>, FilterError> {
    let mut results = vec![None; nodes.len()];

    if concurrency <= 1 {
        for (slot, node) in results.iter_mut().zip(&nodes) {
            *slot = renderer.render_math(&node.tex, node.mode).await?;
        }
        return Ok(results);
    }

    let permits = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();
    for (index, node) in nodes.into_iter().enumerate() {
        let renderer = Arc::clone(&renderer);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let html = renderer.render_math(&node.tex, node.mode).await;
            (index, html)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (index, html) = joined?;
        results[index] = html?;
    }
    Ok(results)
}

/// Render all math elements of `doc` in place.
pub async fn filter_document(
    doc: &mut Value,
    renderer: Arc<dyn MathRenderer>,
    concurrency: usize,
) -> Result<FilterReport, FilterError> {
    let nodes = collect_math(doc);
    let found = nodes.len();
    debug!(found, concurrency, "Collected math elements");

    let rendered = render_all(nodes, renderer, concurrency).await?;
    let rendered = substitute_math(doc, &rendered);
    Ok(FilterReport { found, rendered })
}

/// Read a Pandoc JSON document from `input`, filter it, write it to `output`.
pub async fn run_filter<R, W>(
    mut input: R,
    mut output: W,
    renderer: Arc<dyn MathRenderer>,
    concurrency: usize,
) -> Result<FilterReport, FilterError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    input.read_to_end(&mut raw).await?;
    let mut doc: Value = serde_json::from_slice(&raw)?;

    let report = filter_document(&mut doc, renderer, concurrency).await?;

    output.write_all(&serde_json::to_vec(&doc)?).await?;
    output.flush().await?;

    debug!(
        found = report.found,
        rendered = report.rendered,
        skipped = report.skipped(),
        "Filtered document"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoxFuture;
    use pretty_assertions::assert_eq;

    /// Wraps `tex` in `<span>` or `<div>`; anything containing "bad" stays
    /// unrendered.
    struct FakeRenderer;

    impl MathRenderer for FakeRenderer {
        fn render_math<'a>(
            &'a self,
            tex: &'a str,
            mode: MathMode,
        ) -> BoxFuture<'a, Result<Option<String>, ClientError>> {
            Box::pin(async move {
                if tex.contains("bad") {
                    return Ok(None);
                }
                let tag = if mode.is_display() { "div" } else { "span" };
                Ok(Some(format!("<{tag}>{tex}</{tag}>")))
            })
        }
    }

    struct AbortingRenderer;

    impl MathRenderer for AbortingRenderer {
        fn render_math<'a>(
            &'a self,
            _tex: &'a str,
            _mode: MathMode,
        ) -> BoxFuture<'a, Result<Option<String>, ClientError>> {
            Box::pin(async {
                Err(ClientError::Connect {
                    endpoint: "localhost:7000".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
                })
            })
        }
    }

    fn math(kind: &str, tex: &str) -> Value {
        json!({ "t": "Math", "c": [{ "t": kind }, tex] })
    }

    fn sample_doc() -> Value {
        json!({
            "pandoc-api-version": [1, 23],
            "meta": {},
            "blocks": [
                { "t": "Para", "c": [
                    { "t": "Str", "c": "Area:" },
                    math("InlineMath", "x^2"),
                    math("InlineMath", "bad{"),
                ]},
                { "t": "Para", "c": [ math("DisplayMath", "\\frac{1}{2}") ] },
            ]
        })
    }

    #[test]
    fn test_math_node_inline_and_display() {
        assert_eq!(
            math_node(&math("InlineMath", "a")),
            Some(MathNode {
                mode: MathMode::Inline,
                tex: "a".to_string()
            })
        );
        assert_eq!(
            math_node(&math("DisplayMath", "b")).map(|n| n.mode),
            Some(MathMode::Display)
        );
    }

    #[test]
    fn test_math_node_ignores_other_elements() {
        assert_eq!(math_node(&json!({ "t": "Str", "c": "x" })), None);
        assert_eq!(math_node(&json!({ "t": "Math", "c": [{ "t": "InlineMath" }] })), None);
        assert_eq!(math_node(&json!("Math")), None);
    }

    #[test]
    fn test_collect_in_document_order() {
        let nodes = collect_math(&sample_doc());
        let texs: Vec<_> = nodes.iter().map(|n| n.tex.as_str()).collect();
        assert_eq!(texs, vec!["x^2", "bad{", "\\frac{1}{2}"]);
    }

    #[test]
    fn test_substitute_leaves_none_untouched() {
        let mut doc = json!([math("InlineMath", "a"), math("InlineMath", "b")]);
        let replaced = substitute_math(&mut doc, &[None, Some("<i>b</i>".to_string())]);
        assert_eq!(replaced, 1);
        assert_eq!(doc, json!([math("InlineMath", "a"), raw_html("<i>b</i>")]));
    }

    #[tokio::test]
    async fn test_filter_document_sequential() {
        let mut doc = sample_doc();
        let report = filter_document(&mut doc, Arc::new(FakeRenderer), 1)
            .await
            .unwrap();

        assert_eq!(report, FilterReport { found: 3, rendered: 2 });
        assert_eq!(report.skipped(), 1);
        assert_eq!(doc["blocks"][0]["c"][1], raw_html("<span>x^2</span>"));
        assert_eq!(doc["blocks"][0]["c"][2], math("InlineMath", "bad{"));
        assert_eq!(doc["blocks"][1]["c"][0], raw_html("<div>\\frac{1}{2}</div>"));
    }

    #[tokio::test]
    async fn test_filter_document_concurrent_keeps_order() {
        let mut sequential = sample_doc();
        filter_document(&mut sequential, Arc::new(FakeRenderer), 1)
            .await
            .unwrap();

        let mut concurrent = sample_doc();
        filter_document(&mut concurrent, Arc::new(FakeRenderer), 4)
            .await
            .unwrap();

        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_filter_document_aborts() {
        let mut doc = sample_doc();
        let result = filter_document(&mut doc, Arc::new(AbortingRenderer), 1).await;
        assert!(matches!(result, Err(FilterError::Render(_))));

        let result = filter_document(&mut doc, Arc::new(AbortingRenderer), 3).await;
        assert!(matches!(result, Err(FilterError::Render(_))));
    }

    #[tokio::test]
    async fn test_run_filter_round_trip() {
        let input = serde_json::to_vec(&sample_doc()).unwrap();
        let mut output = Vec::new();

        let report = run_filter(&input[..], &mut output, Arc::new(FakeRenderer), 1)
            .await
            .unwrap();
        assert_eq!(report.rendered, 2);

        let doc: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(doc["pandoc-api-version"], json!([1, 23]));
        assert_eq!(doc["blocks"][0]["c"][0], json!({ "t": "Str", "c": "Area:" }));
    }

    #[tokio::test]
    async fn test_run_filter_rejects_invalid_json() {
        let mut output = Vec::new();
        let result = run_filter(&b"{not json"[..], &mut output, Arc::new(FakeRenderer), 1).await;
        assert!(matches!(result, Err(FilterError::Json(_))));
        assert!(output.is_empty());
    }
}
