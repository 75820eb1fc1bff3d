//! Verification agent: grades a draft against the evidence and decides the
//! final answer.

use crate::config::GenerationSettings;
use crate::draft::to_request;
use crate::retry::RetryPolicy;
use docqa_core::AppResult;
use docqa_knowledge::{serialize_fragments, RetrievedFragment};
use docqa_llm::LlmClient;
use docqa_prompt::{build_prompt, PromptDefinition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Answer returned whenever a draft cannot be grounded in the document.
pub const CANONICAL_REFUSAL: &str =
    "Based on the available document, I cannot answer this question.";

/// Whether the evidence supports a draft answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Unsupported,
    PartiallySupported,
}

impl Verdict {
    /// Parse a verdict token; case-insensitive, `-`, `_` or space separated.
    pub fn parse(token: &str) -> Option<Self> {
        let normalized: String = token
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase()
            .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        match normalized.as_str() {
            "supported" => Some(Verdict::Supported),
            "unsupported" | "not_supported" => Some(Verdict::Unsupported),
            "partially_supported" | "partial" => Some(Verdict::PartiallySupported),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Supported => "supported",
            Verdict::Unsupported => "unsupported",
            Verdict::PartiallySupported => "partially_supported",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying one draft.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub verdict: Verdict,
    pub final_answer: String,
}

impl Verification {
    fn refusal() -> Self {
        Self {
            verdict: Verdict::Unsupported,
            final_answer: CANONICAL_REFUSAL.to_string(),
        }
    }
}

pub struct VerifyAgent {
    llm: Arc<dyn LlmClient>,
    prompt: PromptDefinition,
    settings: GenerationSettings,
    retry: RetryPolicy,
}

impl VerifyAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompt: PromptDefinition,
        settings: GenerationSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            llm,
            prompt,
            settings,
            retry,
        }
    }

    /// Check `draft` against `fragments` and apply the verdict policy.
    ///
    /// Empty evidence short-circuits to `Unsupported` without a model call.
    pub async fn verify(
        &self,
        query: &str,
        draft: &str,
        fragments: &[RetrievedFragment],
    ) -> AppResult<Verification> {
        if fragments.is_empty() {
            tracing::info!("No evidence to verify against, refusing");
            return Ok(Verification::refusal());
        }

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), query.to_string());
        variables.insert("context".to_string(), serialize_fragments(fragments));
        variables.insert("draft".to_string(), draft.to_string());
        let request = to_request(build_prompt(&self.prompt, variables)?, &self.settings);

        let llm = &self.llm;
        let request = &request;
        let output = self
            .retry
            .run("verify", self.settings.timeout, move || async move {
                Ok(llm.complete(request).await?.content)
            })
            .await?;

        let verification = apply_verdict(&output, draft, fragments);
        tracing::info!(verdict = %verification.verdict, "Verification complete");
        Ok(verification)
    }
}

/// Interpret raw verifier output.
///
/// Unparseable output is treated as `Unsupported`. A partial rewrite keeps
/// only sentences found in the draft or the evidence; if none survive the
/// verdict becomes `Unsupported`.
pub fn apply_verdict(output: &str, draft: &str, fragments: &[RetrievedFragment]) -> Verification {
    let Some((verdict, answer)) = parse_verifier_output(output) else {
        tracing::warn!(
            output_len = output.len(),
            "Verifier output had no recognizable verdict, treating as unsupported"
        );
        return Verification::refusal();
    };

    match verdict {
        Verdict::Supported => Verification {
            verdict,
            final_answer: draft.to_string(),
        },
        Verdict::Unsupported => Verification::refusal(),
        Verdict::PartiallySupported => {
            let rewrite = filter_supported_sentences(&answer, draft, fragments);
            if rewrite.is_empty() {
                tracing::warn!("Partial rewrite kept no grounded sentence, refusing");
                Verification::refusal()
            } else {
                Verification {
                    verdict,
                    final_answer: rewrite,
                }
            }
        }
    }
}

/// Extract `(verdict, answer)` from `VERDICT: ...` / `ANSWER: ...` output.
pub fn parse_verifier_output(output: &str) -> Option<(Verdict, String)> {
    let mut verdict = None;
    let mut answer_lines: Option<Vec<&str>> = None;

    for line in output.lines() {
        let stripped = line.trim().trim_start_matches(['*', '#', '-', '>', ' ']);

        if verdict.is_none() {
            if let Some(rest) = strip_label(stripped, "verdict") {
                verdict = Verdict::parse(rest);
                continue;
            }
        }

        if answer_lines.is_none() {
            if let Some(rest) = strip_label(stripped, "answer") {
                answer_lines = Some(vec![rest]);
                continue;
            }
        }

        if let Some(lines) = answer_lines.as_mut() {
            lines.push(line);
        }
    }

    let answer = answer_lines
        .map(|lines| lines.join("\n").trim().to_string())
        .unwrap_or_default();

    verdict.map(|v| (v, answer))
}

fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }

    let rest = line[label.len()..].trim_start_matches('*').trim_start();
    rest.strip_prefix(':')
        .map(|r| r.trim_start_matches('*').trim())
}

/// Keep the sentences of `rewrite` that are whole sentences of `draft` or of
/// a fragment.
///
/// Comparison ignores case, punctuation at sentence edges and whitespace runs.
/// A rewrite sentence that only matches part of a source sentence is dropped.
pub fn filter_supported_sentences(
    rewrite: &str,
    draft: &str,
    fragments: &[RetrievedFragment],
) -> String {
    let sources: HashSet<String> = std::iter::once(draft)
        .chain(fragments.iter().map(|f| f.text.as_str()))
        .flat_map(split_sentences)
        .map(normalize)
        .filter(|sentence| !sentence.is_empty())
        .collect();

    split_sentences(rewrite)
        .into_iter()
        .filter(|sentence| sources.contains(&normalize(sentence)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase()
}
