use std::fmt::Write;

use crate::catalog::Fact;
use crate::retrieval::EvidencePassage;

pub const SYSTEM_PROMPT: &str = r#"You review scientific literature for statements of Dynamic Energy Budget (DEB) theory.

Judge how well the supplied literature excerpts support the stylized fact. Use only the excerpts; do not draw on prior knowledge. If the excerpts do not address the fact, the score must be low. Consider direct support, indirect support, contradictions, empirical evidence and theoretical backing.

Score scale (integer, 1-100):
- 1-20: no evidence, or contradictory evidence
- 21-40: weak or indirect support, tangential mentions
- 41-60: moderate support, some direct evidence
- 61-80: strong support, several sources with good evidence
- 81-100: very strong support, extensive evidence across many sources

Reply with a single JSON object and nothing else:
{
  "score": <integer 1-100>,
  "confidence": "low" | "medium" | "high",
  "key_evidence": "<summary of the evidence, at most 200 words>",
  "supporting_papers": ["<document id>", ...],
  "contradicting_papers": ["<document id>", ...]
}
Cite papers by the document id shown in the excerpt header."#;

/// Assessment prompt for one fact and the number of passages it includes.
///
/// Each excerpt is cut to `max_passage_chars`; passages are added best first until
/// `max_context_chars` is spent, so the least relevant ones are dropped first.
pub fn build_user_prompt(
    fact: &Fact,
    evidence: &[EvidencePassage],
    max_passage_chars: usize,
    max_context_chars: usize,
) -> (String, usize) {
    let mut ordered: Vec<&EvidencePassage> = evidence.iter().collect();
    ordered.sort_by(|a, b| {
        b.relevance_score
            .total_cmp(&a.relevance_score)
            .then(a.rank.cmp(&b.rank))
    });

    let mut context = String::new();
    let mut used = 0usize;
    let mut included = 0usize;
    for passage in ordered {
        let mut excerpt = truncate_chars(passage.passage_text.trim(), max_passage_chars);
        let remaining = max_context_chars.saturating_sub(used);
        if excerpt.chars().count() > remaining {
            if included > 0 {
                break;
            }
            excerpt = truncate_chars(excerpt, remaining);
        }
        used += excerpt.chars().count();
        included += 1;

        let _ = writeln!(
            context,
            "[Document {}: {} (relevance: {:.3})]\n{}\n",
            included, passage.source_document_id, passage.relevance_score, excerpt
        );
    }

    let prompt = format!(
        "STYLIZED FACT #{id} ({section}):\n\"{text}\"\n\nRELEVANT LITERATURE EXCERPTS:\n\n{context}\nAssess the literature support for this fact and answer in the JSON format described.",
        id = fact.id,
        section = fact.section,
        text = fact.text,
        context = context,
    );
    (prompt, included)
}

/// Follow-up turn after a reply that could not be parsed.
pub fn correction_prompt(reason: &str) -> String {
    format!(
        "Your previous reply could not be used: {reason}. Reply again with only the JSON \
         object described in the instructions. \"score\" must be an integer from 1 to 100 and \
         \"confidence\" one of \"low\", \"medium\" or \"high\"."
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
