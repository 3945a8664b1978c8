//! Knowledge block for the generation prompt

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::core::entry::{ScoredEntry, Source};

/// Context longer than this (in characters) is cut off
pub const MAX_CONTEXT_CHARS: usize = 1500;

/// Render retrieval hits as prompt context
///
/// Document blocks come first; user-derived blocks follow under their own
/// heading. Hits without answer and context are skipped, as are hits whose
/// answer (or context, for chunks) was already rendered. Returns `None`
/// when nothing is left to render.
pub fn assemble_context(results: &[ScoredEntry]) -> Option<String> {
    let mut seen = HashSet::new();
    let mut documents = String::new();
    let mut user = String::new();

    for (i, hit) in results.iter().enumerate() {
        let entry = &hit.entry;
        let key = match (entry.answer.as_deref(), entry.context.as_deref()) {
            (Some(a), _) if !a.trim().is_empty() => a,
            (_, Some(c)) if !c.trim().is_empty() => c,
            _ => {
                warn!(id = entry.id, "hit without answer or context, not rendered");
                continue;
            }
        };
        if !seen.insert(key) {
            debug!(id = entry.id, "duplicate answer, not rendered");
            continue;
        }

        let target = match entry.source {
            Source::Document => &mut documents,
            Source::User => &mut user,
        };
        target.push_str(&format!("\nЗапись {} (схожесть: {:.2}):\n", i + 1, hit.score));
        if let Some(ctx) = entry.context.as_deref().filter(|c| !c.trim().is_empty()) {
            target.push_str(&format!("Контекст: {}\n", truncate(ctx, MAX_CONTEXT_CHARS)));
        }
        if let (Some(q), Some(a)) = (entry.question.as_deref(), entry.answer.as_deref()) {
            target.push_str(&format!("Вопрос: {}\nОтвет: {}\n", q, a));
        }
        if !entry.tags.is_empty() {
            target.push_str(&format!("Теги: {}\n", entry.tags_joined()));
        }
        target.push_str(&format!("Источник: {}\n", entry.source));
    }

    if documents.is_empty() && user.is_empty() {
        return None;
    }

    let mut context = String::from("Контекст из базы знаний:\n");
    context.push_str(&documents);
    if !user.is_empty() {
        context.push_str("\nДанные от пользователей:\n");
        context.push_str(&user);
    }
    Some(context)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::KnowledgeEntry;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn hit(
        id: i64,
        q: Option<&str>,
        a: Option<&str>,
        ctx: Option<&str>,
        source: Source,
        score: f32,
    ) -> ScoredEntry {
        ScoredEntry {
            entry: KnowledgeEntry {
                id,
                question: q.map(String::from),
                answer: a.map(String::from),
                context: ctx.map(String::from),
                embedding: Vec::new(),
                last_used: Utc::now(),
                usage_count: 1,
                source,
                tags: if source == Source::Document {
                    BTreeSet::from(["immunity".to_string()])
                } else {
                    BTreeSet::new()
                },
            },
            score,
            similarity: score,
            keyword_group: None,
        }
    }

    #[test]
    fn test_empty_results() {
        assert!(assemble_context(&[]).is_none());
        assert!(assemble_context(&[hit(1, Some("q"), None, None, Source::User, 0.9)]).is_none());
    }

    #[test]
    fn test_documents_first_then_user_section() {
        let results = vec![
            hit(1, Some("Как спать?"), Some("Магний"), None, Source::User, 0.91),
            hit(2, None, None, Some("Витамин С для иммунитета"), Source::Document, 0.85),
        ];
        let context = assemble_context(&results).unwrap();

        let doc_pos = context.find("Витамин С для иммунитета").unwrap();
        let user_heading = context.find("Данные от пользователей:").unwrap();
        let user_pos = context.find("Ответ: Магний").unwrap();
        assert!(context.starts_with("Контекст из базы знаний:"));
        assert!(doc_pos < user_heading && user_heading < user_pos);
        assert!(context.contains("Запись 2 (схожесть: 0.85)"));
        assert!(context.contains("Теги: immunity"));
        assert!(context.contains("Источник: document"));
    }

    #[test]
    fn test_duplicate_answers_rendered_once() {
        let results = vec![
            hit(1, Some("q1"), Some("same"), None, Source::User, 0.9),
            hit(2, Some("q2"), Some("same"), None, Source::User, 0.8),
        ];
        let context = assemble_context(&results).unwrap();
        assert_eq!(context.matches("Ответ: same").count(), 1);
        assert!(!context.contains("Запись 2"));
    }

    #[test]
    fn test_long_context_truncated() {
        let long = "ж".repeat(MAX_CONTEXT_CHARS + 10);
        let results = [hit(1, None, None, Some(&long), Source::Document, 0.8)];
        let context = assemble_context(&results).unwrap();
        let expected = format!("Контекст: {}...", "ж".repeat(MAX_CONTEXT_CHARS));
        assert!(context.contains(&expected));
        assert!(!context.contains(&"ж".repeat(MAX_CONTEXT_CHARS + 1)));
    }
}
