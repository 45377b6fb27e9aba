//! Query answering: embed, search, prompt, complete.

use anyhow::Result;

use crate::chat::{ChatModel, ChatRequest};
use crate::embedder::Embedder;
use crate::store::{ProfessorMatch, ProfileStore};

/// System instruction sent with every answer request.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
/// Answer returned without calling the model when nothing matched.
pub const NO_CONTEXT_ANSWER: &str = "No relevant context found to answer the question.";

/// Retrieval and generation knobs.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// Professors retrieved as context.
    pub top_k: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

/// Retrieved matches and the model's answer.
#[derive(Debug, Clone)]
pub struct QueryAnswer {
    /// Closest professors, best first.
    pub matches: Vec<ProfessorMatch>,
    /// Model output, or [`NO_CONTEXT_ANSWER`].
    pub answer: String,
}

/// Renders matches as the context block of the prompt.
pub fn render_context(matches: &[ProfessorMatch]) -> String {
    let mut out = String::new();
    for (rank, hit) in matches.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {} <{}>\nProfile: {}\nScore: {:.4}\n{}\n---\n",
            rank + 1,
            hit.name,
            hit.email,
            hit.source_url,
            hit.score(),
            hit.chunk.trim()
        ));
    }
    out
}

/// User turn combining the retrieved context and the question.
pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are an expert assistant matching the user to professors they can do research with. \
         Use the following context to answer the question\n\n\
         Context:\n{context}\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

/// Embeds `question` and returns the `top_k` closest professors.
pub fn retrieve<E, S>(
    question: &str,
    embedder: &E,
    store: &S,
    top_k: usize,
) -> Result<Vec<ProfessorMatch>>
where
    E: Embedder + ?Sized,
    S: ProfileStore + ?Sized,
{
    anyhow::ensure!(!question.trim().is_empty(), "query must not be empty");
    let query_vector = embedder.embed(question)?;
    let matches = store.similarity_search(&query_vector, top_k)?;
    tracing::info!(matches = matches.len(), top_k, "retrieved context");
    Ok(matches)
}

/// Asks the model about `matches`; no matches short-circuits to
/// [`NO_CONTEXT_ANSWER`] without a model call.
pub fn respond<C>(
    question: &str,
    matches: &[ProfessorMatch],
    chat: &C,
    options: &QueryOptions,
) -> Result<String>
where
    C: ChatModel + ?Sized,
{
    if matches.is_empty() {
        return Ok(NO_CONTEXT_ANSWER.to_string());
    }
    let prompt = build_prompt(question, &render_context(matches));
    chat.complete(&ChatRequest {
        system: SYSTEM_PROMPT,
        prompt: &prompt,
        temperature: options.temperature,
        max_tokens: options.max_tokens,
    })
}

/// Answers `question` from the professors closest to it.
pub fn answer_query<E, S, C>(
    question: &str,
    embedder: &E,
    store: &S,
    chat: &C,
    options: &QueryOptions,
) -> Result<QueryAnswer>
where
    E: Embedder + ?Sized,
    S: ProfileStore + ?Sized,
    C: ChatModel + ?Sized,
{
    let matches = retrieve(question, embedder, store, options.top_k)?;
    let answer = respond(question, &matches, chat, options)?;
    Ok(QueryAnswer { matches, answer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::ScriptedChat;
    use crate::embedder::testing::CountingEmbedder;
    use crate::store::testing::MemoryStore;
    use crate::store::ProfessorRow;

    fn seeded_store() -> MemoryStore {
        let mut store = MemoryStore::default();
        let id = store
            .upsert_professor(&ProfessorRow {
                name: "Jane Doe".into(),
                email: "jdoe@example.edu".into(),
                source_url: "https://example.edu/jdoe".into(),
                research_areas: "Compilers.".into(),
            })
            .unwrap();
        store
            .insert_embedding(id, 0, "Compilers and program analysis.", &[3.0, 1.0, 1.0])
            .unwrap();
        store
    }

    #[test]
    fn empty_store_short_circuits() {
        let chat = ScriptedChat::new("should not be used");
        let result = answer_query(
            "who works on compilers?",
            &CountingEmbedder::new(1),
            &MemoryStore::default(),
            &chat,
            &QueryOptions::default(),
        )
        .unwrap();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(chat.prompts.borrow().is_empty());
    }

    #[test]
    fn prompt_carries_context_and_question() {
        let chat = ScriptedChat::new("Talk to Jane Doe.");
        let result = answer_query(
            "compilers?",
            &CountingEmbedder::new(1),
            &seeded_store(),
            &chat,
            &QueryOptions::default(),
        )
        .unwrap();
        assert_eq!(result.answer, "Talk to Jane Doe.");
        assert_eq!(result.matches.len(), 1);

        let prompts = chat.prompts.borrow();
        let (system, prompt) = &prompts[0];
        assert_eq!(system, SYSTEM_PROMPT);
        assert!(prompt.starts_with("You are an expert assistant matching the user"));
        assert!(prompt.contains("[1] Jane Doe <jdoe@example.edu>"));
        assert!(prompt.contains("Compilers and program analysis."));
        assert!(prompt.ends_with("Question: compilers?\n\nAnswer:"));
    }

    #[test]
    fn retrieval_alone_never_calls_the_model() {
        let matches = retrieve("compilers?", &CountingEmbedder::new(1), &seeded_store(), 3).unwrap();
        assert_eq!(matches.len(), 1);
        let context = render_context(&matches);
        assert!(context.contains("Profile: https://example.edu/jdoe"));
        assert!(context.contains("Score: "));
    }

    #[test]
    fn blank_queries_are_rejected() {
        let result = answer_query(
            "  ",
            &CountingEmbedder::new(1),
            &seeded_store(),
            &ScriptedChat::new("unused"),
            &QueryOptions::default(),
        );
        assert!(result.is_err());
    }
}
