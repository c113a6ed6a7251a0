//! Default prompt formatting shared by adapters that do not override it.

use omnigen_types::provider::{CodeRequest, Document, GenerationContext};

/// System instruction, a blank line, then the prompt.
pub fn default_enhance_prompt(prompt: &str, context: &GenerationContext) -> String {
    match context
        .system_instruction
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(instruction) => format!("{instruction}\n\n{prompt}"),
        None => prompt.to_string(),
    }
}

/// Numbered documents followed by the question. Returns `query` unchanged when
/// there are no documents.
pub fn default_rag_context(documents: &[Document], query: &str) -> String {
    if documents.is_empty() {
        return query.to_string();
    }

    let mut out = String::from("Answer the question using the documents below.\n\n");
    for (i, doc) in documents.iter().enumerate() {
        out.push_str(&format!("Document {}", i + 1));
        if let Some(source) = &doc.metadata.source {
            out.push_str(&format!(" (source: {source})"));
        }
        out.push_str(":\n");
        out.push_str(doc.content.trim());
        out.push_str("\n\n");
    }
    out.push_str(&format!("Question: {query}"));
    out
}

pub fn default_code_prompt(request: &CodeRequest) -> String {
    let language = request.language.as_deref().unwrap_or("the appropriate language");
    let mut prompt = format!(
        "You are an expert programmer. Write {language} code for the following task. \
         Reply with the code only.\n\nTask: {}",
        request.instruction.trim()
    );
    if let Some(snippet) = request.snippet.as_deref().filter(|s| !s.trim().is_empty()) {
        let fence = request.language.as_deref().unwrap_or("");
        prompt.push_str(&format!("\n\nExisting code:\n```{fence}\n{}\n```", snippet.trim_end()));
    }
    prompt
}

/// Strip one surrounding markdown fence (```` ```lang ... ``` ````), if present.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };
    // Drop the info string (language tag) on the opening line.
    match body.split_once('\n') {
        Some((_, code)) => code.trim_end().to_string(),
        None => body.trim().to_string(),
    }
}
