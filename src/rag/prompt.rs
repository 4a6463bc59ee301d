pub const SYSTEM_PROMPT: &str = "\
You are InsureAssist AI, a professional insurance advisor for the Kenyan market.
You help users compare, explain, and recommend insurance products such as motor, health, life, funeral, and general policies.

INSTRUCTIONS:
- Always use the provided context to ground your answer.
- Highlight key details: premiums, benefits, exclusions, waiting periods, and payout timelines.
- If multiple options are relevant, compare them clearly (you may use bullet points or a table).
- If the context lacks enough information, say so politely and suggest what the user could clarify.
- Keep the tone professional, clear, and empathetic, like a trusted advisor.
- Do not invent insurer names, products, or numbers not supported by the context.
- Summarize into a short recommendation after explaining options.
";

pub fn user_prompt(query: &str, context: &str) -> String {
    format!("USER QUESTION:\n{}\n\nCONTEXT:\n{}", query, context)
}

/// Sidebar title for a chat, derived from its first question.
pub fn chat_title(query: &str, max_chars: usize) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(max_chars).collect();
    let cuts_word = collapsed
        .chars()
        .nth(max_chars)
        .map(|c| !c.is_whitespace())
        .unwrap_or(false);

    // Prefer ending on a whole word when one fits.
    let head = match truncated.rfind(' ') {
        Some(pos) if cuts_word && pos > 0 => &truncated[..pos],
        _ => truncated.as_str(),
    };
    format!("{}...", head.trim_end())
}
