//! Prompt templates for every model call the orchestrator makes.

use crate::catalogue::Catalogue;

/// Planning prompt: catalogue, query and the rolling summary. No history.
pub fn planning(catalogue: &Catalogue, query: &str, summary: &str) -> String {
    format!(
        r#"You are an autonomous engineer. Your job is to SOLVE the task, not just explain it.

{catalogue}

User request: {query}

Current Progress:
{summary}

RULES:
1. Do NOT explain code in chat. Use tools (write_file, replace_in_file) to APPLY changes.
2. If the user asks for the time or date, use get_current_time.
3. If the user asks about files, check with list_directory or read_file first.
4. Only reply with null if the task is FULLY COMPLETE.
5. Prefer using tools over guessing.

Which tool should be used NEXT? Reply with JSON only:
{{"tool": "tool_name", "params": {{"key": "value"}}, "filter": ["field1"]}}

If the task is complete, return:
{{"tool": null}}

Examples:
- List files -> {{"tool": "list_directory", "params": {{"path": "src"}}, "filter": ["files"]}}
- Replace text -> {{"tool": "replace_in_file", "params": {{"path": "main.py", "old_text": "foo", "new_text": "bar"}}}}

Your JSON answer:"#
    )
}

/// State-update prompt: merge one action into the running summary.
pub fn state_update(query: &str, summary: &str, tool: &str, result: &str) -> String {
    format!(
        r#"Update the progress summary for this task.

User Request: {query}

Old Summary:
{summary}

New Action: Used {tool}
Result: {result}

Write a concise, updated summary of what has been done so far.
Do not lose important details from the Old Summary.
Merge the New Action into the summary.
Keep it under 300 words.

Updated Summary:"#
    )
}

/// Filter prompt for the execution model.
pub fn filter(fields: &[String], data: &str) -> String {
    let fields = serde_json::to_string(fields).unwrap_or_default();
    format!(
        r#"Extract only these fields from the data: {fields}

Data:
{data}

Return ONLY a compact JSON with the requested fields. No explanation."#
    )
}

/// Final answer prompt. Built from the summary only, never raw tool output.
pub fn final_answer(query: &str, summary: &str) -> String {
    format!(
        r#"User query: {query}

Summary of actions taken:
{summary}

Based on this summary, provide the final answer to the user request.
If you created files or verified code, report what was done."#
    )
}

/// Direct answer prompt, used when the first plan needs no tool.
pub fn direct(query: &str) -> String {
    format!(
        r#"You are a helpful AI assistant. Respond to the user's request directly.

User request: {query}

If the request is for code, provide complete working code with explanations.
If the request is a question, provide a clear and helpful answer.

Your response:"#
    )
}
