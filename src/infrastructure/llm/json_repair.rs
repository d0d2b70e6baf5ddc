//! JSON extraction and soft-repair pipeline for LLM responses.
//!
//! Order of operations mirrors the original Python implementation this
//! system was distilled from: strip fences, extract the tagged/balanced
//! block, strip comments, normalise quotes, drop trailing commas, then
//! balance braces/brackets by appending the exact number of missing
//! closers. Every step is a pure string transform — no network I/O — so the
//! whole pipeline is unit-testable for determinism and idempotence.

const JSON_START_TAG: &str = "<json>";
const JSON_END_TAG: &str = "</json>";

/// Extract the payload between `<json>...</json>` tags if present;
/// otherwise the outermost balanced `{...}` or `[...]` block; otherwise the
/// trimmed input unchanged.
pub fn extract_json_block(text: &str) -> String {
    if let Some(start) = text.find(JSON_START_TAG) {
        let after_start = start + JSON_START_TAG.len();
        if let Some(end) = text[after_start..].find(JSON_END_TAG) {
            return text[after_start..after_start + end].trim().to_string();
        }
    }

    if let Some(block) = outermost_balanced_block(text, '{', '}') {
        return block;
    }
    if let Some(block) = outermost_balanced_block(text, '[', ']') {
        return block;
    }
    text.trim().to_string()
}

fn outermost_balanced_block(text: &str, open: char, close: char) -> Option<String> {
    let start = text.find(open)?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth -= 1;
            if depth == 0 {
                let end = start + offset + ch.len_utf8();
                return Some(text[start..end].to_string());
            }
        }
    }
    None
}

/// Simple brace/bracket balance check — not a full JSON validator.
pub fn is_balanced(text: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    for ch in text.chars() {
        match ch {
            '{' | '[' => stack.push(ch),
            '}' => {
                if stack.pop() != Some('{') {
                    return false;
                }
            }
            ']' => {
                if stack.pop() != Some('[') {
                    return false;
                }
            }
            _ => {}
        }
    }
    stack.is_empty()
}

fn strip_code_fences(text: &str) -> String {
    text.replace("```", "").trim().to_string()
}

fn strip_comments(text: &str) -> String {
    // Strip `// ...` line comments.
    let without_line_comments: String = text
        .lines()
        .map(|line| match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    // Strip `/* ... */` block comments (non-greedy, may span lines).
    let mut result = String::with_capacity(without_line_comments.len());
    let mut rest = without_line_comments.as_str();
    while let Some(start) = rest.find("/*") {
        result.push_str(&rest[..start]);
        match rest[start..].find("*/") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    result.push_str(rest);
    result
}

fn swap_ambiguous_quotes(text: &str) -> String {
    if !text.contains('"') && text.contains('\'') {
        text.replace('\'', "\"")
    } else {
        text.to_string()
    }
}

fn remove_trailing_commas(text: &str) -> String {
    // Remove a comma followed only by whitespace before a closing
    // brace/bracket, e.g. `{"a": 1,}` -> `{"a": 1}`.
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i] as char;
        if ch == ',' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j < bytes.len() && matches!(bytes[j] as char, '}' | ']') {
                i += 1;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    out
}

fn balance_closers(text: &str) -> String {
    if is_balanced(text) {
        return text.to_string();
    }
    // Track which openers are still unclosed, in nesting order, so closers
    // get appended innermost-first rather than grouped by bracket kind.
    let mut stack: Vec<char> = Vec::new();
    for ch in text.chars() {
        match ch {
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    let mut text = text.to_string();
    for open in stack.into_iter().rev() {
        text.push(if open == '{' { '}' } else { ']' });
    }
    text
}

/// Run the full soft-repair pipeline over raw model output.
pub fn repair(text: &str) -> String {
    let text = strip_code_fences(text);
    let text = extract_json_block(&text);
    let text = strip_comments(&text);
    let text = swap_ambiguous_quotes(&text);
    let text = remove_trailing_commas(&text);
    let text = balance_closers(&text);
    text.trim().to_string()
}

/// Try `serde_json::from_str` directly, then fall back to [`repair`].
/// Returns the parsed value and whether repair was needed.
pub fn parse_with_repair(text: &str) -> Result<(serde_json::Value, bool), String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => Ok((value, false)),
        Err(first_err) => {
            let repaired = repair(text);
            if repaired == text.trim() {
                return Err(format!("json invalid: {first_err}"));
            }
            match serde_json::from_str::<serde_json::Value>(&repaired) {
                Ok(value) => Ok((value, true)),
                Err(second_err) => Err(format!(
                    "json invalid after repair. first: {first_err}. second: {second_err}."
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tagged_block() {
        let text = "preamble <json>{\"a\": 1}</json> trailer";
        assert_eq!(extract_json_block(text), "{\"a\": 1}");
    }

    #[test]
    fn extracts_outermost_balanced_braces_without_tag() {
        let text = "here is {\"a\": {\"b\": 1}} ok";
        assert_eq!(extract_json_block(text), "{\"a\": {\"b\": 1}}");
    }

    #[test]
    fn strips_code_fences() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(repair(text), "{\"a\": 1}");
    }

    #[test]
    fn strips_line_and_block_comments() {
        let text = "{\n  \"a\": 1, // comment\n  /* block */ \"b\": 2\n}";
        let repaired = repair(text);
        let parsed: serde_json::Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(parsed["a"], 1);
        assert_eq!(parsed["b"], 2);
    }

    #[test]
    fn swaps_single_quotes_only_when_no_double_quotes_present() {
        assert_eq!(repair("{'a': 1}"), "{\"a\": 1}");
        // A mixed string keeps its double quotes untouched and embedded
        // apostrophes survive.
        let mixed = "{\"a\": \"it's fine\"}";
        assert_eq!(repair(mixed), mixed);
    }

    #[test]
    fn removes_trailing_commas() {
        assert_eq!(repair("{\"a\": 1,}"), "{\"a\": 1}");
        assert_eq!(repair("[1, 2,]"), "[1, 2]");
    }

    #[test]
    fn balances_missing_closers() {
        assert_eq!(repair("{\"a\": 1"), "{\"a\": 1}");
        assert_eq!(repair("{\"a\": [1, 2"), "{\"a\": [1, 2]}");
    }

    #[test]
    fn repair_is_idempotent() {
        let inputs = [
            "{'a': 1,}",
            "```{\"a\": [1, 2",
            "<json>{\"a\": 1}</json>",
            "{\"a\": 1}",
        ];
        for input in inputs {
            let once = repair(input);
            let twice = repair(&once);
            assert_eq!(once, twice, "repair should be idempotent for {input:?}");
        }
    }

    #[test]
    fn parse_with_repair_gives_up_on_unrecoverable_garbage() {
        assert!(parse_with_repair("{\"not-json").is_err());
    }

    #[test]
    fn parse_with_repair_succeeds_on_well_formed_json() {
        let (value, repaired) = parse_with_repair("{\"ok\": true}").unwrap();
        assert!(!repaired);
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn parse_with_repair_fixes_trailing_comma() {
        let (value, repaired) = parse_with_repair("{\"ok\": true,}").unwrap();
        assert!(repaired);
        assert_eq!(value["ok"], true);
    }
}
