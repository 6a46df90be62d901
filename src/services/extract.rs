use serde::de::DeserializeOwned;

/// Best-effort structured extraction from semi-structured model output.
///
/// Vision models rarely return bare JSON: the block is usually embedded in
/// prose, sometimes fenced, sometimes preceded by an apology. This stage
/// isolates the first balanced `{…}` block (aware of strings and escapes)
/// and parses it, so the caller's failure handling stays uniform: a value or
/// a typed failure, never a panic or a raw serde error path.
pub fn first_json_block<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let block = locate_block(text).ok_or(ExtractError::NoBlock)?;
    serde_json::from_str(block).map_err(|e| ExtractError::Malformed(e.to_string()))
}

/// Find the first balanced top-level `{…}` span in `text`.
fn locate_block(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("response contained no balanced JSON block")]
    NoBlock,

    #[error("embedded block was not valid JSON: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ok: bool,
        score: u8,
    }

    #[test]
    fn extracts_block_embedded_in_prose() {
        let text = "Sure! Here is the analysis:\n{\"ok\": true, \"score\": 85}\nLet me know.";
        let v: Verdict = first_json_block(text).unwrap();
        assert_eq!(v, Verdict { ok: true, score: 85 });
    }

    #[test]
    fn handles_nested_objects() {
        let text = r#"prefix {"ok": false, "score": 10, "inner": {"a": 1}} suffix"#;
        let v: serde_json::Value = first_json_block(text).unwrap();
        assert_eq!(v["inner"]["a"], 1);
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_block() {
        let text = r#"{"ok": true, "score": 5, "note": "weird } brace { here"}"#;
        let v: serde_json::Value = first_json_block(text).unwrap();
        assert_eq!(v["note"], "weird } brace { here");
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let text = r#"{"ok": true, "score": 7, "note": "he said \"hi\" {"}"#;
        let v: serde_json::Value = first_json_block(text).unwrap();
        assert_eq!(v["ok"], true);
    }

    #[test]
    fn missing_block_is_typed_failure() {
        let err = first_json_block::<Verdict>("no structure here at all").unwrap_err();
        assert_eq!(err, ExtractError::NoBlock);
    }

    #[test]
    fn unbalanced_block_is_typed_failure() {
        let err = first_json_block::<Verdict>("{\"ok\": true, ").unwrap_err();
        assert_eq!(err, ExtractError::NoBlock);
    }

    #[test]
    fn garbage_block_is_malformed() {
        let err = first_json_block::<Verdict>("{not json}").unwrap_err();
        assert!(matches!(err, ExtractError::Malformed(_)));
    }
}
