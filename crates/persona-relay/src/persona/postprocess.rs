/// Remove markdown code fences (with or without a `json` tag) and trim the result
///
/// The upstream tends to wrap JSON answers in ```` ```json ... ``` ````; callers
/// expect the bare JSON.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}
