// src/utils/html.rs

/// Sanitizes admin-entered question and option text with ammonia.
///
/// Safe formatting tags (<b>, <p>, ...) survive; scripts, iframes and event
/// attributes are removed. Surrounding whitespace is trimmed.
pub fn clean_text(input: &str) -> String {
    ammonia::clean(input.trim()).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_and_keeps_text() {
        assert_eq!(
            clean_text("  What is <b>1+1</b>?<script>alert(1)</script> "),
            "What is <b>1+1</b>?"
        );
    }

    #[test]
    fn strips_event_handlers() {
        assert_eq!(clean_text(r#"<p onclick="x()">Knot</p>"#), "<p>Knot</p>");
    }
}
