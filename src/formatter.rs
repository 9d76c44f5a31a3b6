use crate::models::DEFAULT_TEMPLATE;

pub const NAME_TOKEN: &str = "[NOME]";

/// Substitutes the first `[NOME]` in `template` with `name`. A blank template
/// falls back to [`DEFAULT_TEMPLATE`].
pub fn format_message(template: &str, name: &str) -> String {
    let template = if template.trim().is_empty() {
        DEFAULT_TEMPLATE
    } else {
        template
    };
    template.replacen(NAME_TOKEN, name, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_only_the_first_token() {
        assert_eq!(format_message("Oi [NOME], [NOME]!", "Ana"), "Oi Ana, [NOME]!");
    }

    #[test]
    fn empty_template_uses_default() {
        let msg = format_message("", "Ana");
        assert_eq!(msg, DEFAULT_TEMPLATE.replacen(NAME_TOKEN, "Ana", 1));
        assert!(msg.contains("Ana"));
        assert!(!msg.contains(NAME_TOKEN));
        assert_eq!(format_message("   ", "Ana"), msg);
    }

    #[test]
    fn template_without_token_is_unchanged() {
        assert_eq!(format_message("Feliz aniversário!", "Ana"), "Feliz aniversário!");
    }
}
