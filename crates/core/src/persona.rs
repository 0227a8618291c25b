use tracing::debug;

/// Per-connection personalization used to derive each turn's system instruction.
#[derive(Debug, Clone, Default)]
pub struct Personalization {
    user_name: Option<String>,
}

impl Personalization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest display name for the rest of the connection.
    ///
    /// Surrounding whitespace is trimmed. A blank name is ignored and leaves
    /// any previously set name in place.
    pub fn set(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            debug!("Ignoring blank user name.");
            return;
        }
        self.user_name = Some(name.to_string());
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    /// Builds the system instruction for the next upstream session.
    ///
    /// Without a name the base instruction is returned unchanged.
    pub fn build_instruction(&self, base: &str) -> String {
        match &self.user_name {
            None => base.to_string(),
            Some(name) => format!(
                "{}\n\nThe user's name is {}. Address them by name when it feels natural.",
                base.trim_end(),
                name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "You are a helpful voice assistant.";

    #[test]
    fn test_instruction_without_name_is_base() {
        let persona = Personalization::new();
        assert_eq!(persona.build_instruction(BASE), BASE);
        assert_eq!(persona.user_name(), None);
    }

    #[test]
    fn test_instruction_with_name_mentions_user() {
        let mut persona = Personalization::new();
        persona.set("Ana");

        let instruction = persona.build_instruction(BASE);
        assert!(instruction.starts_with(BASE));
        assert!(instruction.contains("Ana"));
    }

    #[test]
    fn test_latest_name_wins() {
        let mut persona = Personalization::new();
        persona.set("Ana");
        persona.set("  Bruno ");

        assert_eq!(persona.user_name(), Some("Bruno"));
        let instruction = persona.build_instruction(BASE);
        assert!(instruction.contains("Bruno"));
        assert!(!instruction.contains("Ana"));
    }

    #[test]
    fn test_blank_name_keeps_previous() {
        let mut persona = Personalization::new();
        persona.set("Ana");
        persona.set("   ");
        assert_eq!(persona.user_name(), Some("Ana"));

        let mut fresh = Personalization::new();
        fresh.set("");
        assert_eq!(fresh.build_instruction(BASE), BASE);
    }
}
