use crate::context::{MessageRecord, Speaker};

/// Renders a transcript-style prompt: one `"<label>: <text>"` line per window
/// record (the triggering message included), then the new user line, then an
/// open `"<BotName>:"` turn.
pub fn render(bot_name: &str, window: &[MessageRecord], new_user_text: &str) -> String {
    let mut prompt = String::new();
    for record in window {
        let label = match record.speaker {
            Speaker::Bot => bot_name,
            Speaker::User => "User",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&record.text);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(new_user_text);
    prompt.push('\n');
    prompt.push_str(bot_name);
    prompt.push(':');
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(speaker: Speaker, text: &str) -> MessageRecord {
        MessageRecord {
            speaker,
            text: text.to_string(),
            id: "id".to_string(),
            timestamp: 0,
            quoted_text: None,
        }
    }

    #[test]
    fn renders_history_then_user_line_then_open_bot_turn() {
        let window = vec![
            record(Speaker::User, "hi nala"),
            record(Speaker::Bot, "hello!"),
        ];
        assert_eq!(
            render("Nala", &window, "tell me a joke"),
            "User: hi nala\nNala: hello!\nUser: tell me a joke\nNala:"
        );
    }

    #[test]
    fn empty_window_renders_only_the_new_turn() {
        assert_eq!(render("Nala", &[], "ping"), "User: ping\nNala:");
    }

    #[test]
    fn render_is_deterministic() {
        let window = vec![record(Speaker::User, "a"), record(Speaker::Bot, "b")];
        let first = render("Nala", &window, "c");
        let second = render("Nala", &window, "c");
        assert_eq!(first, second);
        assert_eq!(window.len(), 2);
    }
}
