use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global quit, works in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // The confirmation overlay swallows everything else
    if app.confirm_clear {
        handle_confirm_clear(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_confirm_clear(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.clear_conversation(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.confirm_clear = false,
        _ => {}
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Back to the input box
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,

        // Query option toggles, applied to the next query
        KeyCode::Char('r') => app.use_rerank = !app.use_rerank,
        KeyCode::Char('m') => app.use_memory = !app.use_memory,

        KeyCode::Char('c') => app.request_clear(),

        // Transcript scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_chat_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    // The input is locked while a query is in flight
    if app.loading {
        if key.code == KeyCode::Esc {
            app.input_mode = InputMode::Normal;
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            app.submit_query();
        }
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiClient;
    use crate::config::Config;
    use std::time::Duration;

    fn test_app() -> App {
        let client = ApiClient::new("http://127.0.0.1:1", 0, Duration::from_millis(1));
        App::new(&Config::default(), client)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_inserts_at_cursor() {
        let mut app = test_app();
        for c in "abd".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Left));
        handle_key(&mut app, press(KeyCode::Char('c')));
        assert_eq!(app.input, "abcd");
        assert_eq!(app.cursor, 3);
    }

    #[test]
    fn backspace_is_utf8_safe() {
        let mut app = test_app();
        for c in "héllo".chars() {
            handle_key(&mut app, press(KeyCode::Char(c)));
        }
        handle_key(&mut app, press(KeyCode::Backspace));
        handle_key(&mut app, press(KeyCode::Backspace));
        handle_key(&mut app, press(KeyCode::Backspace));
        assert_eq!(app.input, "hé");
        assert_eq!(app.cursor, 2);
    }

    #[test]
    fn typing_is_ignored_while_loading() {
        let mut app = test_app();
        app.loading = true;
        handle_key(&mut app, press(KeyCode::Char('x')));
        assert_eq!(app.input, "");
    }

    #[test]
    fn toggles_flip_in_normal_mode() {
        let mut app = test_app();
        app.input_mode = InputMode::Normal;
        let rerank_before = app.use_rerank;
        let memory_before = app.use_memory;
        handle_key(&mut app, press(KeyCode::Char('r')));
        handle_key(&mut app, press(KeyCode::Char('m')));
        assert_eq!(app.use_rerank, !rerank_before);
        assert_eq!(app.use_memory, !memory_before);
    }

    #[test]
    fn clear_requires_confirmation() {
        let mut app = test_app();
        app.use_memory = false;
        app.push_message(crate::app::ChatRole::User, "hello".to_string());
        app.input_mode = InputMode::Normal;

        handle_key(&mut app, press(KeyCode::Char('c')));
        assert!(app.confirm_clear);
        assert_eq!(app.messages.len(), 2);

        // Declining leaves the transcript alone
        handle_key(&mut app, press(KeyCode::Char('n')));
        assert!(!app.confirm_clear);
        assert_eq!(app.messages.len(), 2);
    }
}
