use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Translates a terminal key event into the byte sequence a child process
/// expects on its PTY. Returns `None` for keys with no terminal encoding.
pub fn encode_key(key: &KeyEvent) -> Option<Vec<u8>> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = key.code {
            let lower = c.to_ascii_lowercase();
            if lower.is_ascii_alphabetic() {
                return Some(vec![(lower as u8) & 0x1f]);
            }
            // Common control punctuation used by shells.
            return match lower {
                ' ' | '@' => Some(vec![0x00]),
                '[' => Some(vec![0x1b]),
                '\\' => Some(vec![0x1c]),
                ']' => Some(vec![0x1d]),
                '^' => Some(vec![0x1e]),
                '_' | '/' => Some(vec![0x1f]),
                _ => None,
            };
        }
    }

    match key.code {
        KeyCode::Enter => Some(b"\r".to_vec()),
        KeyCode::Tab => Some(b"\t".to_vec()),
        KeyCode::BackTab => Some(b"\x1b[Z".to_vec()),
        KeyCode::Backspace => Some(vec![0x7f]),
        KeyCode::Esc => Some(vec![0x1b]),
        KeyCode::Up => Some(b"\x1b[A".to_vec()),
        KeyCode::Down => Some(b"\x1b[B".to_vec()),
        KeyCode::Right => Some(b"\x1b[C".to_vec()),
        KeyCode::Left => Some(b"\x1b[D".to_vec()),
        KeyCode::Home => Some(b"\x1b[H".to_vec()),
        KeyCode::End => Some(b"\x1b[F".to_vec()),
        KeyCode::PageUp => Some(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => Some(b"\x1b[6~".to_vec()),
        KeyCode::Delete => Some(b"\x1b[3~".to_vec()),
        KeyCode::Insert => Some(b"\x1b[2~".to_vec()),
        KeyCode::Char(c) => {
            let mut buffer = [0_u8; 4];
            Some(c.encode_utf8(&mut buffer).as_bytes().to_vec())
        }
        _ => None,
    }
}
