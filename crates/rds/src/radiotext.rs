use crate::ebu::ebu_to_latin1;

/// Two 64-byte halves, addressed by the segment index in the message.
const HALF: usize = 0x40;

/// Radiotext assembly buffer.
///
/// Type 0x0A messages carry up to 64 characters per segment: the payload
/// length sits at byte 7, the segment index at byte 8, the text from
/// byte 9. Broadcasters either use both halves for a 128-character text or
/// repeat the same text in both; the repeated case collapses to one half
/// on publication.
pub struct RadioText {
    buf: [u8; 2 * HALF],
    changed: bool,
}

impl RadioText {
    pub fn new() -> Self {
        Self {
            buf: [b' '; 2 * HALF],
            changed: false,
        }
    }

    /// Merge one radiotext message into the buffer.
    pub fn apply(&mut self, msg: &[u8]) {
        if msg.len() < 9 {
            return;
        }
        let index = msg[8].min(1) as usize;
        let base = index * HALF;
        let msg_len = (msg[7].min(0x41) as usize).min(msg.len() - 8);

        if msg_len > 0 {
            // Blank the rest of this half beyond the new text.
            for slot in self.buf[base + msg_len - 1..base + HALF].iter_mut() {
                *slot = b' ';
            }
        }
        for i in 0..msg_len.saturating_sub(1) {
            let mapped = ebu_to_latin1(msg[9 + i]);
            if self.buf[base + i] != mapped {
                self.buf[base + i] = mapped;
                self.changed = true;
            }
        }
    }

    /// When any character changed since the last call, produce the current
    /// title: identical halves collapse to one, the "X / Y" and "X von Y"
    /// patterns are turned around into "Y - X", space runs shrink to one.
    pub fn take_changed(&mut self) -> Option<String> {
        if !self.changed {
            return None;
        }
        self.changed = false;

        let mut buf = self.buf;
        if buf[..HALF] == buf[HALF..] {
            buf[HALF..].fill(b' ');
        }
        let raw: String = buf.iter().map(|&b| char::from(b)).collect();
        let title = collapse_spaces(&rewrite(raw.trim()));
        if title.is_empty() { None } else { Some(title) }
    }
}

impl Default for RadioText {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn "title / artist" (or "title von artist") into "artist - title".
fn rewrite(s: &str) -> String {
    if let Some((x, y)) = s.split_once(" / ") {
        format!("{} - {}", y.trim(), x.trim())
    } else if let Some((x, y)) = s.split_once(" von ") {
        format!("{} - {}", y.trim(), x.trim())
    } else {
        s.to_string()
    }
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_run = false;
    for c in s.chars() {
        if c == ' ' {
            if !in_run {
                out.push(c);
            }
            in_run = true;
        } else {
            in_run = false;
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a radiotext message: type 0x0A, length and segment index in
    /// place, text from byte 9.
    pub fn rt_message(text: &[u8], index: u8) -> Vec<u8> {
        let mut msg = vec![0u8; 9 + text.len()];
        msg[4] = crate::MSG_RADIOTEXT;
        msg[7] = (text.len() + 1) as u8;
        msg[8] = index;
        msg[9..].copy_from_slice(text);
        msg
    }

    #[test]
    fn test_simple_text() {
        let mut rt = RadioText::new();
        rt.apply(&rt_message(b"Nachtprogramm", 0));
        assert_eq!(rt.take_changed().unwrap(), "Nachtprogramm");
        // No change, no new title.
        rt.apply(&rt_message(b"Nachtprogramm", 0));
        assert!(rt.take_changed().is_none());
    }

    #[test]
    fn test_title_slash_artist_is_turned_around() {
        let mut rt = RadioText::new();
        rt.apply(&rt_message(b"SONG / ARTIST", 0));
        assert_eq!(rt.take_changed().unwrap(), "ARTIST - SONG");
    }

    #[test]
    fn test_von_pattern_is_turned_around() {
        let mut rt = RadioText::new();
        rt.apply(&rt_message(b"Lied von Kapelle", 0));
        assert_eq!(rt.take_changed().unwrap(), "Kapelle - Lied");
    }

    #[test]
    fn test_identical_halves_collapse() {
        let mut rt = RadioText::new();
        let mut text = b"Same Text".to_vec();
        text.resize(0x40, b' ');
        rt.apply(&rt_message(&text, 0));
        rt.apply(&rt_message(&text, 1));
        assert_eq!(rt.take_changed().unwrap(), "Same Text");
    }

    #[test]
    fn test_two_distinct_halves_concatenate() {
        let mut rt = RadioText::new();
        let mut first = b"front".to_vec();
        first.resize(0x40, b' ');
        rt.apply(&rt_message(&first, 0));
        rt.apply(&rt_message(b"back", 1));
        assert_eq!(rt.take_changed().unwrap(), "front back");
    }

    #[test]
    fn test_umlauts_and_unmapped_bytes() {
        let mut rt = RadioText::new();
        rt.apply(&rt_message(&[0x91, b'h', b'm', 0x80], 0));
        assert_eq!(rt.take_changed().unwrap(), "\u{e4}hm.");
    }

    #[test]
    fn test_space_runs_collapse() {
        let mut rt = RadioText::new();
        rt.apply(&rt_message(b"a   b", 0));
        assert_eq!(rt.take_changed().unwrap(), "a b");
    }
}
