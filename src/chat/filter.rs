//! Best-effort profanity masking for chat messages.

const BLOCKED_WORDS: &[&str] = &[
    "ass", "asshole", "bastard", "bitch", "bullshit", "crap", "damn", "dick", "fuck",
    "fucking", "motherfucker", "piss", "shit", "slut", "whore",
];

/// Replaces every blocked word with asterisks of the same length. Matching
/// is per whole word and case-insensitive; everything else is left as is.
pub fn mask_profanity(content: &str) -> String {
    let mut output = String::with_capacity(content.len());
    let mut word = String::new();

    for ch in content.chars() {
        if ch.is_alphanumeric() || ch == '\'' {
            word.push(ch);
        } else {
            flush_word(&mut word, &mut output);
            output.push(ch);
        }
    }
    flush_word(&mut word, &mut output);
    output
}

fn flush_word(word: &mut String, output: &mut String) {
    if word.is_empty() {
        return;
    }
    let lowered = word.to_lowercase();
    if BLOCKED_WORDS.contains(&lowered.as_str()) {
        output.extend(std::iter::repeat('*').take(word.chars().count()));
    } else {
        output.push_str(word);
    }
    word.clear();
}
