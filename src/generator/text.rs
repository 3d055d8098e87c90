//! Synthetic text: tokenization helpers, the sentence bank, and the echo and
//! random generation paths.
//!
//! "Tokens" here are whitespace-delimited words; a token keeps its trailing
//! space so that concatenating the token list reproduces the original text.

use super::random;

/// Fixed bank of sentences the random mode samples from.
pub const SENTENCES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "A journey of a thousand miles begins with a single step.",
    "To be or not to be, that is the question.",
    "All that glitters is not gold.",
    "The early bird catches the worm, or so the saying goes.",
    "Better late than never, but never late is better.",
    "Rome was not built in a day, and neither was this response.",
    "Actions speak louder than words in most circumstances.",
    "Every cloud has a silver lining if you look hard enough.",
    "Practice makes perfect, although nobody is perfect.",
    "Fortune favors the bold, or at least the well prepared.",
    "When in doubt, leave it out, unless it is essential.",
];

/// Split text into emission tokens. Each token keeps its trailing space, so
/// `tokens.concat()` round-trips the input.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

/// Synthetic token count of a prompt: whitespace-separated words.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn random_sentence() -> &'static str {
    SENTENCES[random::random_index(SENTENCES.len())]
}

/// Chain random sentences until the budget is met, then cut to exactly
/// `budget` tokens.
fn tokens_for_budget(budget: usize) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::with_capacity(budget);
    while tokens.len() < budget {
        if let Some(last) = tokens.last_mut() {
            last.push(' ');
        }
        tokens.extend(tokenize(random_sentence()));
    }
    tokens.truncate(budget);
    tokens
}

/// Echo generation: return the request's own text, capped by the declared
/// max completion tokens. The bool reports whether truncation happened.
pub fn echo_response_tokens(text: &str, max_completion_tokens: Option<i64>) -> (Vec<String>, bool) {
    let mut tokens = tokenize(text);
    if let Some(max) = max_completion_tokens {
        let max = max.max(0) as usize;
        if tokens.len() > max {
            tokens.truncate(max);
            return (tokens, true);
        }
    }
    (tokens, false)
}

/// Random generation: a sentence from the bank, honoring the declared max.
/// With a max present, a coin flip picks between filling the budget exactly
/// (truncated) and a plain sentence cut down only if it overruns.
pub fn random_response_tokens(max_completion_tokens: Option<i64>) -> (Vec<String>, bool) {
    let Some(max) = max_completion_tokens else {
        return (tokenize(random_sentence()), false);
    };
    let max = max.max(0) as usize;

    if random::flip_coin() {
        return (tokens_for_budget(max), true);
    }

    let mut tokens = tokenize(random_sentence());
    if tokens.len() > max {
        tokens.truncate(max);
        return (tokens, true);
    }
    (tokens, false)
}
