//! Fuzzy label similarity: case, order and acronym insensitive.
//!
//! The base metric is the Ratcliff/Obershelp "gestalt" ratio: recursively
//! find the longest common block, then recurse on either side of it.
//! `ratio = 2 * matched / (len(a) + len(b))`.

use std::collections::HashMap;

/// Sequences at least this long get their most frequent characters excluded
/// from block anchoring, as classic diff matchers do.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Similarity between two labels in `[0, 1]`.
///
/// Returns the best of: plain ratio, ratio after sorting words, acronym of
/// `a` against `b` and `a` against the acronym of `b`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    let a_words = split_words(&a);
    let b_words = split_words(&b);
    let a_sorted = sorted_join(&a_words);
    let b_sorted = sorted_join(&b_words);
    let a_acronym = acronym(&a_words);
    let b_acronym = acronym(&b_words);

    [
        ratio(&a, &b),
        ratio(&a_sorted, &b_sorted),
        ratio(&a_acronym, &b),
        ratio(&a, &b_acronym),
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split on runs of non-word characters. Leading or trailing separators
/// yield an empty token at that end.
fn split_words(s: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    let mut in_sep = false;
    for (i, c) in s.char_indices() {
        if is_word_char(c) {
            if in_sep {
                start = i;
                in_sep = false;
            }
        } else if !in_sep {
            words.push(&s[start..i]);
            in_sep = true;
        }
    }
    words.push(if in_sep { "" } else { &s[start..] });
    words
}

fn sorted_join(words: &[&str]) -> String {
    let mut sorted = words.to_vec();
    sorted.sort_unstable();
    sorted.join(" ")
}

fn acronym(words: &[&str]) -> String {
    words.iter().filter_map(|w| w.chars().next()).collect()
}

/// Gestalt pattern matching ratio of two strings, compared by character.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = Matcher::new(&a, &b).matched_len();
    (2 * matched) as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character in `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }
        if b.len() >= AUTOJUNK_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }
        Self { a, b, b2j }
    }

    /// Longest matching block within `a[alo..ahi]` and `b[blo..bhi]`, as
    /// `(i, j, size)`. Ties go to the earliest block in `a`, then in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j.checked_sub(1).and_then(|p| j2len.get(&p)).copied().unwrap_or(0) + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        // Grow across characters dropped from the index as too frequent.
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    fn matched_len(&self) -> usize {
        let mut matched = 0;
        let mut pending = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = pending.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                pending.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                pending.push((i + k, ahi, j + k, bhi));
            }
        }
        matched
    }
}
