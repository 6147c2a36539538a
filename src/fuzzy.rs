// 🔎 Fuzzy string similarity
// Partial-ratio scoring: how well the shorter string fits somewhere inside
// the longer one, on a 0-100 scale.

/// Plain similarity of two strings, 0-100
///
/// ratio = 100 * 2 * LCS / (len1 + len2), i.e. a normalized indel distance.
pub fn ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    ratio_chars(&a, &b)
}

/// Best ratio between the shorter string and any same-length window of the
/// longer one (plus the shorter partial windows hanging off either edge)
///
/// Example:
/// - partial_ratio("starbucks", "pos starbucks 5521") = 100
/// - partial_ratio("starbucks", "starbuck coffee") ≈ 94 (prefix "starbuck")
/// - partial_ratio("", anything) = 0
pub fn partial_ratio(s1: &str, s2: &str) -> f64 {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    let (needle, hay) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let m = needle.len();
    let n = hay.len();

    if m == 0 {
        return 0.0;
    }

    let mut best: f64 = 0.0;

    // Partial windows at the left edge
    for end in 1..m {
        best = best.max(ratio_chars(&needle, &hay[..end]));
    }

    // Full-length windows
    for start in 0..=(n - m) {
        best = best.max(ratio_chars(&needle, &hay[start..start + m]));
        if best >= 100.0 {
            return 100.0;
        }
    }

    // Partial windows at the right edge
    for start in (n - m + 1)..n {
        best = best.max(ratio_chars(&needle, &hay[start..]));
    }

    best
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    let lcs = lcs_length(a, b);
    100.0 * (2 * lcs) as f64 / total as f64
}

/// Longest common subsequence length (two-row DP)
fn lcs_length(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                std::cmp::max(prev[j + 1], curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ============================================================================
// TESTS
// ============================================================================
