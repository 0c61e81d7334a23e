/// Compute effective limit with precedence: global flag -> fallback.
#[must_use]
pub fn effective_limit(flag: Option<u32>, fallback: u32) -> u32 {
    flag.filter(|limit| *limit > 0).unwrap_or(fallback)
}
