//! Normalizer - 텍스트 정규화 및 토큰화
//!
//! 질문/별칭/사용자 입력을 비교 가능한 토큰 집합으로 변환합니다.
//! ASCII 소문자화만 수행하며 로케일 의존 처리는 하지 않습니다.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// 토큰 집합 (중복 제거, 순서 무관)
pub type TokenSet = HashSet<String>;

/// `[a-z0-9]`와 공백을 제외한 문자
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s]").expect("non-alnum regex"));

/// 연속 공백
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

// ============================================================================
// Normalization
// ============================================================================

/// 텍스트 정규화
///
/// 1. ASCII 소문자화
/// 2. `[a-z0-9]`/공백 이외 문자 -> 공백
/// 3. 연속 공백 -> 공백 하나
/// 4. 앞뒤 공백 제거
///
/// 비 ASCII 문자는 소문자화되지 않고 공백으로 치환됩니다.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_ascii_lowercase();
    let replaced = NON_ALNUM.replace_all(&lowered, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&replaced, " ");
    collapsed.trim().to_string()
}

/// 텍스트를 토큰 집합으로 분할
///
/// 빈 문자열이나 공백만 있는 입력은 빈 집합을 반환합니다.
pub fn tokenize(text: &str) -> TokenSet {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("How do I Reset my PASSWORD?"), "how do i reset my password");
        assert_eq!(normalize("  e-mail\t\tsupport!!  "), "e mail support");
        assert_eq!(normalize("cash_back 2024"), "cash back 2024");
    }

    #[test]
    fn test_normalize_non_ascii() {
        // 비 ASCII 문자는 공백이 됨
        assert_eq!(normalize("café olé"), "caf ol");
        assert_eq!(normalize("비밀번호 reset"), "reset");
        assert_eq!(normalize("ÄBC"), "bc");
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "",
            "   ",
            "Hello, World!",
            "I forgot my password, how to reset",
            "  tabs\tand\nnewlines\r\n ",
            "ünïcödé — dashes… and “quotes”",
            "123-456_789",
        ];

        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ").is_empty());
        assert!(tokenize("?!...").is_empty());
    }

    #[test]
    fn test_tokenize_dedup() {
        let tokens = tokenize("reset reset RESET password");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("reset"));
        assert!(tokens.contains("password"));
    }
}
