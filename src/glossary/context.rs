//! Page-context detection from keywords.
//! Ties between pages resolve to the earlier row of `PAGE_CONTEXTS`.

use std::collections::HashSet;

use crate::glossary::tokenizer::split_words;
use crate::korean::stem;

struct PageContext {
    path: &'static str,
    description: &'static str,
    keywords: &'static [&'static str],
}

const PAGE_CONTEXTS: &[PageContext] = &[
    PageContext {
        path: "/goods",
        description: "Merchandise (goods) product listing and detail page",
        keywords: &["굿즈", "상품", "포토카드", "응원봉", "앨범", "한정판", "품절", "재입고", "사이즈", "옵션"],
    },
    PageContext {
        path: "/cart",
        description: "Shopping cart page",
        keywords: &["장바구니", "담기", "수량", "삭제", "선택 상품"],
    },
    PageContext {
        path: "/order",
        description: "Checkout, payment and order tracking page",
        keywords: &["주문", "결제", "배송", "배송지", "주문내역", "송장", "결제수단", "무통장"],
    },
    PageContext {
        path: "/mypage",
        description: "User account page (profile, points, coupons)",
        keywords: &["내 정보", "마이페이지", "회원정보", "비밀번호", "포인트", "쿠폰", "로그아웃"],
    },
    PageContext {
        path: "/event",
        description: "Fan event and lucky-draw page",
        keywords: &["이벤트", "응모", "당첨", "추첨", "팬사인회", "영상통화", "당첨자"],
    },
    PageContext {
        path: "/membership",
        description: "Official fan club membership page",
        keywords: &["멤버십", "팬클럽", "가입", "갱신", "혜택", "회원권"],
    },
    PageContext {
        path: "/artist",
        description: "Artist profile and content page",
        keywords: &["아티스트", "멤버", "컴백", "데뷔", "뮤직비디오", "콘서트", "투어"],
    },
    PageContext {
        path: "/support",
        description: "Customer support: inquiries, refunds and exchanges",
        keywords: &["문의", "고객센터", "환불", "교환", "반품", "취소", "자주 묻는 질문"],
    },
    PageContext {
        path: "/notice",
        description: "Notice board and announcements",
        keywords: &["공지", "공지사항", "안내", "점검"],
    },
];

/// Best-matching page path for `text`, or `None` when no keyword hits.
pub fn detect_context(text: &str) -> Option<&'static str> {
    let input_stems: HashSet<String> = split_words(text).iter().flat_map(|w| stem(w)).collect();
    if input_stems.is_empty() {
        return None;
    }

    let mut best: Option<(&'static str, usize)> = None;
    for page in PAGE_CONTEXTS {
        let hits = page
            .keywords
            .iter()
            .filter(|kw| {
                let kw_stems = stem(kw);
                kw_stems.iter().any(|s| input_stems.contains(s)) || text.contains(*kw)
            })
            .count();
        if hits == 0 {
            continue;
        }
        // Strictly greater: the first page in table order keeps ties.
        if best.map_or(true, |(_, score)| hits > score) {
            best = Some((page.path, hits));
        }
    }
    best.map(|(path, _)| path)
}

/// Human-readable description of a page path, matched by prefix.
pub fn context_description(page_url: &str) -> Option<&'static str> {
    let page_url = page_url.trim();
    if page_url.is_empty() {
        return None;
    }
    PAGE_CONTEXTS
        .iter()
        .find(|p| path_within(page_url, p.path))
        .map(|p| p.description)
}

/// True when `path` is `prefix` or lies below it on a segment boundary.
/// The root path `/` is below nothing and above nothing.
pub(crate) fn path_within(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    !prefix.is_empty()
        && (path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_by_stem() {
        assert_eq!(detect_context("포토카드를 구매하고 싶어요"), Some("/goods"));
        assert_eq!(detect_context("배송은 언제 시작되나요?"), Some("/order"));
    }

    #[test]
    fn test_detects_multi_word_keyword_by_substring() {
        assert_eq!(detect_context("내 정보 수정"), Some("/mypage"));
    }

    #[test]
    fn test_no_hits() {
        assert_eq!(detect_context("안녕하세요"), None);
        assert_eq!(detect_context(""), None);
    }

    #[test]
    fn test_highest_score_wins() {
        // one /goods hit (앨범), two /event hits (응모, 당첨)
        assert_eq!(detect_context("앨범 응모 당첨 발표"), Some("/event"));
    }

    #[test]
    fn test_tie_keeps_table_order() {
        // one /goods hit and one /order hit
        assert_eq!(detect_context("굿즈 결제"), Some("/goods"));
    }

    #[test]
    fn test_path_within_respects_segments() {
        assert!(path_within("/goods", "/goods"));
        assert!(path_within("/goods/12", "/goods"));
        assert!(!path_within("/goodsx", "/goods"));
        assert!(path_within("/goods/12", "/goods/"));
        assert!(!path_within("/goods", "/"));
        assert!(!path_within("/goods", ""));
    }

    #[test]
    fn test_description() {
        assert!(context_description("/goods/123").is_some());
        assert!(context_description("/order").is_some());
        assert!(context_description("/goodsx").is_none());
        assert!(context_description("").is_none());
    }
}
