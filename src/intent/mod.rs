//! Conversational intent routing.
//!
//! High-frequency conversational turns (greetings, thanks, "who are you",
//! questions about the firm's lawyers) carry no retrieval value, so the
//! engine answers them from a fixed reply table instead of paying for
//! embedding and generation. The rule cascade is evaluated top-down and the
//! first match wins; overlapping inputs like "xin chào luật sư" are
//! deterministic because precedence is exactly the declaration order below.

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    SmallTalk,
    IdentityQuery,
    LegalAdviceMeta,
    GenericLegalMeta,
    SpecificLawyerQuery,
    GeneralLawyerInfo,
    None,
}

const GREETING_REPLY: &str =
    "Xin chào! Tôi là trợ lý pháp lý của LuatViet. Bạn cần hỗ trợ vấn đề pháp lý nào hôm nay?";

const SMALL_TALK_REPLY: &str =
    "Rất vui được hỗ trợ bạn! Nếu còn thắc mắc pháp lý nào khác, bạn cứ nhắn cho tôi nhé.";

const IDENTITY_REPLY: &str = "Tôi là trợ lý ảo của LuatViet, được xây dựng để giải đáp các thắc mắc \
     pháp luật Việt Nam thường gặp. Với vấn đề phức tạp, bạn nên đặt lịch tư vấn cùng luật sư.";

const LEGAL_ADVICE_META_REPLY: &str = "LuatViet cung cấp dịch vụ tư vấn pháp luật trực tuyến. Bạn có thể đặt câu hỏi ngay \
     tại đây, hoặc đặt lịch hẹn với luật sư trong mục \"Đặt lịch tư vấn\" của ứng dụng.";

const GENERIC_LEGAL_META_REPLY: &str = "Pháp luật là hệ thống quy tắc xử sự chung do Nhà nước ban hành và bảo đảm thực \
     hiện. Bạn muốn tìm hiểu lĩnh vực cụ thể nào: hôn nhân gia đình, đất đai, lao động hay hình sự?";

const SPECIFIC_LAWYER_REPLY: &str = "Bạn có thể xem hồ sơ chi tiết của từng luật sư trong mục \"Đội ngũ luật sư\" trên \
     ứng dụng LuatViet, gồm chuyên môn, kinh nghiệm và lịch trống.";

const GENERAL_LAWYER_REPLY: &str = "LuatViet có đội ngũ luật sư giàu kinh nghiệm trong các lĩnh vực hôn nhân gia đình, \
     đất đai, doanh nghiệp, lao động và hình sự. Bạn có thể đặt lịch tư vấn trực tiếp trên ứng dụng.";

/// Substrings that mark a question as worth a corpus lookup.
const LEGAL_KEYWORDS: &[&str] = &[
    "luật",
    "pháp lý",
    "pháp luật",
    "nghị định",
    "thông tư",
    "điều",
    "khoản",
    "hợp đồng",
    "kết hôn",
    "ly hôn",
    "thừa kế",
    "di chúc",
    "đất đai",
    "sổ đỏ",
    "tranh chấp",
    "khởi kiện",
    "tòa án",
    "bồi thường",
    "phạt",
    "hình sự",
    "dân sự",
    "lao động",
    "bảo hiểm",
    "thuế",
    "doanh nghiệp",
    "giấy phép",
    "quyền",
    "nghĩa vụ",
    "thủ tục",
];

pub struct IntentRouter {
    rules: Vec<(Regex, Intent)>,
    min_retrieval_chars: usize,
}

impl IntentRouter {
    pub fn new(min_retrieval_chars: usize) -> Self {
        // Order matters: earlier rules shadow later ones.
        let patterns: &[(&str, Intent)] = &[
            (
                r"(?i)^\s*(xin\s+chào|chào\s+(bạn|anh|chị|em|buổi|luật\s*sư)|chào\b|hello|helo|hi\b|hey\b|alo\b)",
                Intent::Greeting,
            ),
            (
                r"(?i)\b(cảm\s*ơn|cám\s*ơn|thank\s*you|thanks|tks|tạm\s+biệt|bye|goodbye|hẹn\s+gặp\s+lại|ok|oke|okay)\b",
                Intent::SmallTalk,
            ),
            (
                r"(?i)(bạn\s+là\s+ai|em\s+là\s+ai|bạn\s+tên\s+(là\s+)?gì|ai\s+tạo\s+ra\s+bạn|bạn\s+là\s+(người|robot|máy)|who\s+are\s+you)",
                Intent::IdentityQuery,
            ),
            (
                r"(?i)(dịch\s+vụ\s+tư\s+vấn|tư\s+vấn\s+miễn\s+phí|đặt\s+lịch\s+(hẹn|tư\s+vấn)|(phí|chi\s+phí|giá)\s+tư\s+vấn|có\s+tư\s+vấn\s+.{0,30}không)",
                Intent::LegalAdviceMeta,
            ),
            (
                r"(?i)(pháp\s+luật\s+là\s+gì|luật\s+pháp\s+là\s+gì|khái\s+niệm\s+pháp\s+luật|\bluật\s+là\s+gì)",
                Intent::GenericLegalMeta,
            ),
            (
                r"(?i)(luật\s*sư\s+(nào|giỏi|tốt\s+nhất|chuyên\s+về|tên)|tìm\s+luật\s*sư|thông\s+tin\s+(về\s+)?luật\s*sư|liên\s+hệ\s+luật\s*sư|số\s+điện\s+thoại\s+.{0,20}luật\s*sư)",
                Intent::SpecificLawyerQuery,
            ),
            (
                r"(?i)(luật\s*sư|văn\s+phòng\s+luật|công\s+ty\s+luật)",
                Intent::GeneralLawyerInfo,
            ),
        ];

        let rules = patterns
            .iter()
            .map(|(pattern, intent)| {
                let regex = Regex::new(pattern).expect("intent pattern should compile");
                (regex, *intent)
            })
            .collect();

        Self {
            rules,
            min_retrieval_chars,
        }
    }

    /// Matches `question` against the cascade; the first matching rule wins.
    pub fn classify(&self, question: &str) -> Intent {
        for (regex, intent) in &self.rules {
            if regex.is_match(question) {
                return *intent;
            }
        }
        Intent::None
    }

    /// Fixed reply for a routable intent, `None` when the question should go
    /// through the pipeline.
    pub fn canned_reply(&self, intent: Intent) -> Option<&'static str> {
        match intent {
            Intent::Greeting => Some(GREETING_REPLY),
            Intent::SmallTalk => Some(SMALL_TALK_REPLY),
            Intent::IdentityQuery => Some(IDENTITY_REPLY),
            Intent::LegalAdviceMeta => Some(LEGAL_ADVICE_META_REPLY),
            Intent::GenericLegalMeta => Some(GENERIC_LEGAL_META_REPLY),
            Intent::SpecificLawyerQuery => Some(SPECIFIC_LAWYER_REPLY),
            Intent::GeneralLawyerInfo => Some(GENERAL_LAWYER_REPLY),
            Intent::None => None,
        }
    }

    /// Decides whether an unrouted question looks substantive enough to be
    /// worth a corpus lookup: any legal keyword, or enough length that the
    /// user is plainly describing a situation.
    pub fn is_legal_question(&self, question: &str) -> bool {
        let lowered = question.to_lowercase();
        if LEGAL_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            return true;
        }
        question.chars().count() >= self.min_retrieval_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> IntentRouter {
        IntentRouter::new(60)
    }

    #[test]
    fn greets_in_several_spellings() {
        let router = router();
        assert_eq!(router.classify("Xin chào"), Intent::Greeting);
        assert_eq!(router.classify("chào buổi sáng"), Intent::Greeting);
        assert_eq!(router.classify("  hello  "), Intent::Greeting);
        assert_eq!(router.classify("XIN CHÀO"), Intent::Greeting);
    }

    #[test]
    fn greeting_wins_over_lawyer_mention() {
        // Both the greeting and the lawyer catch-all match; the cascade
        // order must make this a greeting.
        assert_eq!(router().classify("xin chào luật sư"), Intent::Greeting);
    }

    #[test]
    fn thanks_and_goodbyes_are_small_talk() {
        let router = router();
        assert_eq!(router.classify("cảm ơn bạn nhé"), Intent::SmallTalk);
        assert_eq!(router.classify("ok cám ơn"), Intent::SmallTalk);
        assert_eq!(router.classify("tạm biệt"), Intent::SmallTalk);
    }

    #[test]
    fn identity_questions_are_routed() {
        let router = router();
        assert_eq!(router.classify("bạn là ai vậy?"), Intent::IdentityQuery);
        assert_eq!(router.classify("ai tạo ra bạn"), Intent::IdentityQuery);
    }

    #[test]
    fn service_questions_hit_advice_meta() {
        let router = router();
        assert_eq!(router.classify("bên mình có tư vấn miễn phí không?"), Intent::LegalAdviceMeta);
        assert_eq!(router.classify("phí tư vấn bao nhiêu"), Intent::LegalAdviceMeta);
    }

    #[test]
    fn what_is_law_hits_generic_meta() {
        assert_eq!(router().classify("pháp luật là gì?"), Intent::GenericLegalMeta);
    }

    #[test]
    fn lawyer_lookup_beats_lawyer_catch_all() {
        let router = router();
        assert_eq!(
            router.classify("tìm luật sư chuyên về ly hôn"),
            Intent::SpecificLawyerQuery
        );
        assert_eq!(
            router.classify("văn phòng luật của các bạn ở đâu"),
            Intent::GeneralLawyerInfo
        );
    }

    #[test]
    fn substantive_legal_questions_fall_through() {
        let router = router();
        assert_eq!(router.classify("thủ tục ly hôn cần giấy tờ gì?"), Intent::None);
        assert_eq!(
            router.classify("mức phạt nồng độ cồn với xe máy là bao nhiêu?"),
            Intent::None
        );
    }

    #[test]
    fn every_routable_intent_has_a_reply() {
        let router = router();
        for intent in [
            Intent::Greeting,
            Intent::SmallTalk,
            Intent::IdentityQuery,
            Intent::LegalAdviceMeta,
            Intent::GenericLegalMeta,
            Intent::SpecificLawyerQuery,
            Intent::GeneralLawyerInfo,
        ] {
            let reply = router.canned_reply(intent);
            assert!(reply.is_some_and(|r| !r.is_empty()), "no reply for {intent:?}");
        }
        assert!(router.canned_reply(Intent::None).is_none());
    }

    #[test]
    fn keyword_marks_a_question_as_legal() {
        let router = router();
        assert!(router.is_legal_question("thủ tục ly hôn"));
        assert!(router.is_legal_question("mức phạt vượt đèn đỏ"));
        assert!(!router.is_legal_question("trời hôm nay đẹp quá"));
    }

    #[test]
    fn long_questions_are_legal_by_length() {
        let router = router();
        let long = "hàng xóm xây nhà lấn sang phần sân nhà tôi hai mét và không chịu tháo dỡ thì tôi nên làm gì";
        assert!(long.chars().count() >= 60);
        assert!(router.is_legal_question(long));
    }
}
