//! Prompt assembly.
//!
//! Two personas share one backend. Grounded answers get the retrieved
//! excerpts inlined into the system prompt with numbered citations;
//! conversational turns get a plain assistant persona that stays polite and
//! steers off-topic questions back to Vietnamese law.

use crate::corpus::RecordKind;
use crate::rag::retriever::RetrievedChunk;

const GROUNDED_PREAMBLE: &str = "Bạn là trợ lý pháp lý của LuatViet, chuyên về pháp luật Việt Nam. \
     Trả lời bằng tiếng Việt, ngắn gọn và chính xác, CHỈ dựa trên các trích đoạn được cung cấp dưới đây. \
     Khi trích dẫn, nêu rõ tên văn bản hoặc bài viết nguồn. \
     Nếu trích đoạn không đủ thông tin để trả lời, hãy nói rõ điều đó, đưa ra hướng dẫn chung \
     và khuyến nghị người dùng đặt lịch tư vấn với luật sư của LuatViet. \
     Không bịa thêm điều luật hay con số không có trong trích đoạn.";

const CONVERSATIONAL_PERSONA: &str = "Bạn là trợ lý thân thiện của LuatViet, một nền tảng dịch vụ pháp lý tại Việt Nam. \
     Trả lời bằng tiếng Việt, lịch sự và ngắn gọn. \
     Với câu hỏi ngoài lĩnh vực pháp luật, trả lời ở mức khái quát và cho biết bạn hỗ trợ tốt \
     nhất với các thắc mắc pháp luật Việt Nam. Không từ chối cộc lốc.";

fn kind_label(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Act => "Văn bản luật",
        RecordKind::Faq => "Hỏi đáp",
        RecordKind::Article => "Bài viết",
    }
}

/// System prompt for a grounded answer: persona plus the retrieved excerpts
/// as numbered, source-labeled blocks.
pub fn grounded_system(chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(GROUNDED_PREAMBLE);
    prompt.push_str("\n\nTrích đoạn:\n\n");
    for (i, retrieved) in chunks.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({}: {})\n{}\n\n",
            i + 1,
            kind_label(retrieved.chunk.kind),
            retrieved.chunk.title,
            retrieved.chunk.text
        ));
    }
    prompt.trim_end().to_string()
}

/// System prompt for questions answered without corpus grounding.
pub fn conversational_system() -> &'static str {
    CONVERSATIONAL_PERSONA
}
