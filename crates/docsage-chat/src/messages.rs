//! Fixed user-facing messages. Kept in the audience's language.

/// Returned for a blank question; retrieval is not attempted.
pub const EMPTY_QUERY_MESSAGE: &str = "Vui lòng nhập câu hỏi.";

/// Returned when nothing relevant was retrieved or the generator produced
/// no usable answer.
pub const NOT_FOUND_MESSAGE: &str = "Không tìm thấy thông tin này trong tài liệu nội bộ.";
