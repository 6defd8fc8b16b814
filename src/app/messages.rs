//! User-facing strings. Every alert, label and placeholder the front ends show
//! comes from here so both languages stay complete.

use time::macros::format_description;
use time::OffsetDateTime;

use crate::app::commands::ValidationError;
use crate::app::guard::EntityKey;
use crate::app::view::FormField;
use crate::auth::{AuthError, AuthErrorCode};
use crate::config::Language;
use crate::storage::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Messages {
    language: Language,
}

impl Messages {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    fn pick(&self, en: &'static str, vi: &'static str) -> &'static str {
        match self.language {
            Language::En => en,
            Language::Vi => vi,
        }
    }

    pub fn untitled(&self) -> &'static str {
        self.pick("Untitled", "Không có tiêu đề")
    }

    pub fn no_tags(&self) -> &'static str {
        self.pick("No tags", "Không có thẻ")
    }

    pub fn all_notes(&self) -> &'static str {
        self.pick("All notes", "Tất cả ghi chú")
    }

    pub fn filter_label(&self, tag: &str) -> String {
        match self.language {
            Language::En => format!("Tag: {tag}"),
            Language::Vi => format!("Thẻ: {tag}"),
        }
    }

    pub fn no_notes(&self) -> &'static str {
        self.pick("No notes yet.", "Chưa có ghi chú nào.")
    }

    pub fn no_notes_under(&self, tag: &str) -> String {
        match self.language {
            Language::En => format!("No notes under tag \"{tag}\"."),
            Language::Vi => format!("Không có ghi chú nào trong thẻ \"{tag}\"."),
        }
    }

    pub fn add(&self) -> &'static str {
        self.pick("Add", "Thêm")
    }

    pub fn save(&self) -> &'static str {
        self.pick("Save", "Lưu")
    }

    pub fn ok(&self) -> &'static str {
        "OK"
    }

    pub fn field_label(&self, field: FormField) -> &'static str {
        match field {
            FormField::Email => "Email",
            FormField::Password => self.pick("Password", "Mật khẩu"),
            FormField::NoteTitle => self.pick("Title", "Tiêu đề"),
            FormField::NoteText => self.pick("Text", "Nội dung"),
            FormField::NoteTag => self.pick("Tag", "Thẻ"),
            FormField::TagName => self.pick("Name", "Tên"),
            FormField::TagColor => self.pick("Color", "Màu"),
        }
    }

    pub fn notes_heading(&self) -> &'static str {
        self.pick("Notes", "Ghi chú")
    }

    pub fn note_heading(&self) -> &'static str {
        self.pick("Note", "Ghi chú")
    }

    pub fn tags_heading(&self) -> &'static str {
        self.pick("Tags", "Thẻ")
    }

    pub fn loading(&self) -> &'static str {
        self.pick("Loading…", "Đang tải…")
    }

    pub fn tag_panel_hint(&self) -> &'static str {
        self.pick("press t to manage tags", "nhấn t để quản lý thẻ")
    }

    pub fn login_keys(&self) -> &'static str {
        self.pick(
            "Enter sign in • Ctrl-n register • Tab switch field • Esc quit",
            "Enter đăng nhập • Ctrl-n đăng ký • Tab đổi ô • Esc thoát",
        )
    }

    pub fn notes_keys(&self) -> &'static str {
        self.pick(
            "j/k move • e edit • d delete • n new • f/F filter • t tags • Ctrl-r reload • L logout • q quit",
            "j/k di chuyển • e sửa • d xóa • n thêm • f/F lọc • t thẻ • Ctrl-r tải lại • L đăng xuất • q thoát",
        )
    }

    pub fn compose_keys(&self) -> &'static str {
        self.pick(
            "Tab next field • ←/→ pick tag • Enter save • Esc back",
            "Tab ô kế • ←/→ chọn thẻ • Enter lưu • Esc quay lại",
        )
    }

    pub fn tag_list_keys(&self) -> &'static str {
        self.pick(
            "j/k move • e edit • d delete • n new tag • t collapse • Esc back",
            "j/k di chuyển • e sửa • d xóa • n thẻ mới • t thu gọn • Esc quay lại",
        )
    }

    pub fn tag_form_keys(&self) -> &'static str {
        self.pick(
            "Tab next field • ↑/↓ cycle colors • Enter save • Esc cancel",
            "Tab ô kế • ↑/↓ đổi màu • Enter lưu • Esc hủy",
        )
    }

    pub fn agree(&self) -> &'static str {
        self.pick("Confirm", "Đồng ý")
    }

    pub fn cancel(&self) -> &'static str {
        self.pick("Cancel", "Hủy")
    }

    pub fn confirm_delete_note(&self) -> &'static str {
        self.pick(
            "Are you sure you want to delete this note?",
            "Bạn có chắc chắn muốn xóa ghi chú này không?",
        )
    }

    pub fn confirm_delete_tag(&self, tag: &str) -> String {
        match self.language {
            Language::En => format!(
                "Deleting tag \"{tag}\" will move its notes to another tag. Are you sure?"
            ),
            Language::Vi => format!(
                "Xóa thẻ \"{tag}\" sẽ đặt lại thẻ của các ghi chú liên quan. Bạn chắc chứ?"
            ),
        }
    }

    pub fn note_not_found(&self) -> &'static str {
        self.pick(
            "Error: could not find the note.",
            "Lỗi: Không tìm thấy ghi chú.",
        )
    }

    pub fn tag_not_found(&self) -> &'static str {
        self.pick(
            "Error: could not find the tag to delete.",
            "Lỗi: Không tìm thấy thẻ để xóa.",
        )
    }

    pub fn validation(&self, err: &ValidationError) -> String {
        match err {
            ValidationError::EmptyNoteText => self
                .pick(
                    "Note text cannot be empty.",
                    "Nội dung ghi chú không được để trống.",
                )
                .to_string(),
            ValidationError::EmptyTagName => self
                .pick("Tag name cannot be empty.", "Tên thẻ không được để trống.")
                .to_string(),
            ValidationError::DuplicateTagName(_) => self
                .pick("This tag already exists.", "Thẻ này đã tồn tại.")
                .to_string(),
            ValidationError::InvalidColor(color) => match self.language {
                Language::En => format!("\"{color}\" is not a #rrggbb color."),
                Language::Vi => format!("\"{color}\" không phải màu dạng #rrggbb."),
            },
            ValidationError::LastTag => self
                .pick(
                    "The last tag cannot be deleted.",
                    "Không thể xóa thẻ cuối cùng.",
                )
                .to_string(),
        }
    }

    pub fn store_failed(&self, err: &StoreError) -> String {
        match self.language {
            Language::En => format!("Could not save your changes: {err}"),
            Language::Vi => format!("Không thể lưu thay đổi: {err}"),
        }
    }

    pub fn load_failed(&self, err: &StoreError) -> String {
        match self.language {
            Language::En => format!("Could not load your notes: {err}"),
            Language::Vi => format!("Không thể tải ghi chú: {err}"),
        }
    }

    pub fn busy(&self, key: EntityKey) -> String {
        match self.language {
            Language::En => format!("Still saving {key}, please wait."),
            Language::Vi => format!("Đang lưu {key}, vui lòng chờ."),
        }
    }

    pub fn auth_error(&self, err: &AuthError) -> String {
        let text = match err.code {
            AuthErrorCode::MissingCredentials => self.pick(
                "Please enter your email and password.",
                "Vui lòng nhập email và mật khẩu.",
            ),
            AuthErrorCode::WeakPassword => self.pick(
                "Password must be at least 6 characters.",
                "Mật khẩu phải có ít nhất 6 ký tự.",
            ),
            AuthErrorCode::EmailAlreadyInUse => {
                self.pick("This email is already in use.", "Email này đã được sử dụng.")
            }
            AuthErrorCode::InvalidCredentials => self.pick(
                "Incorrect email or password.",
                "Email hoặc mật khẩu không đúng.",
            ),
            AuthErrorCode::Internal => self.pick(
                "Something went wrong, please try again.",
                "Đã xảy ra lỗi, vui lòng thử lại.",
            ),
        };
        text.to_string()
    }

    /// Creation time as shown on a note card, in UTC.
    pub fn created_label(&self, created_at_ms: i64) -> String {
        let nanos = i128::from(created_at_ms) * 1_000_000;
        let Ok(moment) = OffsetDateTime::from_unix_timestamp_nanos(nanos) else {
            return created_at_ms.to_string();
        };
        let formatted = match self.language {
            Language::En => moment.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]"
            )),
            Language::Vi => moment.format(format_description!(
                "[hour]:[minute]:[second] [day]/[month]/[year]"
            )),
        };
        formatted.unwrap_or_else(|_| created_at_ms.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_language() {
        let en = Messages::new(Language::En);
        let vi = Messages::new(Language::Vi);
        assert_eq!(en.filter_label("Work"), "Tag: Work");
        assert_eq!(vi.filter_label("Work"), "Thẻ: Work");
        assert_eq!(en.no_notes_under("Work"), "No notes under tag \"Work\".");
        assert_eq!(vi.untitled(), "Không có tiêu đề");
    }

    #[test]
    fn screen_hints_follow_language() {
        let en = Messages::new(Language::En);
        let vi = Messages::new(Language::Vi);
        assert_eq!(en.loading(), "Loading…");
        assert_eq!(vi.loading(), "Đang tải…");
        assert!(en.login_keys().starts_with("Enter sign in"));
        assert!(vi.login_keys().starts_with("Enter đăng nhập"));
        assert_ne!(en.notes_keys(), vi.notes_keys());
        assert_eq!(vi.tag_panel_hint(), "nhấn t để quản lý thẻ");
        assert_eq!(en.field_label(FormField::Password), "Password");
        assert_eq!(vi.field_label(FormField::Password), "Mật khẩu");
    }

    #[test]
    fn created_label_formats_in_utc() {
        let en = Messages::new(Language::En);
        let vi = Messages::new(Language::Vi);
        // 2024-03-05 14:07:09 UTC
        let at = 1_709_647_629_000;
        assert_eq!(en.created_label(at), "2024-03-05 14:07");
        assert_eq!(vi.created_label(at), "14:07:09 05/03/2024");
    }

    #[test]
    fn auth_errors_map_to_friendly_text() {
        let en = Messages::new(Language::En);
        let err = AuthError::new(AuthErrorCode::WeakPassword, "short");
        assert_eq!(en.auth_error(&err), "Password must be at least 6 characters.");
    }
}
