//! Confirmation policy for step side effects.

use crate::core::types::StepKind;

/// Whether a step kind must be confirmed before its side effect runs.
///
/// `GOOGLE_SEARCH` is an HTTP GET against a search engine and is confirmed the
/// same way. Reading a file and asking the user a question are not.
pub fn requires_confirmation(kind: StepKind) -> bool {
    match kind {
        StepKind::CreateFile
        | StepKind::CreateDir
        | StepKind::EditFile
        | StepKind::DeleteFile
        | StepKind::RunShell
        | StepKind::HttpRequestGet
        | StepKind::GoogleSearch => true,
        StepKind::RequestFile
        | StepKind::QueryUser
        | StepKind::CodeOperation
        | StepKind::Done => false,
    }
}

/// Interpret a free-text confirmation answer.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("yes") || answer.eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destructive_and_external_steps_need_confirmation() {
        for kind in [
            StepKind::CreateFile,
            StepKind::CreateDir,
            StepKind::EditFile,
            StepKind::DeleteFile,
            StepKind::RunShell,
            StepKind::HttpRequestGet,
            StepKind::GoogleSearch,
        ] {
            assert!(requires_confirmation(kind), "{}", kind.tag());
        }
        assert!(!requires_confirmation(StepKind::RequestFile));
        assert!(!requires_confirmation(StepKind::QueryUser));
        assert!(!requires_confirmation(StepKind::Done));
    }

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative(" YES\n"));
        assert!(is_affirmative("y"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yes please"));
    }
}
