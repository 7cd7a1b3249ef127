//! Flag tokens, flag sets and message identity.

use mailclone::replicate::types::{Flag, FlagSet, MessageRecord};
use pretty_assertions::assert_eq;

// ---------------------------------------------------------------------------
// Flag parsing
// ---------------------------------------------------------------------------

#[test]
fn test_parse_system_flags() {
    assert_eq!(Flag::parse("\\Seen"), Flag::Seen);
    assert_eq!(Flag::parse("\\Answered"), Flag::Answered);
    assert_eq!(Flag::parse("\\Flagged"), Flag::Flagged);
    assert_eq!(Flag::parse("\\Deleted"), Flag::Deleted);
    assert_eq!(Flag::parse("\\Draft"), Flag::Draft);
    assert_eq!(Flag::parse("\\Recent"), Flag::Recent);
    assert_eq!(Flag::parse("\\Indexed"), Flag::Indexed);
}

#[test]
fn test_parse_is_case_insensitive_for_system_flags() {
    assert_eq!(Flag::parse("\\SEEN"), Flag::Seen);
    assert_eq!(Flag::parse("\\recent"), Flag::Recent);
}

#[test]
fn test_parse_keeps_keywords_verbatim() {
    assert_eq!(Flag::parse("$Forwarded"), Flag::Other("$Forwarded".to_string()));
    assert_eq!(Flag::parse("$Forwarded").to_string(), "$Forwarded");
}

#[test]
fn test_transient_flags() {
    assert!(Flag::Recent.is_transient());
    assert!(Flag::Indexed.is_transient());
    assert!(!Flag::Seen.is_transient());
    assert!(!Flag::Other("$Junk".to_string()).is_transient());
}

// ---------------------------------------------------------------------------
// Flag sets
// ---------------------------------------------------------------------------

#[test]
fn test_clean_flags_removes_transient_markers() {
    let flags = FlagSet::parse("\\Seen \\Recent \\Indexed \\Flagged");
    assert_eq!(flags.cleaned().to_string(), "\\Seen \\Flagged");
}

#[test]
fn test_clean_flags_only_transient_yields_empty() {
    let flags = FlagSet::parse("\\Recent \\Indexed");
    let cleaned = flags.cleaned();
    assert!(cleaned.is_empty());
    assert_eq!(cleaned.to_string(), "");
}

#[test]
fn test_flag_set_preserves_order_and_ignores_duplicates() {
    let flags = FlagSet::parse("  \\Flagged   \\Seen \\Flagged $Work ");
    assert_eq!(flags.len(), 3);
    assert_eq!(flags.to_string(), "\\Flagged \\Seen $Work");
}

#[test]
fn test_flag_set_empty_text() {
    assert!(FlagSet::parse("").is_empty());
    assert!(FlagSet::parse("   ").is_empty());
}

#[test]
fn test_flag_set_contains() {
    let flags = FlagSet::parse("\\Seen \\Deleted");
    assert!(flags.contains(&Flag::Deleted));
    assert!(!flags.contains(&Flag::Draft));
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn test_same_message_ignores_flags() {
    let a = MessageRecord {
        folder: "INBOX".to_string(),
        flags: FlagSet::parse("\\Seen"),
        internal_timestamp: 1_700_000_000,
        body: b"Subject: hi\r\n\r\nbody".to_vec(),
    };
    let mut b = a.clone();
    b.flags = FlagSet::parse("\\Flagged");
    assert!(a.same_message(&b));

    b.folder = "Archive".to_string();
    assert!(!a.same_message(&b));
}
