//! Tests for thoughtlink-core: types, config, protocol frames, errors

use thoughtlink_core::*;

// ===========================================================================
// PlatformId / Role
// ===========================================================================

#[test]
fn platform_id_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&PlatformId::Chatgpt).unwrap(), r#""chatgpt""#);
    assert_eq!(serde_json::to_string(&PlatformId::Claude).unwrap(), r#""claude""#);
    assert_eq!(serde_json::to_string(&PlatformId::Unsupported).unwrap(), r#""unsupported""#);
}

#[test]
fn platform_id_from_str_roundtrip() {
    for p in PlatformId::SUPPORTED {
        let parsed: PlatformId = p.as_str().parse().unwrap();
        assert_eq!(parsed, p);
    }
    assert!("myspace".parse::<PlatformId>().is_err());
}

#[test]
fn role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), r#""user""#);
    assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), r#""assistant""#);
}

// ===========================================================================
// ConversationMessage
// ===========================================================================

#[test]
fn content_hash_ignores_id_and_whitespace() {
    let a = ConversationMessage::assistant("m1", "Hello   world", PlatformId::Claude);
    let b = ConversationMessage::assistant("m2", "Hello world\n", PlatformId::Claude);
    assert_eq!(a.content_hash(), b.content_hash());
}

#[test]
fn content_hash_distinguishes_role_and_platform() {
    let a = ConversationMessage::assistant("m1", "same", PlatformId::Claude);
    let b = ConversationMessage::user("m1", "same", PlatformId::Claude);
    let c = ConversationMessage::assistant("m1", "same", PlatformId::Gemini);
    assert_ne!(a.content_hash(), b.content_hash());
    assert_ne!(a.content_hash(), c.content_hash());
}

#[test]
fn identity_hash_separates_repeated_text() {
    let first = ConversationMessage::user("u1", "Can you explain that again?", PlatformId::Chatgpt);
    let second = ConversationMessage::user("u2", "Can you explain that again?", PlatformId::Chatgpt);
    assert_eq!(first.content_hash(), second.content_hash());
    assert_ne!(first.identity_hash(), second.identity_hash());

    let rerendered = ConversationMessage::user("u1", "Can you explain   that again?\n", PlatformId::Chatgpt);
    assert_eq!(first.identity_hash(), rerendered.identity_hash());
}

#[test]
fn message_without_timestamp_skips_field() {
    let msg = ConversationMessage::user("u1", "hi", PlatformId::Chatgpt);
    let json = serde_json::to_string(&msg).unwrap();
    assert!(!json.contains("timestamp"));
}

// ===========================================================================
// ConversationKey
// ===========================================================================

#[test]
fn conversation_key_from_chat_url() {
    let key = ConversationKey::from_url(PlatformId::Chatgpt, "https://chatgpt.com/c/abc-123").unwrap();
    assert_eq!(key.as_str(), "chatgpt:abc-123");
}

#[test]
fn conversation_key_ignores_trailing_slash_and_query() {
    let key = ConversationKey::from_url(PlatformId::Claude, "https://claude.ai/chat/xyz/?model=opus").unwrap();
    assert_eq!(key.as_str(), "claude:xyz");
}

#[test]
fn conversation_key_bare_origin_is_new() {
    let key = ConversationKey::from_url(PlatformId::Gemini, "https://gemini.google.com/").unwrap();
    assert_eq!(key.as_str(), "gemini:new");
}

#[test]
fn conversation_key_rejects_garbage() {
    assert!(ConversationKey::from_url(PlatformId::Gemini, "not a url").is_err());
}

// ===========================================================================
// Cursor
// ===========================================================================

#[test]
fn cursor_supersedes_only_forward_and_newer() {
    let t0 = chrono::Utc::now();
    let t1 = t0 + chrono::Duration::seconds(1);
    let m = ConversationMessage::user("u1", "hi", PlatformId::Claude);
    let old = Cursor::after(&m, 1, t0);
    let newer = Cursor::after(&m, 2, t1);
    assert!(newer.supersedes(&old));
    assert!(!old.supersedes(&newer));

    // Newer timestamp but lower position: never moves backwards.
    let backwards = Cursor { position: 0, ..newer.clone() };
    assert!(!backwards.supersedes(&old));
}

// ===========================================================================
// ShareConfig
// ===========================================================================

#[test]
fn contribution_level_bounds() {
    assert!(ContributionLevel::new(0).is_err());
    assert!(ContributionLevel::new(6).is_err());
    assert_eq!(ContributionLevel::new(5).unwrap(), ContributionLevel::MAX);
}

#[test]
fn share_config_camel_case_wire_names() {
    let json = serde_json::to_value(ShareConfig::default()).unwrap();
    assert_eq!(json["autoShare"], true);
    assert_eq!(json["contributionLevel"], 3);
    assert_eq!(json["anonymousMode"], false);
    assert_eq!(json["filterSensitivity"], "medium");
}

#[test]
fn share_config_rejects_out_of_range_level() {
    let err = serde_json::from_str::<ShareConfig>(r#"{"contributionLevel": 9}"#);
    assert!(err.is_err());
}

#[test]
fn share_config_partial_uses_defaults() {
    let cfg: ShareConfig = serde_json::from_str(r#"{"anonymousMode": true}"#).unwrap();
    assert!(cfg.anonymous_mode);
    assert!(cfg.auto_share);
    assert_eq!(cfg.filter_sensitivity, FilterSensitivity::Medium);
}

#[test]
fn filter_sensitivity_parse() {
    assert_eq!("HIGH".parse::<FilterSensitivity>().unwrap(), FilterSensitivity::High);
    assert!("extreme".parse::<FilterSensitivity>().is_err());
}

// ===========================================================================
// Protocol
// ===========================================================================

#[test]
fn thought_record_wire_format() {
    let record = ThoughtRecord {
        source_message_id: "a1".into(),
        content: "idea".into(),
        contribution_level: 4,
        anonymized: false,
        platform: Some(PlatformId::Claude),
        extracted_at: None,
    };
    let json = serde_json::to_value(&ThoughtBatch { thoughts: vec![record] }).unwrap();
    let t = &json["thoughts"][0];
    assert_eq!(t["sourceMessageId"], "a1");
    assert_eq!(t["contributionLevel"], 4);
    assert_eq!(t["platform"], "claude");
    assert!(t.get("extractedAt").is_none());
}

#[test]
fn accepted_response_tolerates_missing_field() {
    let resp: AcceptedResponse = serde_json::from_str("{}").unwrap();
    assert!(resp.accepted.is_empty());
}

#[test]
fn hello_frame_shape() {
    let json = serde_json::to_value(ClientFrame::hello("inst-1", 2)).unwrap();
    assert_eq!(json["type"], "hello");
    assert_eq!(json["instance"], "inst-1");
    assert_eq!(json["contributionLevel"], 2);
    assert!(json["client"].as_str().unwrap().starts_with("thoughtlink/"));
}

#[test]
fn service_frame_insight_parses() {
    let frame = ServiceFrame::parse(
        r#"{"type":"insight","insight":{"id":"X","content":"c","origin":"peer","receivedAt":"2026-01-01T00:00:00Z"}}"#,
    )
    .unwrap();
    match frame {
        ServiceFrame::Insight { insight } => {
            assert_eq!(insight.id, "X");
            assert_eq!(insight.origin, "peer");
        }
        other => panic!("Expected insight, got {:?}", other),
    }
}

#[test]
fn service_frame_insight_without_received_at_is_stamped() {
    let frame = ServiceFrame::parse(r#"{"type":"insight","insight":{"id":"Y","content":"c"}}"#).unwrap();
    assert!(matches!(frame, ServiceFrame::Insight { .. }));
}

#[test]
fn service_frame_reject_and_welcome() {
    assert_eq!(ServiceFrame::parse(r#"{"type":"welcome"}"#).unwrap(), ServiceFrame::Welcome);
    match ServiceFrame::parse(r#"{"type":"reject","reason":"busy"}"#).unwrap() {
        ServiceFrame::Reject { reason } => assert_eq!(reason, "busy"),
        other => panic!("Expected reject, got {:?}", other),
    }
}

#[test]
fn service_frame_malformed_is_error() {
    assert!(ServiceFrame::parse("not json").is_err());
    assert!(ServiceFrame::parse(r#"{"type":"mystery"}"#).is_err());
    assert!(ServiceFrame::parse(r#"{"type":"insight"}"#).is_err());
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_display() {
    assert_eq!(
        Error::InvalidContributionLevel(7).to_string(),
        "invalid contribution level: 7 (expected 1-5)"
    );
    assert_eq!(Error::storage("disk full").to_string(), "storage error: disk full");
}
