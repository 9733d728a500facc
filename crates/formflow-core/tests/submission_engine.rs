//! End-to-end tests of the submission engine against a scripted site.

mod common;

use common::{fast_settings, harness, harness_with, Script};
use std::collections::HashSet;
use std::time::Duration;
use formflow_core::{
    retry_submission_id, FieldMapping, FieldValue, FormRecord, FormflowError, InputKind, Jitter,
    LogEntry, LogLevel, MarkerPrecedence, ParsedFields, SiteStep, SubmissionStatus, TargetConfig,
    SITE_ERROR_MESSAGE, UNCERTAIN_OUTCOME_MESSAGE,
};

const SUCCESS: &str = "Application received";
const ERROR: &str = "Please correct the errors";

fn vehicle_form() -> FormRecord {
    let mut fields = ParsedFields::new();
    fields.insert("owner".into(), FieldValue::from("John Smith"));
    fields.insert("vin".into(), FieldValue::from("JT2BF22K1W0123456"));
    FormRecord::new("registration.pdf", 48_213, "user-1", fields)
}

fn target() -> TargetConfig {
    TargetConfig::new("https://dmv.example.gov/register")
        .with_mappings(vec![
            FieldMapping::text("owner", "#owner"),
            FieldMapping::text("missingField", "#missing"),
        ])
        .with_markers(SUCCESS, Some(ERROR))
}

fn terminal_entries(entries: &[LogEntry]) -> Vec<&LogEntry> {
    entries
        .iter()
        .filter(|e| {
            e.metadata
                .as_ref()
                .and_then(|m| m.get("terminal"))
                .is_some()
        })
        .collect()
}

fn count_level(entries: &[LogEntry], level: LogLevel) -> usize {
    entries.iter().filter(|e| e.level == level).count()
}

// =============================================================================
// Outcome scenarios
// =============================================================================

#[tokio::test]
async fn test_success_marker_completes() {
    let h = harness(Script::page(&format!("<h1>{}</h1>", SUCCESS)));
    let form = vehicle_form();

    let record = h
        .engine
        .run_submission(&form, "sub-b", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Completed);
    assert!(record.completed_at.is_some());
    assert!(record.error_message.is_none());
    assert_eq!(h.submissions.snapshot("sub-b").unwrap(), record);
    assert_eq!(h.driver.closes(), 1);

    let entries = h.log.for_submission("sub-b");
    let terminal = terminal_entries(&entries);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].level, LogLevel::Success);
    assert_eq!(entries[0].message, "submission started");
}

#[tokio::test]
async fn test_only_present_fields_are_filled() {
    let h = harness(Script::page(SUCCESS));
    h.engine
        .run_submission(&vehicle_form(), "sub-a", "user-1", &target())
        .await
        .unwrap();

    let actions = h.driver.actions();
    let fills: Vec<_> = actions.iter().filter(|a| a.starts_with("text ")).collect();
    assert_eq!(fills, vec!["text #owner=John Smith"]);
    assert_eq!(actions.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_error_marker_fails_with_fixed_message() {
    let h = harness(Script::page(&format!("<div class=err>{}</div>", ERROR)));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-c", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some(SITE_ERROR_MESSAGE));
    assert!(record.completed_at.is_some());
    assert_eq!(h.driver.closes(), 1);

    let entries = h.log.for_submission("sub-c");
    let terminal = terminal_entries(&entries);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].level, LogLevel::Error);
}

#[tokio::test]
async fn test_missing_element_fails_and_closes_session() {
    let h = harness(Script::page(SUCCESS).missing("#owner"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-d", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    let message = record.error_message.clone().unwrap();
    assert!(message.contains("#owner"), "unexpected message: {}", message);
    assert!(message.contains("not found"));
    assert!(record.completed_at.is_some());
    assert_eq!(h.driver.closes(), 1);

    let entries = h.log.for_submission("sub-d");
    let diagnostic = entries
        .iter()
        .find(|e| e.message.starts_with("submission error"))
        .expect("diagnostic entry");
    let meta = diagnostic.metadata.as_ref().unwrap();
    assert_eq!(meta["error_kind"], "element_not_found");
    assert_eq!(meta["field"], "owner");
    assert_eq!(meta["stage"], "fill");
    assert_eq!(terminal_entries(&entries).len(), 1);
}

#[tokio::test]
async fn test_hanging_locate_is_bounded() {
    let h = harness(Script::page(SUCCESS).hanging("#owner"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-d2", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert!(record.error_message.unwrap().starts_with("TIMEOUT/"));
    assert_eq!(h.driver.closes(), 1);
}

#[tokio::test]
async fn test_no_marker_completes_with_one_warning() {
    let h = harness(Script::page("<p>Thank you for visiting</p>"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-e", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Completed);
    assert!(record.completed_at.is_some());

    let entries = h.log.for_submission("sub-e");
    assert_eq!(count_level(&entries, LogLevel::Warning), 1);
    let warning = entries.iter().find(|e| e.level == LogLevel::Warning).unwrap();
    assert_eq!(warning.message, UNCERTAIN_OUTCOME_MESSAGE);
    assert_eq!(terminal_entries(&entries).len(), 1);
}

#[tokio::test]
async fn test_both_markers_error_wins() {
    let page = format!("{} ... {}", SUCCESS, ERROR);

    let h = harness(Script::page(&page));
    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-tie", "user-1", &target())
        .await
        .unwrap();
    assert_eq!(record.status, SubmissionStatus::Failed);

    let h = harness(Script::page(&page));
    let lenient = target().with_precedence(MarkerPrecedence::SuccessFirst);
    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-tie2", "user-1", &lenient)
        .await
        .unwrap();
    assert_eq!(record.status, SubmissionStatus::Completed);
}

// =============================================================================
// Error taxonomy
// =============================================================================

#[tokio::test]
async fn test_bad_input_kind_fails_before_opening_session() {
    let h = harness(Script::page(SUCCESS));
    let config = target().with_mappings(vec![FieldMapping::new(
        "owner",
        "#owner",
        InputKind::from("date-picker".to_string()),
    )]);

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-cfg", "user-1", &config)
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert!(record.error_message.unwrap().starts_with("CONFIG/"));
    assert_eq!(h.driver.opens(), 0);
    assert_eq!(h.driver.closes(), 0);
}

#[tokio::test]
async fn test_open_failure_is_transport_error() {
    let mut script = Script::page(SUCCESS);
    script.open_error = Some("connection refused".into());
    let h = harness(script);

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-open", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("TRANSPORT/connection refused"));
    assert_eq!(h.driver.closes(), 0);
}

#[tokio::test]
async fn test_pre_step_failure_closes_session() {
    let h = harness(Script::page(SUCCESS).missing("#cookie-banner"));
    let config = target().with_pre_steps(vec![SiteStep::Click {
        selector: "#cookie-banner".into(),
    }]);

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-pre", "user-1", &config)
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert_eq!(h.driver.closes(), 1);
    assert!(!h.driver.actions().iter().any(|a| a.starts_with("text ")));
}

#[tokio::test]
async fn test_missing_submit_button_fails() {
    let h = harness(Script::page(SUCCESS).missing("button[type=\"submit\"]"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-nobtn", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert_eq!(h.driver.closes(), 1);
}

#[tokio::test]
async fn test_misuse_fails_fast() {
    let h = harness(Script::page(SUCCESS));
    let err = h
        .engine
        .run_submission(&vehicle_form(), "sub-x", "", &target())
        .await
        .unwrap_err();

    assert!(matches!(err, FormflowError::Misuse(_)));
    assert!(h.submissions.snapshot("sub-x").is_none());
    assert_eq!(h.driver.opens(), 0);
}

#[tokio::test]
async fn test_store_failure_before_attempt_is_returned() {
    let h = harness(Script::page(SUCCESS));
    h.submissions.go_offline();

    let err = h
        .engine
        .run_submission(&vehicle_form(), "sub-offline", "user-1", &target())
        .await
        .unwrap_err();

    assert!(matches!(err, FormflowError::Store(_)));
    assert_eq!(h.driver.opens(), 0);
    assert!(h.log.for_submission("sub-offline").is_empty());
}

#[tokio::test]
async fn test_terminal_record_cannot_be_rerun() {
    let h = harness(Script::page(SUCCESS));
    let form = vehicle_form();
    h.engine
        .run_submission(&form, "sub-once", "user-1", &target())
        .await
        .unwrap();

    let err = h
        .engine
        .run_submission(&form, "sub-once", "user-1", &target())
        .await
        .unwrap_err();
    assert!(matches!(err, FormflowError::Misuse(_)));
    assert_eq!(h.driver.opens(), 1);
}

#[tokio::test]
async fn test_hanging_settle_is_bounded() {
    let h = harness(Script::page(SUCCESS).hanging_settle());

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-settle", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert!(record.error_message.unwrap().starts_with("TIMEOUT/"));
    assert_eq!(h.driver.closes(), 1);
    assert_eq!(terminal_entries(&h.log.for_submission("sub-settle")).len(), 1);
}

#[tokio::test]
async fn test_content_failure_closes_session() {
    let h = harness(Script::page(SUCCESS).content_error("page crashed"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-content", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert_eq!(record.error_message.as_deref(), Some("TRANSPORT/page crashed"));
    assert_eq!(h.driver.closes(), 1);
    assert_eq!(terminal_entries(&h.log.for_submission("sub-content")).len(), 1);
}

#[tokio::test]
async fn test_post_step_failure_closes_session() {
    let h = harness(Script::page(SUCCESS).missing("#receipt"));
    let config = target().with_post_steps(vec![SiteStep::WaitFor {
        selector: "#receipt".into(),
    }]);

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-post", "user-1", &config)
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Failed);
    assert!(record.error_message.unwrap().contains("#receipt"));
    assert_eq!(h.driver.closes(), 1);

    let entries = h.log.for_submission("sub-post");
    let diagnostic = entries
        .iter()
        .find(|e| e.message.starts_with("submission error"))
        .expect("diagnostic entry");
    assert_eq!(diagnostic.metadata.as_ref().unwrap()["stage"], "post_steps");
}

#[tokio::test]
async fn test_close_failure_warns_once_and_keeps_status() {
    let h = harness(Script::page(SUCCESS).close_error("browser already gone"));

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-close", "user-1", &target())
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Completed);
    assert_eq!(h.submissions.snapshot("sub-close").unwrap().status, SubmissionStatus::Completed);
    assert_eq!(h.driver.closes(), 1);

    let entries = h.log.for_submission("sub-close");
    let warnings: Vec<_> = entries.iter().filter(|e| e.level == LogLevel::Warning).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.starts_with("session close failed"));
    let terminal = terminal_entries(&entries);
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].level, LogLevel::Success);
}

#[tokio::test(start_paused = true)]
async fn test_jitter_pauses_between_instructions() {
    let mut fields = ParsedFields::new();
    fields.insert("owner".into(), "John Smith".into());
    fields.insert("vin".into(), "JT2BF22K1W0123456".into());
    fields.insert("plate".into(), "7ABC123".into());
    let form = FormRecord::new("jitter.pdf", 10, "user-1", fields);
    let config = TargetConfig::new("https://dmv.example.gov/register")
        .with_mappings(vec![
            FieldMapping::text("owner", "#owner"),
            FieldMapping::text("vin", "#vin"),
            FieldMapping::text("plate", "#plate"),
        ])
        .with_markers(SUCCESS, None);

    let mut settings = fast_settings();
    settings.jitter = Jitter::new(200, 200);
    let h = harness_with(Script::page(SUCCESS), settings);
    let started = tokio::time::Instant::now();
    let record = h
        .engine
        .run_submission(&form, "sub-jitter", "user-1", &config)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(record.status, SubmissionStatus::Completed);
    // two pauses for three instructions
    assert!(elapsed >= Duration::from_millis(400), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(600), "elapsed {:?}", elapsed);

    let h = harness(Script::page(SUCCESS));
    let started = tokio::time::Instant::now();
    h.engine
        .run_submission(&form, "sub-steady", "user-1", &config)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(200));
}

// =============================================================================
// Field application, evidence, retry, concurrency
// =============================================================================

#[tokio::test]
async fn test_field_kinds_applied_in_mapping_order() {
    let h = harness(Script::page(SUCCESS));
    let mut fields = ParsedFields::new();
    fields.insert("state".into(), "CA".into());
    fields.insert("insured".into(), true.into());
    fields.insert("commercial".into(), false.into());
    fields.insert("fuel".into(), "diesel".into());
    let form = FormRecord::new("kinds.pdf", 10, "user-1", fields);

    let config = TargetConfig::new("https://example.gov")
        .with_mappings(vec![
            FieldMapping::new("fuel", "input[name=fuel]", InputKind::Radio),
            FieldMapping::new("commercial", "#commercial", InputKind::Checkbox),
            FieldMapping::new("state", "#state", InputKind::Select),
            FieldMapping::new("insured", "#insured", InputKind::Checkbox),
        ])
        .with_markers(SUCCESS, None);

    h.engine
        .run_submission(&form, "sub-kinds", "user-1", &config)
        .await
        .unwrap();

    let actions: Vec<String> = h
        .driver
        .actions()
        .into_iter()
        .filter(|a| !a.starts_with("open") && a != "close" && !a.starts_with("click"))
        .collect();
    assert_eq!(
        actions,
        vec!["radio input[name=fuel]=diesel", "select #state=CA", "check #insured"]
    );
}

#[tokio::test]
async fn test_evidence_failure_does_not_change_outcome() {
    let mut script = Script::page(SUCCESS);
    script.evidence_error = Some("disk full".into());
    let h = harness(script);
    let mut config = target();
    config.capture_evidence = true;

    let record = h
        .engine
        .run_submission(&vehicle_form(), "sub-ev", "user-1", &config)
        .await
        .unwrap();

    assert_eq!(record.status, SubmissionStatus::Completed);
    assert!(h
        .driver
        .actions()
        .iter()
        .any(|a| a.ends_with("sub-ev.png") && a.starts_with("evidence")));
    let entries = h.log.for_submission("sub-ev");
    assert_eq!(count_level(&entries, LogLevel::Warning), 1);
}

#[tokio::test]
async fn test_retry_leaves_original_untouched() {
    let h = harness(Script::page(ERROR));
    let form = vehicle_form();
    let original = h
        .engine
        .run_submission(&form, "sub-r", "user-1", &target())
        .await
        .unwrap();
    assert_eq!(original.status, SubmissionStatus::Failed);

    let retry_id = retry_submission_id(&original.id);
    assert!(retry_id.starts_with("sub-r-retry-"));

    let retried = h
        .engine
        .retry_submission(&form, &original, &retry_id, "user-2", &target())
        .await
        .unwrap();

    assert_ne!(retried.id, original.id);
    assert_eq!(retried.form_id, form.id);
    assert!(retried.is_terminal());
    assert_eq!(h.submissions.snapshot("sub-r").unwrap(), original);

    let entries = h.log.for_submission(&retry_id);
    assert_eq!(entries[0].message, "retrying submission sub-r");
}

#[test]
fn test_retry_ids_are_unique_within_one_millisecond() {
    let ids: HashSet<String> = (0..64).map(|_| retry_submission_id("sub-r")).collect();
    assert_eq!(ids.len(), 64);
    assert!(ids.iter().all(|id| id.starts_with("sub-r-retry-")));
}

#[tokio::test]
async fn test_rejected_retry_logs_nothing() {
    let h = harness(Script::page(ERROR));
    let form = vehicle_form();
    let original = h
        .engine
        .run_submission(&form, "sub-orig", "user-1", &target())
        .await
        .unwrap();

    let retry_id = retry_submission_id(&original.id);
    let err = h
        .engine
        .retry_submission(&form, &original, &retry_id, "", &target())
        .await
        .unwrap_err();

    assert!(matches!(err, FormflowError::Misuse(_)));
    assert!(h.log.for_submission(&retry_id).is_empty());
    assert!(h.submissions.snapshot(&retry_id).is_none());
    assert_eq!(h.driver.opens(), 1);
}

#[tokio::test]
async fn test_concurrent_attempts_are_independent() {
    let h = harness(Script::page(SUCCESS));
    let form = vehicle_form();
    let config = target();

    let (a, b) = tokio::join!(
        h.engine.run_submission(&form, "sub-f1", "user-1", &config),
        h.engine.run_submission(&form, "sub-f2", "user-2", &config),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.is_terminal() && b.is_terminal());
    assert_ne!(a.id, b.id);
    assert_eq!(h.driver.opens(), 2);
    assert_eq!(h.driver.closes(), 2);
    assert_eq!(terminal_entries(&h.log.for_submission("sub-f1")).len(), 1);
    assert_eq!(terminal_entries(&h.log.for_submission("sub-f2")).len(), 1);
}
