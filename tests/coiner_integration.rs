//! End-to-end runs of the coiner over temporary raw trees
//!
//! The converter and the metadata probe are the in-memory fakes from
//! `bidscoiner::testing`; everything else is the production code path.

mod common;

use async_trait::async_trait;
use std::fs;
use std::sync::Arc;

use bidscoiner::coin::{CoinContext, PluginRegistry, SessionCoiner, SessionUnit, SessionWork};
use bidscoiner::testing::FakeConverter;
use bidscoiner::{CoinError, ErrorCode};
use common::{Study, BIDSMAP};

#[tokio::test]
async fn test_unresolvable_identity_writes_nothing_for_the_session() {
    let mut study = Study::new(&BIDSMAP.replace("participant_label: ~", "participant_label: <PatientID>"));
    study.add_series("sub-01/001_t1", &[("SeriesDescription", "t1_mprage")]);
    study.add_series(
        "sub-02/001_t1",
        &[("SeriesDescription", "t1_mprage"), ("PatientID", "P-02")],
    );

    let converter = FakeConverter::new();
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.done(), 1);
    assert_eq!(
        summary.sessions[0].errors[0].code(),
        ErrorCode::IDENTITY_NO_SUBJECT
    );
    assert_eq!(
        study.outputs(),
        vec![
            ".bidsignore",
            "participants.tsv",
            "sub-P02/anat/sub-P02_run-1_T1w.json",
            "sub-P02/anat/sub-P02_run-1_T1w.nii.gz",
        ]
    );
    assert!(!study.registry().contains("sub-01"));
    assert_eq!(converter.calls().len(), 1);
    assert!(study.transcript().contains("Error [E2001]"));
}

#[tokio::test]
async fn test_empty_subject_folder_name_is_skipped() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-/001_t1", &[("SeriesDescription", "t1")]);

    let converter = FakeConverter::new();
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();

    assert_eq!(summary.failed(), 1);
    assert_eq!(study.outputs(), vec![".bidsignore", "participants.tsv"]);
    assert!(converter.calls().is_empty());
}

#[tokio::test]
async fn test_colliding_names_get_increasing_run_indices() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/001_t1", &[("SeriesDescription", "t1_mprage")]);
    study.add_series("sub-01/002_t1", &[("SeriesDescription", "t1_mprage")]);

    let converter = FakeConverter::new();
    study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(
        study.files("sub-01/anat"),
        vec![
            "sub-01_run-1_T1w.json",
            "sub-01_run-1_T1w.nii.gz",
            "sub-01_run-2_T1w.json",
            "sub-01_run-2_T1w.nii.gz",
        ]
    );

    // A forced rerun adds new runs and leaves the earlier ones alone
    fs::write(
        study.bids.join("sub-01/anat/sub-01_run-1_T1w.json"),
        "{\"edited\": true}",
    )
    .unwrap();
    let mut options = study.options();
    options.force = true;
    study.coiner(&converter).run(&options).await.unwrap();

    assert_eq!(study.files("sub-01/anat").len(), 8);
    assert!(study.files("sub-01/anat").contains(&"sub-01_run-4_T1w.json".to_string()));
    assert_eq!(
        study.read("sub-01/anat/sub-01_run-1_T1w.json"),
        "{\"edited\": true}"
    );
}

#[tokio::test]
async fn test_rerun_without_force_is_idempotent() {
    let mut study = Study::new(BIDSMAP);
    study.add_series(
        "sub-01/ses-01/001_t1",
        &[("SeriesDescription", "t1"), ("PatientAge", "030Y")],
    );
    study.add_series(
        "sub-01/ses-01/002_rest",
        &[("SeriesDescription", "fmri_rest")],
    );

    let converter = FakeConverter::new();
    let first = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(first.done(), 1);

    let outputs = study.outputs();
    let registry = study.registry();
    let calls = converter.calls().len();

    let second = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(second.skipped(), 1);
    assert_eq!(study.outputs(), outputs);
    assert_eq!(study.registry(), registry);
    assert_eq!(converter.calls().len(), calls);
    assert_eq!(registry.lines().count(), 2);
}

#[tokio::test]
async fn test_rerun_skips_sessions_named_from_metadata() {
    let mut study = Study::new(&BIDSMAP.replace("participant_label: ~", "participant_label: <PatientID>"));
    study.add_series(
        "sub-01/001_t1",
        &[("SeriesDescription", "t1"), ("PatientID", "P-07")],
    );

    let converter = FakeConverter::new();
    let first = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(first.done(), 1);
    assert!(study.bids.join("sub-P07").is_dir());
    assert!(!study.bids.join("sub-01").exists());

    let outputs = study.outputs();
    let calls = converter.calls().len();

    let second = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(second.skipped(), 1);
    assert_eq!(second.done(), 0);
    assert_eq!(study.outputs(), outputs);
    assert_eq!(converter.calls().len(), calls);
    assert!(study.transcript().contains("already converted"));
}

#[tokio::test]
async fn test_registry_protects_participants_named_from_metadata() {
    let mut study = Study::new(&BIDSMAP.replace("participant_label: ~", "participant_label: <PatientID>"));
    study.add_series(
        "sub-01/001_t1",
        &[("SeriesDescription", "t1"), ("PatientID", "P-07")],
    );

    let converter = FakeConverter::new();
    study.coiner(&converter).run(&study.options()).await.unwrap();
    assert!(study.registry().contains("sub-P07"));

    let mut options = study.options();
    options.force = true;
    options.participants_protect = true;
    let summary = study.coiner(&converter).run(&options).await.unwrap();

    assert_eq!(summary.skipped(), 1);
    assert_eq!(
        study.files("sub-P07/anat"),
        vec!["sub-P07_run-1_T1w.json", "sub-P07_run-1_T1w.nii.gz"]
    );
}

#[tokio::test]
async fn test_protection_ignores_rows_added_during_the_run() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/ses-01/001_t1", &[("SeriesDescription", "t1")]);
    study.add_series("sub-01/ses-02/001_t1", &[("SeriesDescription", "t1")]);

    let mut options = study.options();
    options.participants_protect = true;
    let converter = FakeConverter::new();
    let summary = study.coiner(&converter).run(&options).await.unwrap();

    assert_eq!(summary.done(), 2);
    assert_eq!(summary.skipped(), 0);
}

#[tokio::test]
async fn test_diffusion_placeholders() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/005_dwi", &[("SeriesDescription", "ep2d_dwi_b0")]);

    let converter = FakeConverter::new();
    study.coiner(&converter).run(&study.options()).await.unwrap();

    assert_eq!(
        study.files("sub-01/dwi"),
        vec![
            "sub-01_run-1_dwi.bval",
            "sub-01_run-1_dwi.bvec",
            "sub-01_run-1_dwi.json",
            "sub-01_run-1_dwi.nii.gz",
        ]
    );
    assert_eq!(study.read("sub-01/dwi/sub-01_run-1_dwi.bvec"), "0\n0\n0\n");
    assert_eq!(study.read("sub-01/dwi/sub-01_run-1_dwi.bval"), "0\n");
}

#[tokio::test]
async fn test_task_name_injected_byte_for_byte() {
    const SIDECAR: &str =
        "{\n  \"RepetitionTime\": 2.0,\n  \"SliceTiming\": [\n    0.0,\n    1.0\n  ]\n}\n";

    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/002_rest", &[("SeriesDescription", "fmri_rest")]);

    let converter = FakeConverter::new().with_sidecar("002_rest", SIDECAR);
    study.coiner(&converter).run(&study.options()).await.unwrap();

    let sidecar = study.read("sub-01/func/sub-01_task-rest_run-1_bold.json");
    assert_eq!(
        sidecar,
        "{\n  \"RepetitionTime\": 2.0,\n  \"SliceTiming\": [\n    0.0,\n    1.0\n  ],\n  \"TaskName\": \"rest\"\n}\n"
    );

    let parsed: serde_json::Value = serde_json::from_str(&sidecar).unwrap();
    assert_eq!(parsed["TaskName"], "rest");
}

#[tokio::test]
async fn test_multi_echo_outputs_are_relabeled() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/002_rest", &[("SeriesDescription", "me_rest")]);
    study.add_series("sub-01/004_rest", &[("SeriesDescription", "me_rest")]);

    let converter = FakeConverter::new()
        .with_echoes("002_rest", 2)
        .with_echoes("004_rest", 2);
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(summary.error_count(), 0);

    assert_eq!(
        study.files("sub-01/func"),
        vec![
            "sub-01_task-rest_run-1_echo-1_bold.json",
            "sub-01_task-rest_run-1_echo-1_bold.nii.gz",
            "sub-01_task-rest_run-1_echo-2_bold.json",
            "sub-01_task-rest_run-1_echo-2_bold.nii.gz",
            "sub-01_task-rest_run-2_echo-1_bold.json",
            "sub-01_task-rest_run-2_echo-1_bold.nii.gz",
            "sub-01_task-rest_run-2_echo-2_bold.json",
            "sub-01_task-rest_run-2_echo-2_bold.nii.gz",
        ]
    );
    assert!(study
        .read("sub-01/func/sub-01_task-rest_run-2_echo-2_bold.json")
        .contains("\"TaskName\": \"rest\""));
}

#[tokio::test]
async fn test_registry_grows_columns_and_never_duplicates() {
    let mut study = Study::new(BIDSMAP);
    study.add_series(
        "sub-01/001_t1",
        &[("SeriesDescription", "t1"), ("PatientAge", "030Y")],
    );
    study.add_series(
        "sub-02/001_t1",
        &[
            ("SeriesDescription", "t1"),
            ("PatientAge", "041Y"),
            ("PatientSex", "F"),
        ],
    );

    let converter = FakeConverter::new();
    study.coiner(&converter).run(&study.options()).await.unwrap();

    let expected = "participant_id\tage\tsex\tsize\tweight\nsub-01\t030Y\t\t\t\nsub-02\t041Y\tF\t\t\n";
    assert_eq!(study.registry(), expected);

    // Forced, but every subject is protected by the registry
    let mut options = study.options();
    options.force = true;
    options.participants_protect = true;
    let summary = study.coiner(&converter).run(&options).await.unwrap();
    assert_eq!(summary.skipped(), 2);
    assert_eq!(study.registry(), expected);

    // Forced without protection: reconverted, rows updated in place
    options.participants_protect = false;
    let summary = study.coiner(&converter).run(&options).await.unwrap();
    assert_eq!(summary.done(), 2);
    assert_eq!(study.registry(), expected);
}

#[tokio::test]
async fn test_sessions_are_registered_separately() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/ses-01/001_t1", &[("SeriesDescription", "t1")]);
    study.add_series("sub-01/ses-02/001_t1", &[("SeriesDescription", "t1")]);

    let converter = FakeConverter::new();
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();
    assert_eq!(summary.done(), 2);

    assert_eq!(
        study.files("sub-01/ses-02/anat"),
        vec!["sub-01_ses-02_run-1_T1w.json", "sub-01_ses-02_run-1_T1w.nii.gz"]
    );
    let registry = study.registry();
    let mut lines = registry.lines();
    assert_eq!(
        lines.next(),
        Some("participant_id\tsession_id\tage\tsex\tsize\tweight")
    );
    assert_eq!(lines.next(), Some("sub-01\tses-01\t\t\t\t"));
    assert_eq!(lines.next(), Some("sub-01\tses-02\t\t\t\t"));
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_unmatched_series_goes_to_extra_data() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/009_loc", &[("SeriesDescription", "AA_localizer")]);

    let converter = FakeConverter::new();
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();

    assert_eq!(summary.done(), 1);
    assert_eq!(
        summary.sessions[0].errors[0].code(),
        ErrorCode::CLASSIFY_NO_MATCH
    );
    assert_eq!(
        study.files("sub-01/extra_data"),
        vec![
            "sub-01_acq-AAlocalizer_run-1_009loc.json",
            "sub-01_acq-AAlocalizer_run-1_009loc.nii.gz",
        ]
    );
    assert_eq!(study.read(".bidsignore"), "extra_data/\n");
    assert!(study.transcript().contains("Error [E5001]"));
}

#[tokio::test]
async fn test_failed_conversion_does_not_stop_the_session() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/001_t1", &[("SeriesDescription", "t1")]);
    study.add_series("sub-01/002_rest", &[("SeriesDescription", "rest")]);

    let converter = FakeConverter::new().failing("001_t1", 3);
    let summary = study.coiner(&converter).run(&study.options()).await.unwrap();

    assert_eq!(summary.done(), 1);
    assert_eq!(summary.error_count(), 1);
    assert_eq!(
        summary.sessions[0].errors[0].code(),
        ErrorCode::EXEC_SUBPROCESS_FAILED
    );
    assert!(study.files("sub-01/anat").is_empty());
    assert_eq!(study.files("sub-01/func").len(), 2);
    assert!(study.transcript().contains("(errorcode 3)"));
}

#[tokio::test]
async fn test_selected_subjects_only() {
    let mut study = Study::new(BIDSMAP);
    study.add_series("sub-01/001_t1", &[("SeriesDescription", "t1")]);
    study.add_series("sub-02/001_t1", &[("SeriesDescription", "t1")]);

    let mut options = study.options();
    options.subjects = vec!["sub-02".to_string(), "sub-77".to_string()];
    let summary = study
        .coiner(&FakeConverter::new())
        .run(&options)
        .await
        .unwrap();

    assert_eq!(summary.sessions.len(), 1);
    assert!(!study.bids.join("sub-01").exists());
    assert!(study.bids.join("sub-02").is_dir());
}

/// Plugin that contributes demographic fields of its own
struct Demographics;

#[async_trait]
impl SessionCoiner for Demographics {
    fn name(&self) -> &str {
        "demographics"
    }

    async fn coin(
        &self,
        ctx: &CoinContext<'_>,
        session: &SessionUnit,
        work: &mut SessionWork,
    ) -> Result<(), CoinError> {
        ctx.transcript
            .info(format!("demographics for {}", session.path.display()));
        work.personals.set("age", "099Y");
        work.personals.set("handedness", "R");
        Ok(())
    }
}

#[tokio::test]
async fn test_plugins_merge_into_the_same_row_last_kind_wins() {
    let yaml = format!("{}PlugIn: [demographics, missing]\n", BIDSMAP);
    let mut study = Study::new(&yaml);
    study.add_series(
        "sub-01/001_t1",
        &[("SeriesDescription", "t1"), ("PatientAge", "030Y")],
    );

    let plugins = PluginRegistry::new().with(Arc::new(Demographics));
    let summary = study
        .coiner_with_plugins(&FakeConverter::new(), plugins)
        .run(&study.options())
        .await
        .unwrap();

    assert_eq!(summary.done(), 1);
    assert_eq!(summary.error_count(), 1);
    assert_eq!(
        summary.sessions[0].errors[0].code(),
        ErrorCode::CONFIG_UNKNOWN_PLUGIN
    );
    assert_eq!(
        study.registry(),
        "participant_id\tage\tsex\tsize\tweight\thandedness\nsub-01\t099Y\t\t\t\tR\n"
    );
}
