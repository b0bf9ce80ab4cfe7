//! End-to-end scenarios through the library API with the mock runner

use crab_pilot::app::InterruptFlag;
use crab_pilot::config::{parse_batch_description, DatasetCatalog, GridConfig, PilotConfig};
use crab_pilot::consolidate::{ConsolidateOptions, OutputConsolidator, OutputKind};
use crab_pilot::error::{CrabError, ErrorCode};
use crab_pilot::generators::{GeneratorContext, GeneratorPipeline};
use crab_pilot::grid::GridClient;
use crab_pilot::params::ParameterMap;
use crab_pilot::status::{classify, parse_status, RecoveryAction, TaskReport, TaskState};
use crab_pilot::submit::{BatchSubmitter, SubmissionStatus};
use crab_pilot::subprocess::SubprocessManager;
use crab_pilot::template::{render, BoundTemplate, TemplateDocument, TemplateSet};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const DATASETS: &str = r#"
[2023]
lumiMask = "Cert_Collisions2023_366442_370790_Golden.json"

[2023.C.v1.Muon0]
path = "/Muon0/Run2023C-22Sep2023_v1-v1/AOD"
"#;

const SELECTIONS: &str = r#"
MuonTagSkim = "Muon"
"#;

#[test]
fn scenario_a_unrecoverable_failure() {
    let raw = r#"{
        "1": {"State": "finished", "Retries": 0},
        "2": {"State": "running", "Retries": 1},
        "3": {"State": "failed", "Retries": 2, "Error": [50660, "Application unexpectedly failed"]}
    }"#;
    let records = parse_status(raw);
    assert_eq!(records.len(), 3);
    assert_eq!(classify(&records), TaskState::Failed);

    let report = TaskReport::from_output(raw);
    assert_eq!(report.unrecoverable_jobs, vec!["3"]);
    assert_eq!(report.recommended_action(), RecoveryAction::RecoveryTask);
}

#[test]
fn scenario_b_all_finished() {
    let raw = r#"{"1": {"State": "finished"}, "2": {"State": "finished"}, "3": {"State": "finished"}}"#;
    assert_eq!(classify(&parse_status(raw)), TaskState::Finished);
    assert_eq!(
        TaskReport::from_output(raw).recommended_action(),
        RecoveryAction::Consolidate
    );
}

#[test]
fn scenario_c_purged_output_is_unknown() {
    let raw = "Task status: SUBMITTED\nFiles are purged from the schedd, the status is not available";
    assert_eq!(classify(&parse_status(raw)), TaskState::Unknown);
}

#[test]
fn scenario_d_rendering() {
    let params = ParameterMap::new().with("YEAR", "2023").with("ERA", "C");
    assert_eq!(render("__YEAR__-__ERA__", &params), "2023-C");
    assert_eq!(render("__YEAR__-__ERA__", &ParameterMap::new()), "__YEAR__-__ERA__");
    assert_eq!(
        render("__YEAR__-__ERA__", &params),
        render("__YEAR__-__ERA__", &params)
    );
}

#[tokio::test]
async fn scenario_e_missing_key_fails_only_its_entry() {
    let dir = TempDir::new().unwrap();
    let context = GeneratorContext {
        catalog: Arc::new(DatasetCatalog::from_strs(DATASETS, SELECTIONS).unwrap()),
        manifest_dir: dir.path().join("manifests"),
    };
    let pipeline = GeneratorPipeline::from_names(&PilotConfig::default().generators, &context).unwrap();

    let templates = TemplateSet::new(vec![BoundTemplate {
        document: TemplateDocument::new(
            "config.General.requestName = '__REQUEST_NAME__'\nconfig.Data.inputDataset = '__DATASET__'\nconfig.Data.lumiMask = '__LUMIMASK__'\n",
        ),
        source_name: PathBuf::from("crab_template.py"),
        live_path: dir.path().join("run").join("crab_cfg.py"),
        submit: true,
    }])
    .unwrap();

    let (manager, mut mock) = SubprocessManager::mock();
    mock.expect_command("crab")
        .with_args(|args| args.first().map(String::as_str) == Some("submit"))
        .returns_stdout("Success: Your task has been delivered to the prod CRAB3 server.")
        .finish();
    let grid = GridClient::new(manager, GridConfig::default()).unwrap();

    let batch = parse_batch_description(
        r#"
- Selection: MuonTagSkim
  Year: 2023
  Era: C
  Era Version: 1
  Dataset Version: 0
- Selection: MuonTagSkim
  Year: 2023
  Era: C
  Dataset Version: 0
"#,
    )
    .unwrap();

    let submitter = BatchSubmitter::new(
        pipeline,
        templates,
        grid,
        dir.path().join("archive"),
        InterruptFlag::new(),
    );
    let report = submitter.submit(&batch, false).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status, SubmissionStatus::Submitted);
    assert_eq!(
        report.outcomes[0].request_name.as_deref(),
        Some("MuonTagSkim_2023C_v1_Muon0")
    );
    assert_eq!(report.outcomes[1].status, SubmissionStatus::Failed);
    assert_eq!(
        report.outcomes[1].error_code,
        Some(ErrorCode::CONFIG_MISSING_PARAMETER)
    );
    assert!(mock.verify_called("crab", 1));

    let live = std::fs::read_to_string(dir.path().join("run").join("crab_cfg.py")).unwrap();
    assert!(live.contains("/Muon0/Run2023C-22Sep2023_v1-v1/AOD"));
    assert!(live.contains("Cert_Collisions2023_366442_370790_Golden.json"));
}

#[tokio::test]
async fn failed_merge_never_deletes() {
    let dir = TempDir::new().unwrap();
    let (manager, mut mock) = SubprocessManager::mock();
    mock.expect_command("eos")
        .with_args(|args| args.get(1).map(String::as_str) == Some("find"))
        .returns_stdout(
            "root://cmseos.fnal.gov//store/out/0000/hist_A_1.root\n\
             root://cmseos.fnal.gov//store/out/0000/hist_A_2.root\n",
        )
        .finish();
    mock.expect_command("hadd")
        .returns_exit_code(1)
        .returns_stderr("Error in <TFile::TFile>: file hist_A_2.root is truncated")
        .finish();

    let mut config = PilotConfig::default();
    config.merge.scratch_dir = dir.path().to_path_buf();
    let consolidator = OutputConsolidator::new(manager, &config, InterruptFlag::new());

    let report = consolidator
        .consolidate(
            "/store/out",
            ConsolidateOptions {
                kind: OutputKind::Hist,
                group_by_selection: true,
                copy_back: true,
                cleanup: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(report.skipped().count(), 1);
    assert!(mock.calls_with_subcommand("eos", "rm").is_empty());
    assert!(mock.verify_called("xrdcp", 0));
}

#[tokio::test]
async fn grouping_a_single_file_is_an_error() {
    let (manager, mut mock) = SubprocessManager::mock();
    mock.expect_command("eos")
        .returns_stdout("root://cmseos.fnal.gov//store/out/0000/hist_A_1.root\n")
        .finish();
    let consolidator =
        OutputConsolidator::new(manager, &PilotConfig::default(), InterruptFlag::new());

    let err = consolidator
        .consolidate(
            "/store/out",
            ConsolidateOptions {
                kind: OutputKind::Hist,
                group_by_selection: true,
                copy_back: false,
                cleanup: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrabError::FileGrouping { .. }));
    assert_eq!(err.code(), ErrorCode::GROUPING_TOO_FEW_FILES);
}
