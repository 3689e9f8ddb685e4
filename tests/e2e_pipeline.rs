// oppsift - tests/e2e_pipeline.rs
//
// End-to-end tests for the filter-and-normalisation pipeline.
//
// These tests load real fixture files from disk, replay a recorded
// classifier response, and read the exported bytes back through the
// loader, so the full path from upload to download is exercised with no
// mocks beyond the classifier seam itself.

use calamine::Reader;
use chrono::NaiveDate;
use oppsift::app::classifier::{
    Classifier, FixedResponseClassifier, PlanFileClassifier, UnavailableClassifier,
};
use oppsift::app::pipeline::{
    self, PipelineOptions, PipelineOutcome, PipelineRequest, PlanSource,
};
use oppsift::core::loader;
use oppsift::core::model::Cell;
use oppsift::core::output;
use oppsift::platform::fs::write_atomic;
use oppsift::util::error::{LoadError, OppsiftError};
use std::path::PathBuf;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to the on-disk fixture files.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn opportunities_csv() -> Vec<u8> {
    std::fs::read(fixture("opportunities.csv")).expect("fixture opportunities.csv")
}

/// Thursday; the fixture's due dates are spread around it.
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
}

fn column_strings(outcome: &PipelineOutcome, column: &str) -> Vec<String> {
    outcome
        .filters
        .table
        .column(column)
        .unwrap_or_else(|| panic!("missing column {column}"))
        .values
        .iter()
        .map(Cell::to_string)
        .collect()
}

fn run_with(
    classifier: &dyn Classifier,
    options: &PipelineOptions,
) -> PipelineOutcome {
    let bytes = opportunities_csv();
    pipeline::run(
        PipelineRequest {
            file_name: "opportunities.csv",
            bytes: &bytes,
            instruction: "veteran and women-owned set-asides due in the next 14 days",
        },
        options,
        classifier,
        today(),
    )
    .expect("pipeline run")
}

// =============================================================================
// Recorded plan
// =============================================================================

/// The recorded plan narrows to three set-aside rows due within 14 days.
#[test]
fn e2e_recorded_plan_filters_and_sorts() {
    let classifier = PlanFileClassifier::new(fixture("plan_next_14_days.json"));
    let out = run_with(&classifier, &PipelineOptions::default());

    assert_eq!(
        out.plan_source,
        PlanSource::Classifier {
            name: "plan-file".to_string()
        }
    );
    assert_eq!(out.rows_loaded, 8);
    // Blank and "No Set aside used" rows are screened out.
    assert_eq!(out.rows_before_filters, 6);

    assert_eq!(
        column_strings(&out, output::SOLICITATION_NUMBER),
        vec!["36C25224Q0154", "W912DY24R0011", "70Z08424Q0100"]
    );
    assert_eq!(
        column_strings(&out, output::NORMALIZED_SET_ASIDE),
        vec!["VETERAN OWNED SMALL BUSINESS (VOSB)", "SDVOSB", "WOSB"]
    );
    assert_eq!(
        column_strings(&out, output::OPPORTUNITY_TYPE),
        vec!["Solicitation", "Solicitation", "Sources Sought"]
    );
    assert_eq!(
        column_strings(&out, output::DUE_DATE),
        vec!["2024-02-20", "2024-02-26", "2024-02-19"]
    );
    assert_eq!(
        column_strings(&out, output::AGENCY)[0],
        "VETERANS AFFAIRS",
        "suggested agency column should win over the Office fallback"
    );

    // The NAICS predicate names a column the output table does not have.
    assert_eq!(out.filters.applied.len(), 2);
    assert_eq!(out.filters.skipped.len(), 1);
    assert_eq!(out.filters.skipped[0].predicate.column, "NAICS");
}

/// Suggested buckets classify rows the built-in catalog would call "Other".
#[test]
fn e2e_suggested_category_is_sorted_last() {
    let classifier = PlanFileClassifier::new(fixture("plan_next_14_days.json"));
    let raw = std::fs::read_to_string(fixture("plan_next_14_days.json")).unwrap();
    // Same plan without its filters.
    let mut plan: serde_json::Value = serde_json::from_str(&raw).unwrap();
    plan["filters"] = serde_json::json!([]);
    let unfiltered = FixedResponseClassifier::new(plan.to_string());

    let out = run_with(&unfiltered, &PipelineOptions::default());
    assert_eq!(
        column_strings(&out, output::SOLICITATION_NUMBER),
        vec![
            "36C25224Q0154",
            "SP470124Q0050",
            "W912DY24R0011",
            "FA301624Q0032",
            "70Z08424Q0100",
            "1332KP24Q0009",
        ]
    );
    assert_eq!(
        column_strings(&out, output::OPPORTUNITY_TYPE).last().map(String::as_str),
        Some("Special Notice")
    );

    // The filtered run is a subset of the unfiltered one.
    let filtered = run_with(&classifier, &PipelineOptions::default());
    let all = column_strings(&out, output::SOLICITATION_NUMBER);
    for id in column_strings(&filtered, output::SOLICITATION_NUMBER) {
        assert!(all.contains(&id), "{id} appeared only after filtering");
    }
}

// =============================================================================
// Degraded classifier
// =============================================================================

/// A response that is not JSON still yields a table from built-in patterns.
#[test]
fn e2e_malformed_response_falls_back() {
    let classifier = FixedResponseClassifier::new("Sorry, I can't produce JSON today.");
    let out = run_with(&classifier, &PipelineOptions::default());

    assert!(out.plan_source.is_fallback());
    assert!(out.plan.filters.is_empty());
    assert!(out.filters.skipped.is_empty());
    assert_eq!(out.filters.table.row_count(), 6);
    assert_eq!(
        out.filters.table.column_names(),
        output::CANONICAL_COLUMNS.to_vec()
    );
    // Without the suggested bucket the special notice falls into "Other".
    assert_eq!(
        column_strings(&out, output::OPPORTUNITY_TYPE).last().map(String::as_str),
        Some("Other")
    );
}

#[test]
fn e2e_keep_unqualified_rows() {
    let options = PipelineOptions {
        drop_unqualified: false,
        ..PipelineOptions::default()
    };
    let out = run_with(&UnavailableClassifier::default(), &options);
    assert_eq!(out.filters.table.row_count(), 8);
    let set_asides = column_strings(&out, output::NORMALIZED_SET_ASIDE);
    assert!(set_asides.contains(&"NO SET-ASIDE".to_string()));
    assert!(set_asides.contains(&String::new()), "blank set-aside stays absent");
}

// =============================================================================
// Downloads
// =============================================================================

/// Both downloads parse back to the final table's shape and land on disk.
#[test]
fn e2e_downloads_round_trip_and_write() {
    let classifier = PlanFileClassifier::new(fixture("plan_next_14_days.json"));
    let out = run_with(&classifier, &PipelineOptions::default());
    let [xlsx, csv] = &out.downloads;

    let csv_text = String::from_utf8(csv.bytes.clone()).unwrap();
    assert!(csv_text.starts_with(
        "Solicitation Number,Title,Agency,Solicitation Date,Opportunity Type,\
         Normalized Set Aside,Due Date,UiLink\n"
    ));

    for download in [xlsx, csv] {
        let back = loader::load_dataset(download.file_name, &download.bytes).unwrap();
        assert_eq!(back.row_count(), out.filters.table.row_count());
        assert_eq!(back.column_names(), out.filters.table.column_names());
    }

    let dir = tempfile::tempdir().unwrap();
    for download in &out.downloads {
        let path = write_atomic(dir.path(), download.file_name, &download.bytes).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), download.bytes);
    }
    assert!(dir.path().join("Filtered_Results.xlsx").exists());
    assert!(dir.path().join("Filtered_Results.csv").exists());
}

#[test]
fn e2e_exports_are_byte_identical_across_runs() {
    let classifier = PlanFileClassifier::new(fixture("plan_next_14_days.json"));
    let first = run_with(&classifier, &PipelineOptions::default());
    let second = run_with(&classifier, &PipelineOptions::default());
    assert_eq!(first.downloads, second.downloads);
}

#[test]
fn e2e_long_sheet_name_is_truncated() {
    let options = PipelineOptions {
        sheet_name: "Service-Disabled Veteran-Owned Opportunities".to_string(),
        ..PipelineOptions::default()
    };
    let out = run_with(&UnavailableClassifier::default(), &options);

    let mut book = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(
        out.downloads[0].bytes.clone(),
    ))
    .unwrap();
    // Cut at 31 characters, then the trailing space is trimmed.
    assert_eq!(book.sheet_names(), vec!["Service-Disabled Veteran-Owned".to_string()]);
}

// =============================================================================
// Load failures
// =============================================================================

#[test]
fn e2e_unsupported_extension_is_fatal() {
    let result = pipeline::run(
        PipelineRequest {
            file_name: "opportunities.json",
            bytes: b"{}",
            instruction: "",
        },
        &PipelineOptions::default(),
        &UnavailableClassifier::default(),
        today(),
    );
    assert!(matches!(
        result,
        Err(OppsiftError::Load(LoadError::UnsupportedExtension { .. }))
    ));
}

#[test]
fn e2e_latin1_upload_is_decoded() {
    // "Café Renovation" in windows-1252.
    let mut bytes = b"NoticeId,Title,SetASide\nA1,Caf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b" Renovation,SDVOSB\n");

    let out = pipeline::run(
        PipelineRequest {
            file_name: "latin1.csv",
            bytes: &bytes,
            instruction: "",
        },
        &PipelineOptions::default(),
        &UnavailableClassifier::default(),
        today(),
    )
    .unwrap();
    assert_eq!(column_strings(&out, output::TITLE), vec!["Café Renovation"]);
}
