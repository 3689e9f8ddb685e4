// oppsift - app/pipeline.rs
//
// One request, end to end:
//   load -> profile -> classifier plan -> normalise (x2) -> output table
//   -> filters -> downloads.
//
// Everything a run touches is owned by that run; nothing is cached between
// requests. Only load and export failures abort. A failed classifier call
// degrades to the empty fallback plan, and bad predicates are skipped.

use crate::app::classifier::Classifier;
use crate::core::catalog::NormalizationTarget;
use crate::core::export::{self, Download};
use crate::core::filter::{self, FilterOutcome};
use crate::core::loader;
use crate::core::normalize::CategoryNormalizer;
use crate::core::output::{self, ColumnRole, ColumnRoleMap};
use crate::core::plan::{self, ClassifierPlan, ClassifierRequest};
use crate::core::profile::{self, DatasetProfile};
use crate::util::constants;
use crate::util::error::Result;
use chrono::NaiveDate;

/// The uploaded file and the user's instruction.
#[derive(Debug, Clone, Copy)]
pub struct PipelineRequest<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
    pub instruction: &'a str,
}

/// Per-run switches, already merged from config and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Drop rows without a qualifying set-aside.
    pub drop_unqualified: bool,
    /// Requested worksheet name; sanitised on export.
    pub sheet_name: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            drop_unqualified: true,
            sheet_name: constants::DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

/// Where the plan used for a run came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanSource {
    /// Parsed from the classifier's response.
    Classifier { name: String },
    /// The empty fallback plan, with the failure that caused it.
    Fallback { reason: String },
}

impl PlanSource {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub profile: DatasetProfile,
    /// Serialised classifier request, when it could be encoded.
    pub request_json: Option<String>,
    pub plan: ClassifierPlan,
    pub plan_source: PlanSource,
    pub roles: ColumnRoleMap,
    pub rows_loaded: usize,
    /// Output table rows before any filter predicate.
    pub rows_before_filters: usize,
    /// Final table plus applied and skipped predicates.
    pub filters: FilterOutcome,
    pub downloads: [Download; 2],
}

/// Run the pipeline for one request.
///
/// `today` is the reference date for relative filters; callers normally
/// pass `dates::reference_today()`.
pub fn run(
    request: PipelineRequest<'_>,
    options: &PipelineOptions,
    classifier: &dyn Classifier,
    today: NaiveDate,
) -> Result<PipelineOutcome> {
    let table = loader::load_dataset(request.file_name, request.bytes)?;
    let profile = profile::build_profile(&table);

    let (request_json, plan, plan_source) = obtain_plan(&profile, request.instruction, classifier);

    let roles = ColumnRoleMap::resolve(&plan.columns, &table);

    let set_aside =
        CategoryNormalizer::new(NormalizationTarget::SetAside, &plan.set_aside_patterns);
    let opportunity_type = CategoryNormalizer::new(
        NormalizationTarget::OpportunityType,
        &plan.opportunity_type_patterns,
    );
    let normalized = set_aside.apply(&table, roles.get(ColumnRole::SetAsideSource));
    let normalized =
        opportunity_type.apply(&normalized, roles.get(ColumnRole::OpportunityTypeSource));

    let output_table = output::build_output_table(&normalized, &roles, options.drop_unqualified);
    let rows_before_filters = output_table.row_count();

    let filters = filter::apply_filters(&output_table, &plan.filters, today);
    let downloads = export::build_downloads(&filters.table, &options.sheet_name)?;

    tracing::info!(
        file = request.file_name,
        rows_loaded = table.row_count(),
        rows_before_filters,
        rows_out = filters.table.row_count(),
        fallback_plan = plan_source.is_fallback(),
        "Pipeline run complete"
    );

    Ok(PipelineOutcome {
        profile,
        request_json,
        plan,
        plan_source,
        roles,
        rows_loaded: table.row_count(),
        rows_before_filters,
        filters,
        downloads,
    })
}

/// Ask the classifier for a plan, substituting the fallback on any failure.
fn obtain_plan(
    profile: &DatasetProfile,
    instruction: &str,
    classifier: &dyn Classifier,
) -> (Option<String>, ClassifierPlan, PlanSource) {
    let (request_json, parsed) = match ClassifierRequest::new(profile, instruction).to_json() {
        Ok(json) => {
            let parsed = classifier
                .classify(&json)
                .and_then(|raw| plan::parse_plan(&raw));
            (Some(json), parsed)
        }
        Err(e) => (None, Err(e)),
    };

    match parsed {
        Ok(plan) => {
            tracing::info!(
                classifier = classifier.name(),
                filters = plan.filters.len(),
                "Classifier plan accepted"
            );
            (
                request_json,
                plan,
                PlanSource::Classifier {
                    name: classifier.name().to_string(),
                },
            )
        }
        Err(e) => {
            tracing::warn!(
                classifier = classifier.name(),
                error = %e,
                "Classifier step failed, using fallback plan"
            );
            let reason = e.to_string();
            (
                request_json,
                ClassifierPlan::fallback(&reason),
                PlanSource::Fallback { reason },
            )
        }
    }
}
