//! Payslip collection pipeline.
//!
//! One run walks `ValidatingInput -> Authenticating -> FetchingCompany ->
//! ListingCollaborators -> ProcessingCollaborators -> Aggregating -> Done`.
//! Any fatal error moves it to `Failed`; per-collaborator problems are
//! recorded in the [`RunResult`] and never stop the run.

mod period;
mod progress;
mod result;

use futures::StreamExt;
use indexmap::IndexMap;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::archive::{self, sanitize_component};
use crate::auth::Token;
use crate::error::{PayslipError, Result};
use crate::hr_api::types::TokenIntrospection;
use crate::hr_api::{Collaborator, Company, HrApiClient, PayslipRecord};
use crate::pdf::extract_page;

pub use period::{available_periods, PeriodSelection};
pub use progress::{NoProgress, PipelineState, ProgressSink, ProgressUpdate};
pub use result::{
    CollaboratorPayslips, ExtractedPayslip, FailureReason, MatchedCollaborator, PayslipFailure,
    RunResult, UnmatchedCollaborator, UnmatchedReason,
};

use progress::{ProgressTracker, AUTH_END, LISTING_END, PROCESSING_END};

static NO_PROGRESS: NoProgress = NoProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Monthly,
    Yearly,
}

/// Raw user input for a run, validated before any network call.
#[derive(Debug)]
pub struct RunRequest {
    pub token: Option<Token>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub mode: RunMode,
}

impl RunRequest {
    /// Checks that the credential and the period fields are present and sane.
    pub fn validate(self) -> Result<(Token, PeriodSelection)> {
        let token = self
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PayslipError::Validation("an API token is required".to_string()))?;

        let year = self
            .year
            .ok_or_else(|| PayslipError::Validation("a target year is required".to_string()))?;

        let selection = match self.mode {
            RunMode::Monthly => {
                let month = self.month.ok_or_else(|| {
                    PayslipError::Validation("a target month is required".to_string())
                })?;
                PeriodSelection::monthly(year, month)?
            }
            RunMode::Yearly => PeriodSelection::yearly(year)?,
        };

        Ok((token, selection))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// 0-based index of the page kept from each payslip.
    pub page_index: u32,
    /// Collaborators processed at the same time; 1 keeps the run sequential.
    pub concurrency: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            page_index: 1,
            concurrency: 1,
        }
    }
}

/// Company and full collaborator list, without any payslip processing.
#[derive(Debug, Clone)]
pub struct Roster {
    pub company: Company,
    pub collaborators: Vec<Collaborator>,
}

enum CollaboratorOutcome {
    Matched {
        matched: MatchedCollaborator,
        file_stem: String,
        pages: Vec<(u32, Vec<u8>)>,
        failures: Vec<PayslipFailure>,
    },
    Unmatched(UnmatchedCollaborator),
}

pub struct CollectionPipeline<'a> {
    client: &'a HrApiClient,
    options: PipelineOptions,
    progress: &'a dyn ProgressSink,
    cancel: CancellationToken,
}

impl<'a> CollectionPipeline<'a> {
    pub fn new(client: &'a HrApiClient, options: PipelineOptions) -> Self {
        Self {
            client,
            options,
            progress: &NO_PROGRESS,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs a full collection.
    ///
    /// The token is consumed: it is dropped, and zeroed, before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions: invalid input, a rejected
    /// credential, a failure while authenticating, fetching the company or
    /// listing collaborators, an archive failure, or cancellation.
    pub async fn run(&self, request: RunRequest) -> Result<RunResult> {
        let tracker = ProgressTracker::new(self.progress);
        let result = self.execute(request, &tracker).await;
        if let Err(err) = &result {
            tracker.fail(err.to_string());
        }
        result
    }

    /// Authenticates and lists every collaborator.
    pub async fn fetch_roster(&self, token: Token) -> Result<Roster> {
        let tracker = ProgressTracker::new(self.progress);
        let result: Result<Roster> = async {
            if token.is_empty() {
                return Err(PayslipError::Validation(
                    "an API token is required".to_string(),
                ));
            }
            let company = self.cancellable(self.authenticate(&token, &tracker)).await?;
            let collaborators = self
                .cancellable(self.list_collaborators(&token, &company.id, &tracker))
                .await?;
            tracker.report(
                PipelineState::Done,
                1.0,
                format!("{} collaborators listed", collaborators.len()),
            );
            Ok(Roster {
                company,
                collaborators,
            })
        }
        .await;

        if let Err(err) = &result {
            tracker.fail(err.to_string());
        }
        result
    }

    async fn execute(&self, request: RunRequest, tracker: &ProgressTracker<'_>) -> Result<RunResult> {
        tracker.report(PipelineState::ValidatingInput, 0.0, "Validating input");
        let (token, selection) = request.validate()?;
        info!("Collecting payslips for {selection}");

        let company = self.cancellable(self.authenticate(&token, tracker)).await?;
        let collaborators = self
            .cancellable(self.list_collaborators(&token, &company.id, tracker))
            .await?;
        let outcomes = self
            .process_collaborators(&token, &company.id, &collaborators, selection, tracker)
            .await?;

        // Nothing past this point talks to the API.
        drop(token);

        tracker.report(PipelineState::Aggregating, PROCESSING_END, "Building archive");
        let mut result = aggregate(company, selection, collaborators, outcomes);

        if !result.payslips.is_empty() {
            let archive = match selection {
                PeriodSelection::Monthly { .. } => archive::build(&result.flat_items())?,
                PeriodSelection::Yearly { .. } => archive::build_grouped(&result.grouped_items())?,
            };
            result.archive = Some(archive);
        }

        let stats = result.stats();
        info!(
            "Run finished: {} with match, {} without, {} payslip(s) extracted, {} failure(s)",
            result.with_match.len(),
            result.without_match.len(),
            stats.total_payslips,
            result.failures.len()
        );
        tracker.report(
            PipelineState::Done,
            1.0,
            format!("{} payslip(s) extracted", stats.total_payslips),
        );

        Ok(result)
    }

    /// Races `phase` against cancellation; an already cancelled run never starts it.
    async fn cancellable<T>(&self, phase: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(PayslipError::Cancelled),
            result = phase => result,
        }
    }

    async fn authenticate(&self, token: &Token, tracker: &ProgressTracker<'_>) -> Result<Company> {
        tracker.report(PipelineState::Authenticating, 0.0, "Checking API token");

        let introspection = match self.client.introspect_token(token).await {
            Ok(introspection) => introspection,
            Err(PayslipError::Json(e)) => {
                return Err(PayslipError::InvalidCredential(format!(
                    "malformed introspection response: {e}"
                )))
            }
            Err(PayslipError::Upstream { status, .. }) if matches!(status, 400 | 401 | 403) => {
                return Err(PayslipError::InvalidCredential(format!(
                    "introspection rejected the token (status {status})"
                )))
            }
            Err(e) => return Err(e),
        };

        let company_id = match introspection {
            TokenIntrospection {
                active: false, ..
            } => {
                return Err(PayslipError::InvalidCredential(
                    "token is inactive or expired".to_string(),
                ))
            }
            TokenIntrospection {
                company_id: Some(id),
                ..
            } if !id.is_empty() => id,
            TokenIntrospection { .. } => {
                return Err(PayslipError::InvalidCredential(
                    "introspection returned no company id".to_string(),
                ))
            }
        };

        tracker.report(
            PipelineState::FetchingCompany,
            AUTH_END / 2.0,
            format!("Token valid, company id {company_id}"),
        );

        let company = self.client.get_company(token, &company_id).await?;
        info!("Company: {} ({})", company.name, company.id);
        tracker.report(
            PipelineState::FetchingCompany,
            AUTH_END,
            format!("Company: {}", company.name),
        );

        Ok(company)
    }

    async fn list_collaborators(
        &self,
        token: &Token,
        company_id: &str,
        tracker: &ProgressTracker<'_>,
    ) -> Result<Vec<Collaborator>> {
        tracker.report(
            PipelineState::ListingCollaborators,
            AUTH_END,
            "Listing collaborators",
        );

        let collaborators = self
            .client
            .list_all_collaborators(token, company_id, |page, total| {
                // The page count is unknown upfront, so each page closes half the remaining gap.
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                let remaining = 0.5_f64.powi(page.min(30) as i32);
                tracker.report(
                    PipelineState::ListingCollaborators,
                    LISTING_END - (LISTING_END - AUTH_END) * remaining,
                    format!("Page {page}: {total} collaborators so far"),
                );
            })
            .await?;

        info!("Fetched {} collaborators", collaborators.len());
        tracker.report(
            PipelineState::ListingCollaborators,
            LISTING_END,
            format!("{} collaborators fetched", collaborators.len()),
        );

        Ok(collaborators)
    }

    async fn process_collaborators(
        &self,
        token: &Token,
        company_id: &str,
        collaborators: &[Collaborator],
        selection: PeriodSelection,
        tracker: &ProgressTracker<'_>,
    ) -> Result<Vec<CollaboratorOutcome>> {
        let total = collaborators.len();
        let mut outcomes = Vec::with_capacity(total);

        // `buffered` yields in input order whatever the concurrency.
        let mut stream = futures::stream::iter(collaborators)
            .map(|collaborator| self.process_collaborator(token, company_id, collaborator, selection))
            .buffered(self.options.concurrency.max(1));

        loop {
            // A ready outcome wins over cancellation so finished work is never discarded.
            let next = tokio::select! {
                biased;
                next = stream.next() => next,
                () = self.cancel.cancelled() => return Err(PayslipError::Cancelled),
            };
            let Some(outcome) = next else { break };
            let outcome = outcome?;
            let index = outcomes.len();

            #[allow(clippy::cast_precision_loss)]
            let fraction =
                LISTING_END + (PROCESSING_END - LISTING_END) * (index + 1) as f64 / total as f64;
            tracker.report(
                PipelineState::ProcessingCollaborators { index, total },
                fraction,
                outcome_message(&outcome),
            );
            outcomes.push(outcome);
        }

        tracker.report(
            PipelineState::ProcessingCollaborators {
                index: total.saturating_sub(1),
                total,
            },
            PROCESSING_END,
            format!("{total} collaborators processed"),
        );

        Ok(outcomes)
    }

    async fn process_collaborator(
        &self,
        token: &Token,
        company_id: &str,
        collaborator: &Collaborator,
        selection: PeriodSelection,
    ) -> Result<CollaboratorOutcome> {
        if self.cancel.is_cancelled() {
            return Err(PayslipError::Cancelled);
        }

        let name = display_name(collaborator);
        debug!("Processing {name} ({})", collaborator.id);

        let records = match self
            .client
            .list_payslips(token, company_id, &collaborator.id)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not list payslips of {name}: {e}");
                return Ok(CollaboratorOutcome::Unmatched(UnmatchedCollaborator {
                    id: collaborator.id.clone(),
                    name,
                    reason: UnmatchedReason::ListingFailed(e.to_string()),
                    available_periods: Vec::new(),
                }));
            }
        };

        if records.is_empty() {
            return Ok(CollaboratorOutcome::Unmatched(UnmatchedCollaborator {
                id: collaborator.id.clone(),
                name,
                reason: UnmatchedReason::NoPayslips,
                available_periods: Vec::new(),
            }));
        }

        let selected = selection.select(&records);
        if selected.is_empty() {
            return Ok(CollaboratorOutcome::Unmatched(UnmatchedCollaborator {
                id: collaborator.id.clone(),
                name,
                reason: UnmatchedReason::NoPayslipForPeriod,
                available_periods: available_periods(&records),
            }));
        }

        let mut pages = Vec::new();
        let mut failures = Vec::new();
        let mut periods = Vec::new();

        for record in selected {
            let period = format!("{}/{}", record.month, record.year);
            match self.fetch_page(token, company_id, record).await {
                Ok(page) => pages.push((record.month, page)),
                Err(reason) => {
                    warn!("{name}, {period}: {reason}");
                    failures.push(PayslipFailure {
                        collaborator_id: collaborator.id.clone(),
                        collaborator_name: name.clone(),
                        period: period.clone(),
                        reason,
                    });
                }
            }
            periods.push(period);
        }

        Ok(CollaboratorOutcome::Matched {
            matched: MatchedCollaborator {
                id: collaborator.id.clone(),
                name,
                periods,
            },
            file_stem: file_stem(collaborator),
            pages,
            failures,
        })
    }

    /// Downloads one payslip and keeps the configured page.
    async fn fetch_page(
        &self,
        token: &Token,
        company_id: &str,
        record: &PayslipRecord,
    ) -> std::result::Result<Vec<u8>, FailureReason> {
        let pdf = self
            .client
            .download_payslip_pdf(
                token,
                company_id,
                &record.collaborator_id,
                &record.contract_id,
                &record.payslip_id,
            )
            .await
            .map_err(|e| FailureReason::Download(e.to_string()))?;

        let page_index = self.options.page_index;
        let extraction = tokio::task::spawn_blocking(move || {
            extract_page(&pdf, page_index).and_then(|extract| extract.into_result(page_index))
        })
        .await
        .map_err(|e| FailureReason::MalformedDocument(format!("extraction task failed: {e}")))?;

        extraction.map_err(|e| match e {
            PayslipError::NotEnoughPages { available, .. } => FailureReason::PageUnavailable {
                page_count: available,
            },
            other => FailureReason::MalformedDocument(other.to_string()),
        })
    }
}

fn outcome_message(outcome: &CollaboratorOutcome) -> String {
    match outcome {
        CollaboratorOutcome::Matched {
            matched,
            pages,
            failures,
            ..
        } => format!(
            "{}: {} page(s) extracted, {} failure(s)",
            matched.name,
            pages.len(),
            failures.len()
        ),
        CollaboratorOutcome::Unmatched(unmatched) => {
            format!("{}: {}", unmatched.name, unmatched.reason)
        }
    }
}

/// Full name, or the id when the API returned no name at all.
fn display_name(collaborator: &Collaborator) -> String {
    let name = collaborator.full_name();
    if name.is_empty() {
        collaborator.id.clone()
    } else {
        name
    }
}

/// `First_Last`, spaces and separators replaced with underscores.
fn file_stem(collaborator: &Collaborator) -> String {
    let parts: Vec<&str> = [collaborator.first_name.trim(), collaborator.last_name.trim()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        sanitize_component(&collaborator.id)
    } else {
        sanitize_component(&parts.join("_"))
    }
}

/// `{stem}_{year}_{mm}.pdf`, then `_{id}`, then a counter until the name is free.
fn unique_file_name(
    used: &mut HashSet<String>,
    file_stem: &str,
    year: i32,
    month: u32,
    collaborator_id: &str,
) -> String {
    let base = format!("{file_stem}_{year}_{month:02}");
    let mut file_name = format!("{base}.pdf");
    if used.insert(file_name.clone()) {
        return file_name;
    }

    let id = sanitize_component(collaborator_id);
    warn!("File name {file_name} already used, appending collaborator id {id}");
    file_name = format!("{base}_{id}.pdf");
    let mut attempt = 2;
    while !used.insert(file_name.clone()) {
        file_name = format!("{base}_{id}_{attempt}.pdf");
        attempt += 1;
    }
    file_name
}

fn aggregate(
    company: Company,
    selection: PeriodSelection,
    collaborators: Vec<Collaborator>,
    outcomes: Vec<CollaboratorOutcome>,
) -> RunResult {
    let year = selection.year();
    let mut with_match = Vec::new();
    let mut without_match = Vec::new();
    let mut failures = Vec::new();
    let mut payslips: IndexMap<String, CollaboratorPayslips> = IndexMap::new();
    let mut used_file_names = HashSet::new();

    for outcome in outcomes {
        match outcome {
            CollaboratorOutcome::Unmatched(unmatched) => without_match.push(unmatched),
            CollaboratorOutcome::Matched {
                matched,
                file_stem,
                pages,
                failures: item_failures,
            } => {
                for (month, content) in pages {
                    let file_name =
                        unique_file_name(&mut used_file_names, &file_stem, year, month, &matched.id);

                    payslips
                        .entry(matched.id.clone())
                        .or_insert_with(|| CollaboratorPayslips {
                            name: matched.name.clone(),
                            months: BTreeMap::new(),
                        })
                        .months
                        .insert(
                            month,
                            ExtractedPayslip {
                                collaborator_id: matched.id.clone(),
                                collaborator_name: matched.name.clone(),
                                file_name,
                                month,
                                size_bytes: content.len(),
                                content,
                            },
                        );
                }
                failures.extend(item_failures);
                with_match.push(matched);
            }
        }
    }

    RunResult {
        company,
        selection,
        collected_at: chrono::Utc::now(),
        collaborators,
        with_match,
        without_match,
        failures,
        payslips,
        archive: None,
    }
}
