use crate::assembler::{AssemblerConfig, BatchAssembler, IssuanceStore};
use crate::discovery::{SubjectDiscovery, DEFAULT_PRACTITIONER_FETCH_LIMIT};
use crate::error::CycleError;
use crate::report::CycleReport;
use async_trait::async_trait;
use futures::StreamExt;
use phnix_core::{AllocationPolicy, Batch, Subject};
use phnix_fhir::{AccessToken, Bundle, BundlePoster, ResourceDirectory, TokenProvider};
use phnix_generator::Generator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use typed_builder::TypedBuilder;

pub const DEFAULT_SUBJECT_CONCURRENCY: usize = 1;

#[derive(Debug, Clone, TypedBuilder)]
pub struct IssuerSettings {
    #[builder(default)]
    pub policy: AllocationPolicy,
    #[builder(default)]
    pub assembler: AssemblerConfig,
    #[builder(default = DEFAULT_PRACTITIONER_FETCH_LIMIT)]
    pub practitioner_fetch_limit: u32,
    /// Subjects assembled at the same time.
    #[builder(default = DEFAULT_SUBJECT_CONCURRENCY)]
    pub subject_concurrency: usize,
    /// Prefix of every entry's `fullUrl`.
    #[builder(setter(into))]
    pub bundle_base_url: String,
    #[builder(default, setter(strip_option, into))]
    pub app_version: Option<String>,
}

/// Runs issuance cycles.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    /// Runs one cycle to completion. Failures end up in the report.
    async fn run_cycle(&self) -> CycleReport;
}

/// Everything a cycle needs, passed explicitly.
#[derive(TypedBuilder)]
pub struct IssuerContext<S, G> {
    store: Arc<S>,
    generator: Arc<G>,
    tokens: Arc<dyn TokenProvider>,
    directory: Arc<dyn ResourceDirectory>,
    poster: Arc<dyn BundlePoster>,
    settings: IssuerSettings,
}

impl<S: IssuanceStore, G: Generator> IssuerContext<S, G> {
    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    async fn cycle(&self, report: &mut CycleReport) {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(err) => {
                let err = CycleError::from(err);
                tracing::error!(error = %err, "cannot obtain access token, aborting cycle");
                report.record(&err);
                return;
            }
        };

        let discovery = SubjectDiscovery::new(
            self.directory.as_ref(),
            &token,
            self.settings.policy,
            self.settings.practitioner_fetch_limit,
        )
        .discover()
        .await;
        let discovery = match discovery {
            Ok(discovery) => discovery,
            Err(err) => {
                tracing::error!(error = %err, "cannot list practitioners");
                report.record(&err);
                return;
            }
        };
        for err in &discovery.errors {
            report.record(err);
        }
        report.subjects_selected = discovery.subjects.len();
        tracing::info!(
            considered = discovery.considered,
            selected = discovery.subjects.len(),
            "subjects selected"
        );

        let batches = self.assemble_all(&discovery.subjects, report).await;
        report.identifiers_generated =
            batches.iter().map(Batch::len).sum::<usize>() + report.identifiers_unbatched;

        if batches.is_empty() {
            tracing::info!("no bundles to post");
            return;
        }
        self.post(&token, &batches, report).await;
    }

    async fn assemble_all(&self, subjects: &[Subject], report: &mut CycleReport) -> Vec<Batch> {
        let assembler = BatchAssembler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.generator),
            self.settings.assembler,
        );
        let halted = AtomicBool::new(false);

        let pending: Vec<_> = subjects
            .iter()
            .map(|subject| assemble_subject(&assembler, subject, &halted))
            .collect();
        let outcomes: Vec<_> = futures::stream::iter(pending)
            .buffered(self.settings.subject_concurrency.max(1))
            .collect()
            .await;

        let mut batches = Vec::new();
        for (assembled, errors) in outcomes {
            batches.extend(assembled);
            for err in &errors {
                if let CycleError::AuthorityExhausted(exhausted) = err {
                    report.identifiers_unbatched += exhausted.unbatched();
                }
                report.record(err);
            }
        }
        batches
    }

    async fn post(&self, token: &AccessToken, batches: &[Batch], report: &mut CycleReport) {
        let bundle = Bundle::from_batches(
            &self.settings.bundle_base_url,
            batches,
            self.settings.app_version.as_deref(),
        );
        for (entry, batch) in bundle.entry.iter().zip(batches) {
            tracing::info!(
                group = %entry.resource.id,
                subject = %batch.subject.id,
                poi = %batch.authority,
                "group built"
            );
        }

        match self.poster.post(token, &bundle).await {
            Ok(ack) => {
                report.batches_posted = bundle.entry.len();
                tracing::info!(bundle = %bundle.id, status = ack.status, "bundle posted");
            }
            Err(source) => {
                let err = CycleError::Post {
                    bundle: bundle.id,
                    groups: bundle.entry.len(),
                    source,
                };
                tracing::error!(
                    error = %err,
                    groups = ?bundle.group_ids(),
                    identifiers = report.identifiers_generated,
                    "reconciliation gap: identifiers are issued but not registered"
                );
                report.record(&err);
            }
        }
    }
}

/// Assembles every batch `subject` is owed, stopping early once any subject
/// hits a fatal error.
async fn assemble_subject<S: IssuanceStore, G: Generator>(
    assembler: &BatchAssembler<S, G>,
    subject: &Subject,
    halted: &AtomicBool,
) -> (Vec<Batch>, Vec<CycleError>) {
    let mut batches = Vec::new();
    let mut errors = Vec::new();

    for _ in 0..subject.owed {
        if halted.load(Ordering::SeqCst) {
            break;
        }

        match assembler.assemble(subject).await {
            Ok(assembled) => {
                tracing::info!(
                    subject = %subject.id,
                    poi = %assembled.batch.authority,
                    size = assembled.batch.len(),
                    "batch assembled"
                );
                batches.push(assembled.batch);
                errors.extend(assembled.accounting_gap);
            }
            Err(err) => {
                halted.store(true, Ordering::SeqCst);
                tracing::error!(subject = %subject.id, error = %err, "assembly halted");
                errors.push(err);
                break;
            }
        }
    }

    (batches, errors)
}

#[async_trait]
impl<S: IssuanceStore, G: Generator> CycleRunner for IssuerContext<S, G> {
    async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::start();
        let span = tracing::info_span!("cycle", id = %report.id);

        async {
            tracing::info!("cycle started");
            self.cycle(&mut report).await;
            tracing::info!(
                batches_posted = report.batches_posted,
                identifiers_generated = report.identifiers_generated,
                errors = report.errors.len(),
                aborted = report.aborted,
                "cycle finished"
            );
        }
        .instrument(span)
        .await;

        report.finish()
    }
}
