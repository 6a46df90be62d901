use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::models::document::{DocumentAnalysisResult, DocumentJob};
use crate::services::analyzer::DocumentAnalyzer;

/// Seam between the batch driver and the per-document analyzer, so pacing
/// and partial-failure behavior are testable without a network.
pub trait DocumentAnalysis {
    fn analyze<'a>(
        &'a self,
        job: &'a DocumentJob,
    ) -> impl Future<Output = DocumentAnalysisResult> + Send + 'a;
}

impl DocumentAnalysis for DocumentAnalyzer {
    fn analyze<'a>(
        &'a self,
        job: &'a DocumentJob,
    ) -> impl Future<Output = DocumentAnalysisResult> + Send + 'a {
        DocumentAnalyzer::analyze(self, job)
    }
}

/// Fixed-interval gate enforcing the external service's request quota.
///
/// The first acquisition passes immediately; each subsequent one waits out
/// the remainder of the interval since the previous call. One gate is owned
/// per submission, so documents within a batch are serialized by
/// construction.
pub struct PacingGate {
    interval: Duration,
    last: Option<Instant>,
}

impl PacingGate {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Gate tuned to a requests-per-minute quota (e.g. 5 rpm → 12s spacing).
    pub fn for_quota(requests_per_minute: u32) -> Self {
        let rpm = requests_per_minute.max(1);
        Self::new(Duration::from_secs_f64(60.0 / f64::from(rpm)))
    }

    pub async fn acquire(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed).await;
            }
        }
        self.last = Some(Instant::now());
    }
}

/// Drives one submission's documents through analysis, sequentially and in
/// submission order.
///
/// Individual document failures never abort the batch: the analyzer already
/// degrades them to sentinel results, and this driver only accumulates.
/// Unsupported document types are filtered out before jobs reach this point
/// (at the queue boundary), so every job here has a supported type.
pub struct Orchestrator<A> {
    analyzer: A,
    gate: PacingGate,
}

impl<A: DocumentAnalysis> Orchestrator<A> {
    pub fn new(analyzer: A, gate: PacingGate) -> Self {
        Self { analyzer, gate }
    }

    pub async fn run(&mut self, jobs: &[DocumentJob]) -> Vec<DocumentAnalysisResult> {
        let mut results = Vec::with_capacity(jobs.len());

        for job in jobs {
            self.gate.acquire().await;

            let start = std::time::Instant::now();
            let result = self.analyzer.analyze(job).await;

            tracing::info!(
                document_type = %job.document_type,
                is_valid = result.is_valid,
                matches_declared = result.matches_declared,
                confidence = result.confidence,
                issue_count = result.issues.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "document analyzed"
            );
            metrics::histogram!("document_analysis_seconds").record(start.elapsed().as_secs_f64());

            results.push(result);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{DocumentQuality, DocumentType, ExtractedFields};
    use std::sync::Mutex;

    struct StubAnalyzer {
        seen: Mutex<Vec<DocumentType>>,
    }

    impl StubAnalyzer {
        fn new() -> Self {
            Self { seen: Mutex::new(Vec::new()) }
        }
    }

    impl DocumentAnalysis for StubAnalyzer {
        fn analyze<'a>(
            &'a self,
            job: &'a DocumentJob,
        ) -> impl Future<Output = DocumentAnalysisResult> + Send + 'a {
            async move {
                self.seen.lock().unwrap().push(job.document_type);
                if job.declared_value == "unreadable" {
                    DocumentAnalysisResult::failure(
                        job.document_type,
                        "could not parse analysis response",
                    )
                } else {
                    DocumentAnalysisResult {
                        document_type: job.document_type,
                        extracted_value: Some(job.declared_value.clone()),
                        extracted_fields: ExtractedFields::default(),
                        quality: DocumentQuality::Clear,
                        is_valid: true,
                        matches_declared: true,
                        confidence: 90,
                        issues: Vec::new(),
                    }
                }
            }
        }
    }

    fn job(document_type: DocumentType, declared: &str) -> DocumentJob {
        DocumentJob {
            document_type,
            image_bytes: vec![0u8; 4],
            mime_type: "image/jpeg".to_string(),
            declared_value: declared.to_string(),
        }
    }

    #[tokio::test]
    async fn batch_continues_past_a_failed_document() {
        let jobs = vec![
            job(DocumentType::IdCard, "1234"),
            job(DocumentType::TaxId, "unreadable"),
            job(DocumentType::Passport, "P555"),
        ];

        let mut orchestrator =
            Orchestrator::new(StubAnalyzer::new(), PacingGate::new(Duration::from_millis(0)));
        let results = orchestrator.run(&jobs).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_valid);
        assert!(!results[1].is_valid);
        assert_eq!(results[1].confidence, 0);
        assert!(!results[1].issues.is_empty());
        assert!(results[2].is_valid);

        let seen = orchestrator.analyzer.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![DocumentType::IdCard, DocumentType::TaxId, DocumentType::Passport]
        );
    }

    #[tokio::test]
    async fn gate_spaces_out_calls_after_the_first() {
        let jobs = vec![
            job(DocumentType::IdCard, "1"),
            job(DocumentType::TaxId, "2"),
            job(DocumentType::Passport, "3"),
        ];

        let mut orchestrator =
            Orchestrator::new(StubAnalyzer::new(), PacingGate::new(Duration::from_millis(30)));

        let start = std::time::Instant::now();
        let results = orchestrator.run(&jobs).await;
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 3);
        // Two gated waits between three calls.
        assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn submissions_pace_independently_of_each_other() {
        // Each submission owns its gate: two batches driven at once should
        // overlap rather than queue behind a shared interval.
        let jobs_a = vec![
            job(DocumentType::IdCard, "1111"),
            job(DocumentType::Passport, "P1"),
            job(DocumentType::TaxId, "T1"),
        ];
        let jobs_b = vec![
            job(DocumentType::IdCard, "2222"),
            job(DocumentType::Passport, "P2"),
            job(DocumentType::TaxId, "T2"),
        ];

        let mut orchestrator_a =
            Orchestrator::new(StubAnalyzer::new(), PacingGate::new(Duration::from_millis(50)));
        let mut orchestrator_b =
            Orchestrator::new(StubAnalyzer::new(), PacingGate::new(Duration::from_millis(50)));

        let start = std::time::Instant::now();
        let batches = futures::future::join_all([
            orchestrator_a.run(&jobs_a),
            orchestrator_b.run(&jobs_b),
        ])
        .await;
        let elapsed = start.elapsed();

        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|results| results.len() == 3));
        // Each batch alone takes two 50ms waits; run together they should
        // take roughly one batch's worth, well short of the 200ms a shared
        // gate would impose.
        assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(190), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let mut gate = PacingGate::new(Duration::from_secs(30));
        let start = std::time::Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn quota_translates_to_interval() {
        let gate = PacingGate::for_quota(5);
        assert_eq!(gate.interval, Duration::from_secs(12));
    }

    #[tokio::test]
    async fn empty_batch_yields_empty_results() {
        let mut orchestrator =
            Orchestrator::new(StubAnalyzer::new(), PacingGate::new(Duration::from_millis(0)));
        let results = orchestrator.run(&[]).await;
        assert!(results.is_empty());
    }
}
