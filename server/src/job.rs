//! Job envelope and payload types.
//!
//! An [`Envelope`] is one unit of queued work. Its payload is a tagged union
//! keyed by [`JobKind`], so the dispatcher routes on the enum variant instead
//! of sniffing payload fields at runtime.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fast atomic ID generator for envelopes.
static ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[inline(always)]
pub fn next_id() -> u64 {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Current timestamp in milliseconds since the epoch.
#[inline(always)]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Queue kinds. Each kind is an independent ordering domain served by
/// exactly one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Extraction,
    StorageSync,
    SearchIndexing,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [
        JobKind::Extraction,
        JobKind::StorageSync,
        JobKind::SearchIndexing,
    ];

    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::StorageSync => "storage-sync",
            JobKind::SearchIndexing => "search-indexing",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extraction" => Ok(JobKind::Extraction),
            "storage-sync" => Ok(JobKind::StorageSync),
            "search-indexing" => Ok(JobKind::SearchIndexing),
            other => Err(format!("unknown queue kind: {}", other)),
        }
    }
}

/// How text should be pulled out of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Parse the file format directly (PDF text layer, DOCX, plain text).
    Native,
    /// Optical character recognition for scans and images.
    Ocr,
    /// Let the extraction provider pick based on the file.
    Auto,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionMethod::Native => "native",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Auto => "auto",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexAction {
    Upsert,
    Delete,
}

/// Kind-specific payload. The serde tag doubles as the queue name on the
/// wire, so producers post `{"kind": "extraction", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    Extraction {
        file_id: Uuid,
        org_id: Uuid,
        method: ExtractionMethod,
    },
    StorageSync {
        file_id: Uuid,
    },
    SearchIndexing {
        file_id: Uuid,
        action: IndexAction,
    },
}

impl JobPayload {
    #[inline]
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Extraction { .. } => JobKind::Extraction,
            JobPayload::StorageSync { .. } => JobKind::StorageSync,
            JobPayload::SearchIndexing { .. } => JobKind::SearchIndexing,
        }
    }

    /// The file this job operates on. Every payload today references one.
    #[inline]
    pub fn file_id(&self) -> Uuid {
        match self {
            JobPayload::Extraction { file_id, .. } => *file_id,
            JobPayload::StorageSync { file_id } => *file_id,
            JobPayload::SearchIndexing { file_id, .. } => *file_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub payload: JobPayload,
    /// Higher is served first. Immutable after creation.
    pub priority: i32,
    /// Insertion sequence assigned by the queue store on every (re)enqueue.
    /// FIFO tie-break within a priority band.
    #[serde(default)]
    pub seq: u64,
    #[serde(default)]
    pub retry_count: u32,
    pub created_at: u64,
    #[serde(default)]
    pub started_at: u64,
    #[serde(default)]
    pub completed_at: u64,
    pub status: JobStatus,
    /// Last failure message, carried across retries for diagnostics.
    #[serde(default)]
    pub last_error: Option<String>,
    /// System-of-record row for jobs that originated there; terminal status
    /// is mirrored back only for these.
    #[serde(default)]
    pub record: Option<Uuid>,
}

impl Envelope {
    pub fn new(payload: JobPayload, priority: i32, record: Option<Uuid>) -> Self {
        Self {
            id: next_id(),
            payload,
            priority,
            seq: 0,
            retry_count: 0,
            created_at: now_ms(),
            started_at: 0,
            completed_at: 0,
            status: JobStatus::Pending,
            last_error: None,
            record,
        }
    }

    #[inline(always)]
    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }
}

impl Eq for Envelope {}

impl PartialEq for Envelope {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.seq == other.seq
    }
}

impl Ord for Envelope {
    /// Max-heap ordering: higher priority pops first, lower insertion
    /// sequence (older) pops first within a band.
    #[inline(always)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Envelope {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
