pub mod active;
pub mod archive;
pub mod intake;
pub mod job;
pub mod pool;
pub mod queue;

pub use active::{ActiveEntry, ActiveRegistry, EntryKind, ItemPhase};
pub use archive::{expand_archive, ArchiveContents, RejectedMember};
pub use intake::{
    check_upload_extension, download_attachment, new_job_dir, prepare_submission, stage_file,
    Manifest, SkippedFile, Submission, SubmissionKind,
};
pub use job::{ItemInfo, Job, JobMetadata, JobSource, ScratchFile, WorkItem};
pub use pool::WorkerPool;
pub use queue::{JobQueue, QueueSettings};
