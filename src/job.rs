use super::*;

/// One unit of solo work handed to miners: the template's pow-hash and
/// network target under a wrapping job id. Everything a share check needs,
/// plus the template itself for block assembly if a share solves it.
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) job_id: JobId,
    pub(crate) pow_hash: [u8; 32],
    pub(crate) target: Target,
    pub(crate) height: u64,
    pub(crate) clean: bool,
    pub(crate) template: Arc<BlockTemplate>,
}

impl Job {
    pub(crate) fn new(job_id: JobId, template: Arc<BlockTemplate>, clean: bool) -> Self {
        Self {
            job_id,
            pow_hash: template.raw_header().pow_hash(),
            target: Target::from_compact(template.compact_target.0),
            height: template.height(),
            clean,
            template,
        }
    }

    pub(crate) fn notify(&self) -> Notify {
        Notify {
            job_id: self.job_id,
            pow_hash: hex::encode(self.pow_hash),
            height: self.height,
            target: self.target,
            clean_jobs: self.clean,
        }
    }

    /// Same work, re-announced with `clean_jobs` set. Used after a block
    /// submission so miners drop their queued work immediately.
    pub(crate) fn as_clean(&self) -> Self {
        Self {
            job_id: self.job_id,
            pow_hash: self.pow_hash,
            target: self.target,
            height: self.height,
            clean: true,
            template: self.template.clone(),
        }
    }
}
