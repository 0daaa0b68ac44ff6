use crate::subject::SubjectId;
use typed_builder::TypedBuilder;

/// Default number of active PHN groups a practitioner may hold.
pub const DEFAULT_PER_SUBJECT_LIMIT: u32 = 2;
/// Default number of owed subjects handled in one cycle.
pub const DEFAULT_RESOURCE_PROCESS_LIMIT: usize = 20;

/// Batches owed to a subject holding `active_groups` groups.
///
/// Never negative, and never grows as `active_groups` grows.
pub fn compute_owed(active_groups: u32, per_subject_limit: u32) -> u32 {
    per_subject_limit.saturating_sub(active_groups)
}

/// Allocation decided for one subject in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAllocation {
    pub subject: SubjectId,
    pub active_groups: u32,
    pub owed: u32,
}

/// Decides how many batches each subject is owed and how many subjects a
/// cycle may serve.
///
/// Nothing is persisted: allocations are recomputed every cycle from the
/// group counts the resource server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct AllocationPolicy {
    #[builder(default = DEFAULT_PER_SUBJECT_LIMIT)]
    per_subject_limit: u32,
    #[builder(default = DEFAULT_RESOURCE_PROCESS_LIMIT)]
    resource_process_limit: usize,
}

impl AllocationPolicy {
    pub fn per_subject_limit(&self) -> u32 {
        self.per_subject_limit
    }

    pub fn resource_process_limit(&self) -> usize {
        self.resource_process_limit
    }

    pub fn allocate(&self, subject: SubjectId, active_groups: u32) -> SubjectAllocation {
        SubjectAllocation {
            owed: compute_owed(active_groups, self.per_subject_limit),
            subject,
            active_groups,
        }
    }

    /// Whether another owed subject fits in this cycle after `selected` have
    /// already been taken. Later subjects wait for the next cycle.
    pub fn admits(&self, selected: usize) -> bool {
        selected < self.resource_process_limit
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}
