use crate::pipeline::Pipeline;

/// Shared read-only across requests; each request runs its own pipeline pass.
pub(crate) struct ServerState {
    pub(crate) pipeline: Pipeline,
}
