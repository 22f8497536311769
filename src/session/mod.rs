pub(crate) mod pipeline_session;
pub(crate) mod raw;
