pub(crate) mod command;
pub(crate) mod engine;
pub(crate) mod fingerprint;
