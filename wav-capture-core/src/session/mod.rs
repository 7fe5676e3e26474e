pub(crate) mod dispatcher;
pub mod recorder;
pub(crate) mod worker;
