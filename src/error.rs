use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// Which stage of the command failed.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up the data source")]
    Source,
    #[display("could not open output directory")]
    Output,
    #[display("league sync failed")]
    Sync,
    #[display("consolidation failed")]
    Consolidate,
}
