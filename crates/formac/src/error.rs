use cfgir::err::GraphError;
use forma_common::thiserror::{self, Error};
use forma_opt::OptError;

///Error type collection that can happen while running the pipeline.
///Mostly transparent errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    OptError(#[from] OptError),
    #[error(transparent)]
    GraphError(#[from] GraphError),
    #[error(transparent)]
    IoErr(#[from] std::io::Error),
}
