use crate::{frames::FrameError, plot::PlotError, report::ReportError, wires::WiresError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `wires` module")]
    Wires(#[from] WiresError),
    #[error("Error in the `frames` module")]
    Frames(#[from] FrameError),
    #[error("Error in the `plot` module")]
    Plot(#[from] PlotError),
    #[error("Error in the `report` module")]
    Report(#[from] ReportError),
}
pub type Result<T> = std::result::Result<T, Error>;
