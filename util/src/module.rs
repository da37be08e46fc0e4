//! Cyclic module interface

use crate::session::Session;

/// A module stepped once per cycle by the executive.
///
/// `init` runs once before the main loop, `proc` turns the cycle's input into an output for the
/// rest of the exec and a report for archiving.
pub trait State {
    type InitData;
    type InitError;

    type InputData;
    type OutputData;
    type StatusReport;
    type ProcError;

    fn init(&mut self, init_data: Self::InitData, session: &Session)
        -> Result<(), Self::InitError>;

    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
