//! Actuator which only logs the commands it is given.

use comms_if::eqpt::rc::RcDir;
use log::info;

use super::{Actuator, ActuatorError, CmdHandle};

/// An actuator that drives nothing. Useful for running the tracker against recorded footage.
#[derive(Debug, Default)]
pub struct DryRun {
    num_sent: u64,
}

/// Handle for a [`DryRun`] command.
#[derive(Debug)]
pub struct DryRunHandle {
    id: u64,
    dir: RcDir,
    stopped: bool,
}

impl Actuator for DryRun {
    fn send(&mut self, dir: RcDir) -> Result<Box<dyn CmdHandle>, ActuatorError> {
        self.num_sent += 1;
        info!("[dry run] Command {} started: {}", self.num_sent, dir);

        Ok(Box::new(DryRunHandle {
            id: self.num_sent,
            dir,
            stopped: false,
        }))
    }
}

impl CmdHandle for DryRunHandle {
    fn dir(&self) -> RcDir {
        self.dir
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        if !self.stopped {
            info!("[dry run] Command {} stopped: {}", self.id, self.dir);
            self.stopped = true;
        }
        Ok(())
    }
}

impl Drop for DryRunHandle {
    fn drop(&mut self) {
        self.stop().ok();
    }
}
