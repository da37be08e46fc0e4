//! Mock actuator used by the tests, recording every send and stop.

use std::{cell::RefCell, rc::Rc};

use comms_if::eqpt::rc::RcDir;

use super::{Actuator, ActuatorError, CmdHandle};

/// Shared record of everything the mock actuator was asked to do.
#[derive(Debug, Default)]
pub struct MockLog {
    pub sent: Vec<RcDir>,
    pub stopped: Vec<RcDir>,
    pub open: usize,
    pub max_open: usize,
    pub fail_send: bool,
    pub fail_stop: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MockActuator {
    pub log: Rc<RefCell<MockLog>>,
}

struct MockHandle {
    dir: RcDir,
    stopped: bool,
    log: Rc<RefCell<MockLog>>,
}

impl MockActuator {
    pub fn new() -> (Self, Rc<RefCell<MockLog>>) {
        let act = Self::default();
        let log = act.log.clone();
        (act, log)
    }
}

impl Actuator for MockActuator {
    fn send(&mut self, dir: RcDir) -> Result<Box<dyn CmdHandle>, ActuatorError> {
        let mut log = self.log.borrow_mut();
        if log.fail_send {
            return Err(ActuatorError::Unavailable);
        }

        log.sent.push(dir);
        log.open += 1;
        log.max_open = log.max_open.max(log.open);

        Ok(Box::new(MockHandle {
            dir,
            stopped: false,
            log: self.log.clone(),
        }))
    }
}

impl CmdHandle for MockHandle {
    fn dir(&self) -> RcDir {
        self.dir
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let mut log = self.log.borrow_mut();
        log.open -= 1;
        log.stopped.push(self.dir);

        if log.fail_stop {
            Err(ActuatorError::Unavailable)
        } else {
            Ok(())
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.stop().ok();
    }
}
