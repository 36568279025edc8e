//! Door contact backed by a watch channel.

use tokio::sync::watch;

use crate::error::Result;
use crate::traits::DoorSensor;
use crate::types::ContactState;

/// Simulated door contact. Starts closed.
#[derive(Debug, Clone)]
pub struct MockDoorSensor {
    state: watch::Receiver<ContactState>,
}

impl MockDoorSensor {
    pub fn new() -> (Self, MockDoorSensorHandle) {
        let (tx, rx) = watch::channel(ContactState::Closed);
        (Self { state: rx }, MockDoorSensorHandle { state: tx })
    }
}

impl DoorSensor for MockDoorSensor {
    fn contact_state(&self) -> Result<ContactState> {
        Ok(*self.state.borrow())
    }
}

/// Opens and closes a [`MockDoorSensor`].
#[derive(Debug)]
pub struct MockDoorSensorHandle {
    state: watch::Sender<ContactState>,
}

impl MockDoorSensorHandle {
    pub fn set(&self, state: ContactState) {
        self.state.send_replace(state);
    }

    pub fn open(&self) {
        self.set(ContactState::Open);
    }

    pub fn close(&self) {
        self.set(ContactState::Closed);
    }

    pub fn current(&self) -> ContactState {
        *self.state.borrow()
    }
}
