//! Simulated door bench driven from stdin.
//!
//! Each input character is one event: `0`-`9` digits, `#` submit, `*`
//! clear, `o` door opened, `c` door closed, `b` override button. Anything
//! else is ignored.

use doorkeep_controller::ControllerEvent;
use doorkeep_core::OverrideSource;
use doorkeep_hardware::mock::{MockDoorSensorHandle, MockKeypadHandle};
use doorkeep_hardware::{Actuator, KeypadInput};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Actuator that reports each call in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingActuator;

impl Actuator for LoggingActuator {
    fn unlock(&self) -> doorkeep_hardware::Result<()> {
        info!(led = "green", "latch released");
        Ok(())
    }

    fn lock(&self) -> doorkeep_hardware::Result<()> {
        info!(led = "white", "latch engaged");
        Ok(())
    }

    fn reject(&self) -> doorkeep_hardware::Result<()> {
        info!(led = "red", "code rejected");
        Ok(())
    }

    fn wait(&self) -> doorkeep_hardware::Result<()> {
        debug!(led = "blue", "processing");
        Ok(())
    }

    fn set_ambient_light(&self, on: bool) -> doorkeep_hardware::Result<()> {
        info!(on, "ambient light");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchInput {
    Key(KeypadInput),
    DoorOpened,
    DoorClosed,
    Button,
}

impl BenchInput {
    pub fn parse(c: char) -> Option<Self> {
        KeypadInput::from_char(c).map(Self::Key).or(match c {
            'o' => Some(Self::DoorOpened),
            'c' => Some(Self::DoorClosed),
            'b' => Some(Self::Button),
            _ => None,
        })
    }
}

/// Feed stdin into the simulated devices until stdin closes.
pub async fn read_stdin(
    keys: MockKeypadHandle,
    door: MockDoorSensorHandle,
    events: mpsc::Sender<ControllerEvent>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        for input in line.chars().filter_map(BenchInput::parse) {
            match input {
                BenchInput::Key(key) => keys.send_input(key).await?,
                BenchInput::DoorOpened => door.open(),
                BenchInput::DoorClosed => door.close(),
                BenchInput::Button => {
                    events
                        .send(ControllerEvent::Override(OverrideSource::Button))
                        .await?;
                }
            }
        }
    }

    debug!("stdin closed");
    Ok(())
}
