//! Simulated devices for tests and bench runs without GPIO.

pub mod actuator;
pub mod keypad;
pub mod sensor;

pub use actuator::MockActuator;
pub use keypad::{MockKeypad, MockKeypadHandle};
pub use sensor::{MockDoorSensor, MockDoorSensorHandle};
