use crate::tv::{Input, PowerState, TVConnection, TVError};
use log::info;

/// Stands in for the TV when no CEC adapter is attached.
pub struct LogOnlyConn {
    state: PowerState,
}

impl LogOnlyConn {
    pub fn new() -> Self {
        Self {
            state: PowerState::Off,
        }
    }
}

impl Default for LogOnlyConn {
    fn default() -> Self {
        Self::new()
    }
}

impl TVConnection for LogOnlyConn {
    fn power_state(&mut self) -> Result<PowerState, TVError> {
        info!("returning fake power state {}", self.state);
        Ok(self.state.clone())
    }
    fn power_on(&mut self, input: Option<Input>) -> Result<(), TVError> {
        info!("faking power on, input {:?}", input);
        self.state = PowerState::On;
        Ok(())
    }
    fn power_off(&mut self) -> Result<(), TVError> {
        info!("faking standby");
        self.state = PowerState::Off;
        Ok(())
    }
}
