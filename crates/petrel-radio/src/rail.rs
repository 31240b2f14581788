use anyhow::{bail, Result};

/// Switchable power feed for the modem.
///
/// Flight builds wire this to the EPS output that feeds the radio; the
/// placeholder below reports the capability as missing instead of
/// pretending a reset happened.
pub trait PowerRail: Send {
    fn power_cycle(&mut self) -> Result<()>;
}

/// Rail control for builds without a switchable modem feed.
pub struct NoPowerRail;

impl PowerRail for NoPowerRail {
    fn power_cycle(&mut self) -> Result<()> {
        bail!("modem power rail is not controllable on this build")
    }
}
