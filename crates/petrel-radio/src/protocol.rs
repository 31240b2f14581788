/// The AT command subset the flight software needs.
///
/// The modem speaks the Iridium SBD dialect; health and registration are
/// all the driver asks about on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Bare attention check.
    Probe,
    /// Signal strength, code 0 (no constellation) through 5.
    SignalQuality,
    /// SBD network registration status.
    CheckRegistration,
    /// Ask for ring alerts on mobile-terminated messages.
    RingAlertOn,
    RingAlertOff,
}

impl Command {
    pub fn wire(self) -> &'static str {
        match self {
            Command::Probe => "AT",
            Command::SignalQuality => "AT+CSQ",
            Command::CheckRegistration => "AT+SBDREG?",
            Command::RingAlertOn => "AT+SBDMTA=1",
            Command::RingAlertOff => "AT+SBDMTA=0",
        }
    }
}

/// Registration code meaning the modem is registered for ring alerts.
pub const REGISTRATION_RING: i32 = 2;

/// Signal code meaning no constellation visibility yet.
pub const SIGNAL_NONE: i32 = 0;

/// Result of one command/response exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Terminated with OK. The payload has the terminator stripped and
    /// surrounding whitespace trimmed.
    Ok(String),
    /// The link was closed before the exchange or lost during it.
    LinkUnavailable,
    /// Terminated with ERROR, or the response deadline passed first. The
    /// payload is whatever arrived.
    ProtocolError(String),
}

impl ResponseOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResponseOutcome::Ok(_))
    }

    pub fn payload(&self) -> &str {
        match self {
            ResponseOutcome::Ok(payload) | ResponseOutcome::ProtocolError(payload) => payload,
            ResponseOutcome::LinkUnavailable => "",
        }
    }
}

/// Extract the numeric code from a response payload.
///
/// Payloads look like `+CSQ:3` or `+SBDREG:2`, possibly prefixed by a
/// command echo; the code is the integer following the last colon.
pub fn response_code(payload: &str) -> Option<i32> {
    let tail = payload.rsplit(':').next().unwrap_or(payload).trim();
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
