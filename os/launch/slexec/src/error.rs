/// Fatal launch errors.
///
/// There is no "no error" variant: success is `Ok(())` and every call site
/// that may fail funnels its `Result` into
/// [`ShutdownPolicy::error_action`](crate::shutdown::ShutdownPolicy::error_action).
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlError {
    #[error("fatal error")]
    Fatal = 1,
    #[error("TPM not ready")]
    TpmNotReady = 2,
    #[error("SINIT module not present")]
    SinitNotPresent = 3,
    #[error("secure loader module not present")]
    SklNotPresent = 4,
    #[error("authenticated code module verification failed")]
    AcmodVerifyFailed = 5,
    #[error("error left by a previous TXT launch")]
    PrevTxtError = 6,
    #[error("SMX not supported or not enabled")]
    SmxNotSupported = 7,
    #[error("TXT not supported")]
    TxtNotSupported = 8,
    #[error("SKINIT not supported")]
    SkinitNotSupported = 9,
}

impl SlError {
    /// Stable numeric code, printed on the fatal path.
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Reasons the variable MTRRs cannot be saved or cannot map a module.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MtrrError {
    #[error("module base {0:#x} is not page aligned")]
    Unaligned(u64),
    #[error("module is empty")]
    Empty,
    #[error("module needs more than {available} variable MTRRs")]
    TooManyRanges { available: usize },
    #[error("{vcnt} variable MTRRs implemented, more than can be saved")]
    TooManyVariableMtrrs { vcnt: u8 },
}

impl From<MtrrError> for SlError {
    fn from(_: MtrrError) -> Self {
        Self::Fatal
    }
}
