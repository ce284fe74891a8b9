use crate::error::SlError;
use log::error;

/// Value in `EAX` when a Multiboot 1 loader jumps to us.
pub const MULTIBOOT1_MAGIC: u32 = 0x2BAD_B002;

/// Value in `EAX` when a Multiboot 2 loader jumps to us.
pub const MULTIBOOT2_MAGIC: u32 = 0x36D7_6289;

/// Boot protocol that produced the module table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LoaderKind {
    Multiboot1,
    Multiboot2,
}

/// Where the loader left its information structure and in which format.
///
/// The launcher never looks inside; collaborators interpret `addr`
/// according to `kind`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoaderContext {
    pub addr: usize,
    pub kind: LoaderKind,
}

impl LoaderContext {
    /// Identify the loader protocol from the entry magic.
    ///
    /// # Errors
    /// [`SlError::Fatal`] for an unknown magic or a null info pointer.
    pub fn detect(addr: usize, magic: u32) -> Result<Self, SlError> {
        let kind = match magic {
            MULTIBOOT1_MAGIC => LoaderKind::Multiboot1,
            MULTIBOOT2_MAGIC => LoaderKind::Multiboot2,
            _ => {
                error!("unknown loader magic {magic:#010x}");
                return Err(SlError::Fatal);
            }
        };
        if addr == 0 {
            error!("loader passed no information structure");
            return Err(SlError::Fatal);
        }
        Ok(Self { addr, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magics() {
        assert_eq!(
            LoaderContext::detect(0x9000, 0x2BAD_B002).map(|c| c.kind),
            Ok(LoaderKind::Multiboot1)
        );
        assert_eq!(
            LoaderContext::detect(0x9000, 0x36D7_6289).map(|c| c.kind),
            Ok(LoaderKind::Multiboot2)
        );
        assert_eq!(LoaderContext::detect(0x9000, 0x1BAD_B002), Err(SlError::Fatal));
    }

    #[test]
    fn null_info_is_fatal() {
        assert_eq!(LoaderContext::detect(0, MULTIBOOT2_MAGIC), Err(SlError::Fatal));
    }
}
