use anyhow::{Result, anyhow};
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Per-page-load session identity.
///
/// Rendered as a version 4 UUID:
///
///     xxxxxxxx-xxxx-4xxx-Yxxx-xxxxxxxxxxxx
///
/// where every `x` is a random hex digit and `Y` is one of `8 9 a b`.
///
/// The value lives in memory only. It is created once by the
/// orchestrator and shared read-only with the emitter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Draws a fresh identity from the operating system's random source.
    ///
    /// FAILURE:
    /// - An unavailable OS random source is returned as an error.
    ///   Callers treat it as fatal; there is no fallback generator.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| anyhow!("OS random source unavailable: {}", e))?;
        Ok(Self::from_bytes(bytes))
    }

    fn from_bytes(mut bytes: [u8; 16]) -> Self {
        // version 4
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        // RFC 4122 variant
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32],
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
