use std::fmt;

/// An Authenticator Attestation GUID, a 128-bit identifier of the authenticator model.
///
/// Authenticators doing self or no attestation usually report the all-zero AAGUID, and since
/// attestation is not requested by this relying party the value is informational only.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Aaguid(pub [u8; Self::LEN]);

impl Aaguid {
    /// Length of an AAGUID in bytes.
    pub const LEN: usize = 16;

    /// The all-zero AAGUID.
    pub const fn new_empty() -> Self {
        Self([0; Self::LEN])
    }

    /// Whether this is the all-zero AAGUID.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for Aaguid {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl From<[u8; 16]> for Aaguid {
    fn from(inner: [u8; 16]) -> Self {
        Aaguid(inner)
    }
}

impl fmt::Display for Aaguid {
    /// Formats in the hyphenated 8-4-4-4-12 form used by metadata services.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Aaguid;

    #[test]
    fn display_is_hyphenated() {
        let aaguid = Aaguid([
            0xad, 0xce, 0x00, 0x02, 0x35, 0xbc, 0xc6, 0x0a, 0x64, 0x8b, 0x0b, 0x25, 0xf1, 0xf0,
            0x55, 0x03,
        ]);
        assert_eq!(aaguid.to_string(), "adce0002-35bc-c60a-648b-0b25f1f05503");
        assert!(!aaguid.is_empty());
        assert!(Aaguid::new_empty().is_empty());
    }
}
