use std::fmt;

/// The opaque handle linking a submitted request to its completion event. The kernel only ever
/// sees the packed `u64` form, the in-flight table uses the index to find the slot and the
/// generation to make sure the slot was not freed and reused in the meantime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationKey {
    index: u32,
    generation: u32,
}

impl CorrelationKey {
    pub(crate) fn new(index: u32, generation: u32) -> CorrelationKey {
        CorrelationKey { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Pack this key into the user data word carried by the kernel.
    pub fn to_token(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpack a user data word produced by [CorrelationKey::to_token].
    pub fn from_token(token: u64) -> CorrelationKey {
        CorrelationKey {
            index: token as u32,
            generation: (token >> 32) as u32,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}g{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_packing() {
        let key = CorrelationKey::new(17, 3);
        assert_eq!(key.to_token(), (3 << 32) | 17);
        assert_eq!(CorrelationKey::from_token(key.to_token()), key);
        assert_eq!(key.to_string(), "17g3");
    }
}
