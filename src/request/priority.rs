use super::{Error, Result};

const IOPRIO_CLASS_SHIFT: u16 = 13;
const IOPRIO_MAX_VALUE: u8 = 7;

/// The linux I/O scheduling class of a request, see `ioprio_set(2)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PriorityClass {
    /// No explicit priority, the request inherits the submitting process' priority.
    #[default]
    None,
    RealTime,
    BestEffort,
    Idle,
}

impl PriorityClass {
    fn to_raw(self) -> u16 {
        match self {
            PriorityClass::None => 0,
            PriorityClass::RealTime => 1,
            PriorityClass::BestEffort => 2,
            PriorityClass::Idle => 3,
        }
    }
}

/// A priority class plus the level within that class. Levels range from 0 (highest) to 7
/// (lowest), and must be 0 for [PriorityClass::None].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Priority {
    class: PriorityClass,
    value: u8,
}

impl Priority {
    /// The default priority, which leaves the request without an explicit class.
    pub const NONE: Priority = Priority {
        class: PriorityClass::None,
        value: 0,
    };

    pub fn new(class: PriorityClass, value: u8) -> Result<Priority> {
        if value > IOPRIO_MAX_VALUE {
            return Err(Error::InvalidArgument("priority value must be within 0..=7"));
        }
        if class == PriorityClass::None && value != 0 {
            return Err(Error::InvalidArgument(
                "priority value requires a priority class",
            ));
        }
        Ok(Priority { class, value })
    }

    pub fn class(&self) -> PriorityClass {
        self.class
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Encode this priority the way `IOPRIO_PRIO_VALUE` does, `None` when there is no class to
    /// encode so drivers can leave the priority flag unset.
    pub fn to_ioprio(self) -> Option<u16> {
        match self.class {
            PriorityClass::None => None,
            class => Some((class.to_raw() << IOPRIO_CLASS_SHIFT) | self.value as u16),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioprio_encoding() {
        let prio = Priority::new(PriorityClass::BestEffort, 4).unwrap();
        assert_eq!(prio.to_ioprio(), Some((2 << 13) | 4));

        let prio = Priority::new(PriorityClass::Idle, 0).unwrap();
        assert_eq!(prio.to_ioprio(), Some(3 << 13));

        assert_eq!(Priority::NONE.to_ioprio(), None);
        assert_eq!(Priority::default(), Priority::NONE);
    }

    #[test]
    fn test_invalid_priorities() {
        assert_eq!(
            Priority::new(PriorityClass::RealTime, 8),
            Err(Error::InvalidArgument("priority value must be within 0..=7"))
        );
        assert!(Priority::new(PriorityClass::None, 1).is_err());
        assert!(Priority::new(PriorityClass::None, 0).is_ok());
    }
}
