//! Keymap cell actions and their 16-bit wire encoding.
//!
//! Keymap tables are flash-resident arrays of 16-bit records: the action tag
//! lives in the low four bits, the variant payload in the upper twelve. The
//! all-zero record doubles as the transparent cell that falls through to the
//! base layer.

use num_enum::TryFromPrimitive;

use crate::hid;

/// What a keymap cell does when its key is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Transparent cell: fall through to the base layer.
    NoEvent,
    /// Plain HID usage, with extra modifier bits held alongside it.
    Basic {
        /// Usage sent while the key is down. A modifier usage contributes
        /// only its modifier bit.
        code: u8,
        /// Left-hand modifier bits ORed into the report while held.
        mods: u8,
    },
    /// Modifier while held, `code` when tapped.
    DualRole {
        /// Usage emitted when the key is released within the tapping interval.
        code: u8,
        /// Left-hand modifier bits ORed into the report while held.
        mods: u8,
    },
    /// Consumer-control usage (media keys).
    Consumer {
        /// Usage asserted on press; 0 is sent on release.
        usage: u16,
    },
    /// System-control usage (power, sleep, wake).
    System {
        /// Usage asserted on press; 0 is sent on release.
        usage: u16,
    },
    /// Runs a macro when the key is tapped.
    Macro {
        /// Index into the macro table.
        id: u16,
    },
    /// Switches the active layer.
    Layer {
        /// Layer selected while the key is down.
        id: u8,
        /// Whether releasing the key restores the base layer.
        momentary: bool,
    },
}

/// Wire tag of a keymap record, stored in the low four bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
enum Tag {
    NoEvent = 0,
    Basic = 1,
    DualRole = 2,
    Consumer = 3,
    System = 4,
    Macro = 5,
    Layer = 6,
}

const TAG_MASK: u16 = 0x000F;
const PAYLOAD_MASK: u16 = 0x0FFF;

impl KeyAction {
    /// Packs the action into its 16-bit keymap record. Usable in `const`
    /// keymap tables.
    #[must_use]
    pub const fn encode(self) -> u16 {
        match self {
            Self::NoEvent => 0,
            Self::Basic { code, mods } => {
                Tag::Basic as u16 | ((mods as u16 & 0xF) << 4) | ((code as u16) << 8)
            }
            Self::DualRole { code, mods } => {
                Tag::DualRole as u16 | ((mods as u16 & 0xF) << 4) | ((code as u16) << 8)
            }
            Self::Consumer { usage } => Tag::Consumer as u16 | ((usage & PAYLOAD_MASK) << 4),
            Self::System { usage } => Tag::System as u16 | ((usage & PAYLOAD_MASK) << 4),
            Self::Macro { id } => Tag::Macro as u16 | ((id & PAYLOAD_MASK) << 4),
            Self::Layer { id, momentary } => {
                Tag::Layer as u16 | ((id as u16) << 4) | ((momentary as u16) << 12)
            }
        }
    }

    /// Unpacks a 16-bit keymap record. A record with an unknown tag is
    /// treated as corrupt and decodes to [`KeyAction::NoEvent`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(raw: u16) -> Self {
        let Ok(tag) = Tag::try_from((raw & TAG_MASK) as u8) else {
            log::debug!("unknown keymap record tag in {raw:#06x}");
            return Self::NoEvent;
        };
        let payload = (raw >> 4) & PAYLOAD_MASK;
        match tag {
            Tag::NoEvent => Self::NoEvent,
            Tag::Basic => Self::Basic {
                code: (raw >> 8) as u8,
                mods: (payload & 0xF) as u8,
            },
            Tag::DualRole => Self::DualRole {
                code: (raw >> 8) as u8,
                mods: (payload & 0xF) as u8,
            },
            Tag::Consumer => Self::Consumer { usage: payload },
            Tag::System => Self::System { usage: payload },
            Tag::Macro => Self::Macro { id: payload },
            Tag::Layer => Self::Layer {
                id: (payload & 0xFF) as u8,
                momentary: payload & 0x100 != 0,
            },
        }
    }

    /// A held key that contributes nothing to the report.
    #[must_use]
    pub fn is_inert(self) -> bool {
        matches!(
            self,
            Self::NoEvent
                | Self::Basic {
                    code: hid::NO_EVENT,
                    mods: 0
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_is_all_zeros() {
        assert_eq!(KeyAction::NoEvent.encode(), 0);
        assert_eq!(KeyAction::decode(0), KeyAction::NoEvent);
    }

    #[test]
    fn basic_round_trip() {
        let action = KeyAction::Basic {
            code: 0x29,
            mods: 0x01,
        };
        assert_eq!(KeyAction::decode(action.encode()), action);
    }

    #[test]
    fn dual_role_round_trip() {
        let action = KeyAction::DualRole {
            code: 0x2C,
            mods: 0x04,
        };
        assert_eq!(KeyAction::decode(action.encode()), action);
    }

    #[test]
    fn extra_key_round_trips() {
        let consumer = KeyAction::Consumer { usage: 0xE9 };
        assert_eq!(KeyAction::decode(consumer.encode()), consumer);
        let system = KeyAction::System { usage: 0x82 };
        assert_eq!(KeyAction::decode(system.encode()), system);
    }

    #[test]
    fn layer_round_trips_with_and_without_momentary() {
        for momentary in [false, true] {
            let action = KeyAction::Layer { id: 3, momentary };
            assert_eq!(KeyAction::decode(action.encode()), action);
        }
    }

    #[test]
    fn macro_round_trip() {
        let action = KeyAction::Macro { id: 42 };
        assert_eq!(KeyAction::decode(action.encode()), action);
    }

    #[test]
    fn unknown_tag_decodes_to_transparent() {
        assert_eq!(KeyAction::decode(0x123F), KeyAction::NoEvent);
        assert_eq!(KeyAction::decode(0x0007), KeyAction::NoEvent);
    }

    #[test]
    fn oversized_payloads_are_masked() {
        let encoded = KeyAction::Consumer { usage: 0xFFFF }.encode();
        assert_eq!(
            KeyAction::decode(encoded),
            KeyAction::Consumer { usage: 0x0FFF }
        );
    }

    #[test]
    fn inert_cells() {
        assert!(KeyAction::NoEvent.is_inert());
        assert!(KeyAction::Basic { code: 0, mods: 0 }.is_inert());
        assert!(!KeyAction::Basic { code: 0, mods: 2 }.is_inert());
        assert!(!KeyAction::Basic { code: 4, mods: 0 }.is_inert());
    }
}
