use crate::note::Note;

/// Controller number of the damper (sustain) pedal.
pub const SUSTAIN_PEDAL_CC: u8 = 64;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MidiEvent {
    NoteOn {
        channel: u8,
        note: Note,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: Note,
        velocity: u8,
    },
    ControlChange {
        channel: u8,
        control: u8,
        value: u8,
    },
    PitchBend {
        channel: u8,
        value: u16,
    },
    Invalid,
}

impl MidiEvent {
    /// Decodes a raw channel message. A note-on with zero velocity is a note-off.
    pub fn from_raw(data: &[u8]) -> Self {
        match *data {
            [a @ 0x80..=0x8f, note, velocity] => MidiEvent::NoteOff {
                channel: a & 0x0f,
                note: note.into(),
                velocity,
            },
            [a @ 0x90..=0x9f, note, 0] => MidiEvent::NoteOff {
                channel: a & 0x0f,
                note: note.into(),
                velocity: 0,
            },
            [a @ 0x90..=0x9f, note, velocity] => MidiEvent::NoteOn {
                channel: a & 0x0f,
                note: note.into(),
                velocity,
            },
            [a @ 0xb0..=0xbf, control, value] => MidiEvent::ControlChange {
                channel: a & 0x0f,
                control,
                value,
            },
            [a @ 0xe0..=0xef, lsb, msb] => MidiEvent::PitchBend {
                channel: a & 0x0f,
                value: lsb as u16 | ((msb as u16) << 7),
            },
            _ => MidiEvent::Invalid,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, MidiEvent::Invalid)
    }

    /// The pedal position if this event moves the sustain pedal.
    pub fn sustain_pedal(&self) -> Option<bool> {
        match *self {
            MidiEvent::ControlChange {
                control: SUSTAIN_PEDAL_CC,
                value,
                ..
            } => Some(value >= 64),
            _ => None,
        }
    }

    /// Maps a note-on velocity onto a pluck intensity in `(0, 1]`.
    pub fn intensity(velocity: u8) -> f64 {
        velocity.min(127) as f64 / 127.0
    }
}
