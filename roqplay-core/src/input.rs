use bitflags::bitflags;

bitflags! {
    /// Controls that can be asserted on the input device. START is the
    /// user-abort control observed by the playback controller.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Controls: u32 {
        const START = 1 << 0;
        const A = 1 << 1;
        const B = 1 << 2;
        const UP = 1 << 3;
        const DOWN = 1 << 4;
        const LEFT = 1 << 5;
        const RIGHT = 1 << 6;
    }
}

pub trait InputDevice {
    /// Snapshot of the currently asserted controls.
    fn controls(&mut self) -> Controls;
}

/// Input device with nothing attached. Playback then only ends when the
/// decode engine runs out of stream.
pub struct NullInputDevice;

impl InputDevice for NullInputDevice {
    fn controls(&mut self) -> Controls {
        Controls::empty()
    }
}
